// Adapters layer: concrete implementations of the domain ports.

#[cfg(feature = "cli")]
pub mod prompt;
pub mod xlsx;
