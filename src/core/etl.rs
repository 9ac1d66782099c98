use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting billing report run");
        self.monitor.log_stats("Start");

        // Extract
        tracing::info!("📥 Reading billing sheet and translation workbook...");
        let extracted = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Read {} rows from sheet '{}', dictionary has {} header entries",
            extracted.table.rows.len(),
            extracted.table.name,
            extracted.dictionary.header().len()
        );
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("🔄 Translating and aggregating...");
        let result = self.pipeline.transform(extracted).await?;
        match &result.report {
            Some(report) => tracing::info!(
                "🔄 {} translated rows summarised into {} resources",
                result.table.rows.len(),
                report.len()
            ),
            None => tracing::info!("🔄 {} rows translated, no report requested", result.table.rows.len()),
        }
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("💾 Writing outputs...");
        let summary = self.pipeline.load(result).await?;
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(summary)
    }
}
