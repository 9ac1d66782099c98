use billing_sales_etl::core::{ConfigProvider, Pipeline, WorkbookStore};
use billing_sales_etl::utils::{logger, validation::Validate};
use billing_sales_etl::{EtlEngine, SalesReportPipeline, TomlConfig, XlsxStore};
use clap::Parser;

#[derive(Parser)]
#[command(name = "toml-report")]
#[command(about = "Billing sales report driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "billing-report.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - check inputs and show what would be written
    #[arg(long)]
    dry_run: bool,

    /// Print the first N report rows as JSON instead of writing anything
    #[arg(long, value_name = "N")]
    preview: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based billing report");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code().max(1));
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    let store = XlsxStore::new();

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        perform_dry_run(&store, &config).await?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = SalesReportPipeline::new(store, config);

    if let Some(limit) = args.preview {
        let extracted = pipeline.extract().await?;
        let result = pipeline.transform(extracted).await?;
        match result.report {
            Some(report) => {
                let shown = &report.rows[..limit.min(report.len())];
                println!("{}", serde_json::to_string_pretty(shown)?);
                println!("({} of {} rows)", shown.len(), report.len());
            }
            None => println!("Translate-only run: no report rows to preview"),
        }
        return Ok(());
    }

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            tracing::info!("✅ Billing report run completed successfully!");
            println!("✅ Billing report run completed successfully!");
            println!("📁 Output saved to: {}", summary);
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Source: {} [{}]",
        config.source_file().display(),
        config.sheet_name()
    );
    println!("  Translation source: {}", config.translation_source().display());
    println!("  Already translated: {}", config.already_translated());
    println!("  Save translated copy: {}", config.save_translations());
    println!("  Translate only: {}", config.translate_only());

    if let Some(sheet) = config.append_target() {
        println!("  Append report as sheet: {}", sheet);
    }
    if let Some(target) = config.new_file_target() {
        println!(
            "  New report file: {} [{}]",
            target.path.display(),
            target.sheet_name
        );
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(store: &XlsxStore, config: &TomlConfig) -> anyhow::Result<()> {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📄 Source workbook:");
    let sheets = store.sheet_names(config.source_file()).await?;
    for sheet in &sheets {
        let marker = if sheet == config.sheet_name() { "👉" } else { "  " };
        println!("  {} {}", marker, sheet);
    }
    if !sheets.iter().any(|s| s == config.sheet_name()) {
        println!("  ⚠️ Sheet '{}' not found", config.sheet_name());
    }

    println!();
    println!("🌐 Translation workbook:");
    let dictionary = billing_sales_etl::load_dictionary(store, config.translation_source()).await?;
    println!("  Header entries: {}", dictionary.header().len());
    for (column, mapping) in dictionary.groups() {
        println!("  {}: {} values", column, mapping.len());
    }

    println!();
    println!("💾 Outputs:");
    if let Some(sheet) = config.append_target() {
        let clash = sheets.iter().any(|s| s.eq_ignore_ascii_case(sheet));
        println!(
            "  Append '{}' to {}{}",
            sheet,
            config.source_file().display(),
            if clash { " ⚠️ sheet already exists" } else { "" }
        );
    }
    if let Some(target) = config.new_file_target() {
        let exists = target.path.exists();
        println!(
            "  Write {}{}",
            target.path.display(),
            if exists { " (will be replaced)" } else { "" }
        );
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");

    Ok(())
}
