use billing_sales_etl::domain::ports::WorkbookStore;
use billing_sales_etl::utils::{logger, validation::Validate};
use billing_sales_etl::{CliConfig, EtlEngine, EtlError, PromptResolution, SalesReportPipeline, XlsxStore};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting billing-sales-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let store = XlsxStore::new();

    if config.list_sheets {
        match store.sheet_names(&config.source_file).await {
            Ok(names) => {
                for name in names {
                    println!("{}", name);
                }
                return Ok(());
            }
            Err(e) => exit_with(&e),
        }
    }

    let cwd = std::env::current_dir()?;
    config.discover_translation_source(&cwd);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code().max(1));
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = if config.interactive {
        tracing::info!("💬 Missing translations will be asked for on the terminal");
        SalesReportPipeline::with_resolution(store, config, PromptResolution::new())
    } else {
        SalesReportPipeline::new(store, config)
    };

    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            tracing::info!("✅ Billing report run completed successfully!");
            tracing::info!("📁 Output saved to: {}", summary);
            println!("✅ Billing report run completed successfully!");
            println!("📁 Output saved to: {}", summary);
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}

fn exit_with(e: &EtlError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 結束碼依錯誤嚴重程度決定
    std::process::exit(e.exit_code().max(1))
}
