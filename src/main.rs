use clap::Parser;
use geoscreen::config::ScreenConfig;
use geoscreen::domain::ports::ConfigProvider;
use geoscreen::core::ScreeningEngine;
use geoscreen::ingest::geocode::GeocoderService;
use geoscreen::utils::error::{ErrorSeverity, ScreenError};
use geoscreen::utils::{logger, validation::Validate};
use geoscreen::{CliConfig, LocalStorage, ScreeningPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting geoscreen CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 從 TOML 配置或 CLI 參數運行
    let result = if let Some(config_path) = &config.config {
        tracing::info!("Loading configuration from {}", config_path);
        let toml_config = match ScreenConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                report_config_error(&e);
                std::process::exit(1);
            }
        };
        if let Err(e) = toml_config.validate() {
            report_config_error(&e);
            std::process::exit(1);
        }

        let geocoder = GeocoderService::new(
            toml_config.portfolio.geocode_user_agent.as_deref(),
            toml_config.portfolio.geocode_min_delay_seconds.unwrap_or(1.0),
        );
        let monitor = monitor_enabled || toml_config.monitoring_enabled();
        let storage = LocalStorage::new(toml_config.output_path().to_string());
        let pipeline = ScreeningPipeline::new(storage, toml_config).with_geocoder(geocoder);
        ScreeningEngine::new_with_monitoring(pipeline, monitor).run().await
    } else {
        if let Err(e) = config.validate() {
            report_config_error(&e);
            std::process::exit(1);
        }

        let storage = LocalStorage::new(config.output_path.clone());
        let pipeline = ScreeningPipeline::new(storage, config);
        ScreeningEngine::new_with_monitoring(pipeline, monitor_enabled).run().await
    };

    match result {
        Ok(output_path) => {
            tracing::info!("✅ Screening completed successfully!");
            tracing::info!("📁 Output saved to: {}", output_path);
            println!("✅ Screening completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Screening failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn report_config_error(e: &ScreenError) {
    tracing::error!("❌ Configuration validation failed: {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
}
