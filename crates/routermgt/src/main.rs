use routermgt::app::build_runner;
use routermgt::config::{ServiceConfig, DEFAULT_CONFIG_PATH};
use routermgt::telemetry::init_telemetry;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match ServiceConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&config.log_level, config.log_format) {
        eprintln!("Failed to initialize telemetry: {:#}", e);
        std::process::exit(1);
    }

    info!(
        config_path = %config_path,
        storage_backend = ?config.storage_backend,
        "Starting router management service"
    );
    debug!("Configuration: {:?}", config);

    let runner = match build_runner(&config).await {
        Ok(runner) => runner,
        Err(e) => {
            error!("Failed to start: {:#}", e);
            std::process::exit(1);
        }
    };

    let outcome = runner.run().await;
    std::process::exit(outcome.exit_code());
}
