use anyhow::Context;
use nlq_desk::config::load_config;
use nlq_desk::logging::{self, log_error};
use nlq_desk::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging system
    if let Err(e) = logging::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log_error("app", &format!("Failed to load config, using defaults: {}", e))
                .unwrap_or_default();
            Default::default()
        }
    };

    let context = AppContext::new(config).context("Failed to build application context")?;
    let handler = context.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    context.shutdown();
    if let Err(e) = handler.await {
        log_error("app", &format!("Notification handler ended abnormally: {}", e))
            .unwrap_or_default();
    }

    Ok(())
}
