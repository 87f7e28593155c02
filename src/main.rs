//! Webhook受信サーバーのエントリポイント

use swingtrack_billing::features::payments::WebhookServer;
use swingtrack_billing::shared::config::{get_environment, AppConfig};
use swingtrack_billing::shared::database::initialize_database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // .envファイルから環境変数を読み込む（存在しなければ無視）
    let _ = dotenv::dotenv();

    let config = AppConfig::from_env()?;

    // ログレベルを設定
    let log_level = match config.log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    // env_loggerを初期化
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .init();

    log::info!(
        "ログシステムを初期化しました: level={}, environment={:?}",
        config.log_level,
        config.environment
    );

    let environment = get_environment();
    let conn = initialize_database(environment)?;

    let server = WebhookServer::new(config.webhook_port, config.webhook_secret.clone(), conn);
    server.run().await
}
