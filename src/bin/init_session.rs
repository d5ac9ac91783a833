//! Session initialization binary.

use std::path::PathBuf;

use telegram_media_dl::commands::init_session;
use telegram_media_dl::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    init_session::run(&config).await?;
    Ok(())
}
