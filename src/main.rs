use std::path::PathBuf;

use anyhow::Result;
use outreach_bot::utils::logging;
use outreach_bot::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let config = Config::load(Some(&config_path))?;

    // 初始化日志
    logging::init(config.verbose_logging);
    config.validate()?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
