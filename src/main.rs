use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use broker::app::Broker;
use broker::common::{init_logging, load_context, wait_for_shutdown_signal};
use broker::shutdown::ShutdownManager;
use clap::{Arg, ArgAction, Command};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("broker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("MQTT broker 存储与鉴权后端")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径 (TOML)"),
        )
        .arg(
            Arg::new("set")
                .short('s')
                .long("set")
                .value_name("KEY=VALUE")
                .help("覆盖配置项，可重复指定")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let overrides: Vec<String> = matches
        .get_many::<String>("set")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    let log_format = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("pretty");

    init_logging(log_level, log_format)?;

    info!("启动 broker 后端");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let context = load_context(config_path, &overrides)?;
    let broker = Arc::new(Broker::start(&context).await?);

    let shutdown_manager = ShutdownManager::new();
    let run_handle = {
        let broker = Arc::clone(&broker);
        let shutdown_rx = shutdown_manager.subscribe().await;
        tokio::spawn(async move { broker.run(shutdown_rx).await })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), run_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("后台任务异常退出: {e}"),
        Err(_) => warn!("后台任务关闭超时"),
    }

    broker.stop().await;
    info!("broker 后端已退出");
    Ok(())
}
