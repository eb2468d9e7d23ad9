//! Serial Novel Downloader（网文连载下载器）。
//!
//! 读取浏览器导出的 Cookie，按站点插件解析目录与正文，逐章限速下载，
//! 追加写入一个纯文本存档。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/重试等基础设施
//! - `network_parser`：HTTP 抓取与登录会话
//! - `plugins`：各站点的目录与正文解析
//! - `book_parser`：正文提取与存档写入
//! - `download`：下载流程编排（拉目录、逐章下载、进度）

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

mod base_system;
mod book_parser;
mod download;
mod network_parser;
mod plugins;

use base_system::config::{ConfigSpec, load_or_create};
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use network_parser::network::HttpFetcher;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "serial-novel-downloader")]
#[command(about = "Serial Novel Downloader")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 配置文件路径（默认当前目录下的 config.yml）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 覆盖配置中的站点插件
    #[arg(long)]
    site: Option<String>,

    /// 覆盖配置中的备用目录网址
    #[arg(long)]
    catalog_url: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Serial Novel Downloader v{}", VERSION);
        return Ok(());
    }

    let _log = init_logging(cli.debug)?;
    info!(target: "startup", "当前版本: v{}", VERSION);

    let mut config =
        load_or_create::<Config>(cli.config.as_deref()).map_err(|e| anyhow!(e.to_string()))?;
    if let Some(site) = cli.site {
        config.site = site;
    }
    if let Some(url) = cli.catalog_url {
        config.catalog_url = url;
    }
    config.validate().map_err(|e| anyhow!(e.to_string()))?;

    let fetcher = HttpFetcher::new(config.request_timeout())?;
    match download::plan::run_download(&config, &fetcher) {
        Ok(_) => Ok(()),
        Err(err) => {
            error!("下载中止: {:#}", err);
            Err(err)
        }
    }
}

fn init_logging(debug: bool) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        ..LogOptions::default()
    };
    LogSystem::init(opts).map_err(|e| anyhow!(e))
}
