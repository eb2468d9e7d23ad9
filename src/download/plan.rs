//! 下载任务准备与执行入口。
//!
//! 顺序固定：选站点 → 建立会话 → 确定目录网址 → 拉目录 → 打开存档 → 逐章下载。
//! 目录成功之前不会创建存档文件。

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, warn};

use super::catalog::CatalogFetcher;
use super::downloader::DownloadScheduler;
use super::models::{Chapter, DownloadResult};
use crate::base_system::context::{Config, RunOptions};
use crate::book_parser::archive::ArchiveWriter;
use crate::book_parser::parser::ContentExtractor;
use crate::network_parser::network::PageFetcher;
use crate::network_parser::session::{Credentials, Session, SessionError};
use crate::plugins::{self, SITE_NAMES, Site};

/// 目录已就绪、尚未开始下载的任务。
pub struct DownloadPlan {
    pub site: Site,
    pub session: Session,
    pub catalog_url: String,
    pub chapters: Vec<Chapter>,
}

pub fn resolve_site(name: &str) -> Result<Site> {
    plugins::lookup(name).ok_or_else(|| {
        anyhow!(
            "未知站点: {}（可选: {}）",
            name,
            SITE_NAMES.join(", ")
        )
    })
}

/// 读取 Cookie 并建立会话。
///
/// 需要登录时（配置要求或站点要求），Cookie 缺失、无法解析或为空都是致命错误，
/// 此时不会发出任何请求。否则退回匿名会话。
pub fn prepare_session(config: &Config, site: &Site) -> Result<(Session, Option<Credentials>)> {
    let required = config.run_options().require_session || site.plugin.need_login();
    let path = Path::new(&config.cookie_file);

    let credentials = match Credentials::load(path) {
        Ok(creds) => Some(creds),
        Err(e) if required => {
            return Err(e).context("需要登录 Cookie，请先从浏览器导出 Cookie 文件");
        }
        Err(SessionError::Missing { .. }) => {
            info!("未找到 Cookie 文件，使用匿名会话");
            None
        }
        Err(e) => {
            warn!("Cookie 文件不可用，使用匿名会话: {}", e);
            None
        }
    };

    let session = match credentials.as_ref() {
        Some(creds) => Session::new(Some(creds), site.base_url, &config.user_agent)?,
        None => Session::anonymous(site.base_url, &config.user_agent)?,
    };
    debug!("会话已建立，携带 Cookie: {}", session.has_cookie());
    Ok((session, credentials))
}

/// Cookie 中能识别出目录网址时优先使用，否则退回配置里的 `catalog_url`。
pub fn resolve_catalog_url(
    config: &Config,
    site: &Site,
    credentials: Option<&Credentials>,
) -> Result<String> {
    if let Some(url) =
        credentials.and_then(|c| c.detect_catalog_url(site.base_url, site.catalog_marker))
    {
        return Ok(url);
    }

    let fallback = config.catalog_url.trim();
    if fallback.is_empty() {
        bail!("无法从 Cookie 识别目录网址，且配置中未填写 catalog_url");
    }
    info!("使用配置中的目录网址: {}", fallback);
    Ok(fallback.to_string())
}

pub fn prepare_download_plan(config: &Config, fetcher: &dyn PageFetcher) -> Result<DownloadPlan> {
    let site = resolve_site(&config.site)?;
    info!("使用站点: {} ({})", site.name, site.base_url);

    let (session, credentials) = prepare_session(config, &site)?;
    let catalog_url = resolve_catalog_url(config, &site, credentials.as_ref())?;

    let chapters = CatalogFetcher::new(
        fetcher,
        &site,
        config.catalog_retry_policy(),
        config.run_options().catalog_skip_count,
    )?
    .fetch_catalog(&catalog_url, &session)
    .context("获取目录失败")?;
    info!("共解析到 {} 章", chapters.len());

    Ok(DownloadPlan {
        site,
        session,
        catalog_url,
        chapters,
    })
}

pub fn download_with_plan(
    config: &Config,
    plan: &DownloadPlan,
    fetcher: &dyn PageFetcher,
) -> Result<DownloadResult> {
    let RunOptions {
        output_path,
        delay_range,
        smart_paragraph,
        ..
    } = config.run_options();

    let mut archive = ArchiveWriter::open(&output_path)
        .with_context(|| format!("无法打开存档: {}", output_path.display()))?;
    info!("目录: {}", plan.catalog_url);
    info!("保存到: {}", output_path.display());

    let extractor = ContentExtractor::new(
        fetcher,
        plan.site.plugin.as_ref(),
        config.chapter_retry_policy(),
        smart_paragraph,
    );
    let result = DownloadScheduler::new(extractor, delay_range).run(
        &plan.chapters,
        &plan.session,
        &mut archive,
    )?;

    log_summary(&result);
    Ok(result)
}

pub fn run_download(config: &Config, fetcher: &dyn PageFetcher) -> Result<DownloadResult> {
    let plan = prepare_download_plan(config, fetcher)?;
    download_with_plan(config, &plan, fetcher)
}

fn log_summary(result: &DownloadResult) {
    info!(
        "下载完成：成功 {} 章，失败 {} 章，共 {} 章",
        result.success,
        result.failed,
        result.total()
    );
    if result.failed_chapters.is_empty() {
        return;
    }
    warn!("以下章节下载失败，可稍后重试:");
    for chapter in &result.failed_chapters {
        warn!("  {} ({})", chapter.title, chapter.url);
    }
}
