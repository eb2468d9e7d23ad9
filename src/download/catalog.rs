//! 目录页抓取与章节列表整理。

use std::collections::HashSet;

use scraper::Html;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use super::models::Chapter;
use crate::base_system::retry::{RetryError, RetryPolicy, Retryable};
use crate::network_parser::network::{FetchError, PageFetcher, fetch_html};
use crate::network_parser::session::Session;
use crate::plugins::{Site, SitePlugin};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("目录页返回 HTTP {status}，Cookie 可能已失效: {url}")]
    Rejected { url: String, status: u16 },
    #[error("无法读取目录页 {url}（已尝试 {attempts} 次）: {last}")]
    Unreachable {
        url: String,
        attempts: u32,
        last: FetchError,
    },
    #[error("目录页中没有解析到任何章节: {url}")]
    Empty { url: String },
    #[error("站点地址无效: {0}")]
    InvalidBaseUrl(String),
}

pub struct CatalogFetcher<'a> {
    fetcher: &'a dyn PageFetcher,
    plugin: &'a dyn SitePlugin,
    base_url: Url,
    policy: RetryPolicy,
    skip_count: usize,
}

impl<'a> CatalogFetcher<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        site: &'a Site,
        policy: RetryPolicy,
        skip_count: usize,
    ) -> Result<Self, CatalogError> {
        let base_url = Url::parse(site.base_url)
            .map_err(|_| CatalogError::InvalidBaseUrl(site.base_url.to_string()))?;
        Ok(Self {
            fetcher,
            plugin: site.plugin.as_ref(),
            base_url,
            policy,
            skip_count,
        })
    }

    /// 抓取目录页并返回去重、跳过、排序后的章节列表。
    pub fn fetch_catalog(&self, url: &str, session: &Session) -> Result<Vec<Chapter>, CatalogError> {
        let html = self
            .policy
            .run(|attempt| {
                debug!("读取目录页（第 {} 次）: {}", attempt, url);
                fetch_html(self.fetcher, url, session)
            })
            .map_err(|err| match err {
                RetryError::Fatal { error, .. } => CatalogError::Rejected {
                    url: url.to_string(),
                    status: error.status().unwrap_or_default(),
                },
                RetryError::Exhausted { attempts, last } => CatalogError::Unreachable {
                    url: url.to_string(),
                    attempts,
                    last,
                },
            })?;

        info!("分析章节列表...");
        let doc = Html::parse_document(&html);
        let raw = self.plugin.parse_catalog(&doc, &self.base_url);
        debug!("插件解析出 {} 个链接", raw.len());

        let chapters = build_chapter_list(raw, self.skip_count, self.plugin.reverse_order());
        if chapters.is_empty() {
            return Err(CatalogError::Empty {
                url: url.to_string(),
            });
        }
        Ok(chapters)
    }
}

/// 去重（保留首次出现）→ 跳过前 `skip_count` 个 → 按需反转为正序。
pub fn build_chapter_list(
    raw: Vec<(String, String)>,
    skip_count: usize,
    reverse: bool,
) -> Vec<Chapter> {
    let mut seen = HashSet::new();
    let mut chapters: Vec<Chapter> = raw
        .into_iter()
        .filter(|(_, url)| seen.insert(url.clone()))
        .map(|(title, url)| Chapter::new(title, url))
        .collect();

    if skip_count > 0 && chapters.len() > skip_count {
        info!("跳过前 {} 个链接", skip_count);
        chapters.drain(..skip_count);
    }

    if reverse {
        chapters.reverse();
    }
    chapters
}
