//! 章节正文抓取与解析。
//!
//! 正文按优先级依次尝试：站点插件 → 常见通用容器。第一个产出非空文本的
//! 来源胜出。页面 200 但所有来源都落空时，视为本次尝试失败并按策略重试。

use scraper::Html;
use thiserror::Error;
use tracing::debug;

use super::html_utils::{
    NOISE_TAGS, TextLayout, flatten_text, normalize_natural, reflow_paragraphs, select_first,
};
use crate::base_system::retry::{RetryPolicy, Retryable};
use crate::download::models::DownloadOutcome;
use crate::network_parser::network::{FetchError, PageFetcher, fetch_html};
use crate::network_parser::session::Session;
use crate::plugins::SitePlugin;

/// 插件之后依次尝试的通用正文容器。
const GENERIC_CONTAINERS: &[&str] = &["#content", ".read-content", ".novelcontent"];

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("页面中找不到正文: {url}")]
    NoContent { url: String },
}

impl Retryable for ContentError {
    fn status(&self) -> Option<u16> {
        match self {
            ContentError::Fetch(e) => e.status(),
            ContentError::NoContent { .. } => None,
        }
    }
}

#[derive(Clone, Copy)]
enum ContentSource<'a> {
    Plugin(&'a dyn SitePlugin),
    Container(&'static str),
}

impl ContentSource<'_> {
    fn extract(&self, doc: &Html) -> Option<String> {
        match self {
            ContentSource::Plugin(plugin) => plugin.parse_content(doc),
            ContentSource::Container(css) => {
                let root = select_first(doc, css)?;
                Some(flatten_text(root, NOISE_TAGS, TextLayout::Natural))
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            ContentSource::Plugin(_) => "plugin",
            ContentSource::Container(css) => *css,
        }
    }
}

fn content_chain(plugin: &dyn SitePlugin) -> Vec<ContentSource<'_>> {
    std::iter::once(ContentSource::Plugin(plugin))
        .chain(GENERIC_CONTAINERS.iter().copied().map(ContentSource::Container))
        .collect()
}

/// 从已解析的章节页提取正文。`smart_paragraph` 为真时按行重建段落。
pub fn extract_text(doc: &Html, plugin: &dyn SitePlugin, smart_paragraph: bool) -> Option<String> {
    content_chain(plugin).iter().find_map(|source| {
        let raw = source.extract(doc)?;
        let text = if smart_paragraph {
            reflow_paragraphs(&raw)
        } else {
            normalize_natural(&raw)
        };
        if text.is_empty() {
            return None;
        }
        debug!("正文来源: {}", source.describe());
        Some(text)
    })
}

pub struct ContentExtractor<'a> {
    fetcher: &'a dyn PageFetcher,
    plugin: &'a dyn SitePlugin,
    policy: RetryPolicy,
    smart_paragraph: bool,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        plugin: &'a dyn SitePlugin,
        policy: RetryPolicy,
        smart_paragraph: bool,
    ) -> Self {
        Self {
            fetcher,
            plugin,
            policy,
            smart_paragraph,
        }
    }

    /// 抓取并解析一章；所有失败都收敛为 `Failed`，不会向外传播。
    pub fn fetch_content(&self, url: &str, session: &Session) -> DownloadOutcome {
        let result = self.policy.run(|_| {
            let html = fetch_html(self.fetcher, url, session)?;
            let doc = Html::parse_document(&html);
            extract_text(&doc, self.plugin, self.smart_paragraph).ok_or_else(|| {
                ContentError::NoContent {
                    url: url.to_string(),
                }
            })
        });

        match result {
            Ok(text) => DownloadOutcome::Success(text),
            Err(err) => {
                debug!("放弃章节 {}: {}", url, err);
                DownloadOutcome::Failed(err.into_inner().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::mock::{ScriptedFetcher, test_session};
    use crate::plugins::czbooks::CzBooks;
    use std::time::Duration;

    /// 永远找不到正文的插件，用来验证通用容器回退。
    struct NoContentPlugin;

    impl SitePlugin for NoContentPlugin {
        fn parse_catalog(&self, _: &Html, _: &url::Url) -> Vec<(String, String)> {
            Vec::new()
        }

        fn parse_content(&self, _: &Html) -> Option<String> {
            None
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::ZERO)
    }

    #[test]
    fn plugin_wins_over_generic_containers() {
        let doc = Html::parse_document(
            r#"<div id="content">通用</div><div class="content">插件正文</div>"#,
        );
        assert_eq!(extract_text(&doc, &CzBooks, true).as_deref(), Some("插件正文"));
    }

    #[test]
    fn falls_back_in_order() {
        let doc = Html::parse_document(
            r#"<div class="novelcontent">第三选择</div><div class="read-content">第二选择</div>"#,
        );
        assert_eq!(
            extract_text(&doc, &NoContentPlugin, true).as_deref(),
            Some("第二选择")
        );
    }

    #[test]
    fn empty_container_continues_down_the_chain() {
        let doc = Html::parse_document(
            r#"<div id="content"><script>ad()</script></div><div class="novelcontent">真正文</div>"#,
        );
        assert_eq!(
            extract_text(&doc, &NoContentPlugin, false).as_deref(),
            Some("真正文")
        );
    }

    #[test]
    fn smart_paragraph_splits_p_only_content() {
        let doc = Html::parse_document(r#"<div id="content"><p>第一段</p><p>第二段</p></div>"#);
        assert_eq!(
            extract_text(&doc, &NoContentPlugin, true).as_deref(),
            Some("第一段\n\n第二段")
        );
    }

    #[test]
    fn smart_paragraph_toggle() {
        let doc = Html::parse_document("<div id=\"content\">第一行<br>第二行<br><br>第三行</div>");
        assert_eq!(
            extract_text(&doc, &NoContentPlugin, true).as_deref(),
            Some("第一行\n\n第二行\n\n第三行")
        );
        assert_eq!(
            extract_text(&doc, &NoContentPlugin, false).as_deref(),
            Some("第一行\n第二行\n\n第三行")
        );
    }

    #[test]
    fn success_after_transient_failures() {
        let url = "https://example.test/c/1";
        let fetcher = ScriptedFetcher::new();
        fetcher
            .timeout(url)
            .status(url, 502)
            .ok(url, r#"<div id="content">正文</div>"#);

        let extractor = ContentExtractor::new(&fetcher, &NoContentPlugin, policy(), true);
        let outcome = extractor.fetch_content(url, &test_session());
        assert_eq!(outcome, DownloadOutcome::Success("正文".to_string()));
        assert_eq!(fetcher.calls_to(url), 3);
    }

    #[test]
    fn exhausted_attempts_make_exactly_budget_requests() {
        let url = "https://example.test/c/2";
        let fetcher = ScriptedFetcher::new();
        for _ in 0..5 {
            fetcher.status(url, 500);
        }

        let extractor = ContentExtractor::new(&fetcher, &NoContentPlugin, policy(), true);
        let outcome = extractor.fetch_content(url, &test_session());
        assert!(matches!(outcome, DownloadOutcome::Failed(ref r) if r.contains("500")));
        assert_eq!(fetcher.calls_to(url), 3);
    }

    #[test]
    fn page_without_content_is_failed_after_retries() {
        let url = "https://example.test/c/3";
        let fetcher = ScriptedFetcher::new();
        for _ in 0..3 {
            fetcher.ok(url, "<html><body><p>登录后阅读</p></body></html>");
        }

        let extractor = ContentExtractor::new(&fetcher, &NoContentPlugin, policy(), true);
        let outcome = extractor.fetch_content(url, &test_session());
        assert!(matches!(outcome, DownloadOutcome::Failed(ref r) if r.contains("找不到正文")));
        assert_eq!(fetcher.calls_to(url), 3);
    }

    #[test]
    fn chapter_403_is_retried_like_any_other_status() {
        let url = "https://example.test/c/4";
        let fetcher = ScriptedFetcher::new();
        fetcher.status(url, 403).ok(url, r#"<div id="content">好了</div>"#);

        let extractor = ContentExtractor::new(&fetcher, &NoContentPlugin, policy(), true);
        assert!(extractor.fetch_content(url, &test_session()).is_success());
        assert_eq!(fetcher.calls_to(url), 2);
    }
}
