//! CZBooks：目录正序，无需登录。

use scraper::Html;
use url::Url;

use super::SitePlugin;
use crate::book_parser::html_utils::{TextLayout, collect_links, flatten_text, select_first};

pub const BASE_URL: &str = "https://czbooks.net";

/// 正文里的 `<a>`、`<iframe>` 保留：站点把部分正文文字包在链接里。
const CONTENT_NOISE: &[&str] = &["script", "style", "div", "ins"];

pub struct CzBooks;

impl SitePlugin for CzBooks {
    fn parse_catalog(&self, page: &Html, base_url: &Url) -> Vec<(String, String)> {
        collect_links(page, "ul.nav.chapter-list li a", base_url, |title, href| {
            !title.is_empty() && !href.trim().is_empty()
        })
    }

    fn parse_content(&self, page: &Html) -> Option<String> {
        let content = select_first(page, "div.content")?;
        Some(flatten_text(content, CONTENT_NOISE, TextLayout::Natural))
    }
}
