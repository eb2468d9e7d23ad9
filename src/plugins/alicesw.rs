//! AliceSW：需要登录 Cookie，正文自带段落结构。

use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use super::SitePlugin;
use crate::book_parser::html_utils::{
    NOISE_TAGS, TextLayout, collect_links, flatten_text, select_first,
};

pub const BASE_URL: &str = "https://www.alicesw.com";

fn re_chapter_path() -> &'static Regex {
    static RE_CHAPTER_PATH: OnceLock<Regex> = OnceLock::new();
    RE_CHAPTER_PATH
        .get_or_init(|| Regex::new(r"/book/[^/?#\s]+").expect("compile RE_CHAPTER_PATH"))
}

pub struct AliceSw;

impl SitePlugin for AliceSw {
    /// 目录页没有专门的列表容器，只能扫全部链接，靠路径特征和标题长度过滤。
    fn parse_catalog(&self, page: &Html, base_url: &Url) -> Vec<(String, String)> {
        collect_links(page, "a", base_url, |title, href| {
            title.chars().count() > 1 && re_chapter_path().is_match(href)
        })
    }

    fn parse_content(&self, page: &Html) -> Option<String> {
        let content = select_first(page, "div.read-content")?;
        Some(flatten_text(content, NOISE_TAGS, TextLayout::Paragraphs))
    }

    fn need_login(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(html: &str) -> Vec<(String, String)> {
        let doc = Html::parse_document(html);
        let base = Url::parse(BASE_URL).unwrap();
        AliceSw.parse_catalog(&doc, &base)
    }

    #[test]
    fn filters_by_path_and_title_length() {
        let chapters = catalog(
            r#"
            <a href="/index.html">首页</a>
            <a href="/book/31893/1.html">第一章</a>
            <a href="/book/31893/2.html">2</a>
            <a href="/book/31893/1.html">第一章（重复）</a>
            <a href="/book/">空路径</a>
            <a href="https://www.alicesw.com/book/31893/3.html">第三章</a>"#,
        );
        let titles: Vec<&str> = chapters.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(titles, vec!["第一章", "第三章"]);
        assert_eq!(chapters[0].1, "https://www.alicesw.com/book/31893/1.html");
    }

    #[test]
    fn content_is_paragraph_joined() {
        let doc = Html::parse_document(
            r#"<div class="read-content"><p>第一段</p><p>第二段</p><div>推荐</div></div>"#,
        );
        assert_eq!(
            AliceSw.parse_content(&doc).as_deref(),
            Some("第一段\n\n第二段")
        );
    }
}
