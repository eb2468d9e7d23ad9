//! HTML 文本处理工具。
//!
//! 选择器查找、去噪后的文本展开、链接收集与段落重建等纯函数。

use std::collections::HashSet;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// 正文容器内需要整棵丢弃的元素。
pub(crate) const NOISE_TAGS: &[&str] = &["script", "style", "div", "a", "iframe", "ins"];

/// 自成一段的元素：前后各补一个换行，压缩过的 HTML 也能分出段落。
const BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "li"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextLayout {
    /// 原样拼接文本节点，保留站点自身的换行。
    Natural,
    /// 每个文本节点去掉首尾空白、丢弃空节点，以空行连接。
    Paragraphs,
}

pub(crate) fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

// ── 文本展开 ────────────────────────────────────────────────────

pub(crate) fn flatten_text(root: ElementRef<'_>, noise: &[&str], layout: TextLayout) -> String {
    let mut pieces = Vec::new();
    for child in root.children() {
        collect_text(child, noise, &mut pieces);
    }

    match layout {
        TextLayout::Natural => pieces.concat(),
        TextLayout::Paragraphs => pieces
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn collect_text(node: NodeRef<'_, Node>, noise: &[&str], out: &mut Vec<String>) {
    match node.value() {
        Node::Text(text) => {
            let s: &str = text;
            out.push(s.to_owned());
        }
        Node::Element(el) => {
            let name = el.name();
            if name.eq_ignore_ascii_case("br") {
                out.push("\n".to_string());
                return;
            }
            if noise.iter().any(|n| name.eq_ignore_ascii_case(n)) {
                return;
            }
            let block = BLOCK_TAGS.iter().any(|b| name.eq_ignore_ascii_case(b));
            if block {
                out.push("\n".to_string());
            }
            for child in node.children() {
                collect_text(child, noise, out);
            }
            if block {
                out.push("\n".to_string());
            }
        }
        // 注释、处理指令等
        _ => {}
    }
}

// ── 段落 ────────────────────────────────────────────────────────

/// 按行重建段落：逐行去空白、丢弃空行，段落之间留一个空行。
pub(crate) fn reflow_paragraphs(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 保留站点排版，只统一换行符并去掉首尾空白。
pub(crate) fn normalize_natural(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

// ── 链接 ────────────────────────────────────────────────────────

pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// 收集 `css` 命中的链接，`accept(title, href)` 过滤后解析为绝对地址并按地址去重。
pub(crate) fn collect_links<F>(doc: &Html, css: &str, base: &Url, accept: F) -> Vec<(String, String)>
where
    F: Fn(&str, &str) -> bool,
{
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for link in doc.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        if !accept(&title, href) {
            continue;
        }
        let Some(full_url) = resolve_url(base, href) else {
            continue;
        };
        if seen.insert(full_url.clone()) {
            out.push((title, full_url));
        }
    }
    out
}
