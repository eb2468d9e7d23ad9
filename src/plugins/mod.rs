//! 站点插件。
//!
//! 每个站点实现 [`SitePlugin`]：目录解析、正文解析两项能力，加上
//! “目录是否倒序”“是否需要登录”两个标记。站点的身份信息（名称、域名、
//! 目录网址特征）放在 [`Site`] 里，由注册表统一提供。

pub mod alicesw;
pub mod czbooks;

use scraper::Html;
use url::Url;

pub trait SitePlugin {
    /// 按页面顺序返回 `(标题, 绝对网址)`。
    fn parse_catalog(&self, page: &Html, base_url: &Url) -> Vec<(String, String)>;

    /// 返回正文文本；页面上找不到正文容器时返回 `None`。
    fn parse_content(&self, page: &Html) -> Option<String>;

    /// 目录为“最新在前”时为 `true`，调度前会被反转。
    fn reverse_order(&self) -> bool {
        false
    }

    fn need_login(&self) -> bool {
        false
    }
}

pub struct Site {
    pub name: &'static str,
    pub base_url: &'static str,
    /// 目录页路径特征，用于从 Cookie 中识别目录网址。
    pub catalog_marker: &'static str,
    pub plugin: Box<dyn SitePlugin>,
}

pub const SITE_NAMES: &[&str] = &["alicesw", "czbooks"];

pub fn lookup(name: &str) -> Option<Site> {
    match name.trim().to_ascii_lowercase().as_str() {
        "alicesw" => Some(Site {
            name: "alicesw",
            base_url: alicesw::BASE_URL,
            catalog_marker: "chapters/id",
            plugin: Box::new(alicesw::AliceSw),
        }),
        "czbooks" => Some(Site {
            name: "czbooks",
            base_url: czbooks::BASE_URL,
            catalog_marker: "/n/",
            plugin: Box::new(czbooks::CzBooks),
        }),
        _ => None,
    }
}
