//! 阻塞式 HTTP 抓取层。
//!
//! 只负责“发一次 GET、拿到状态码和正文”，重试与状态码判定交给上层的
//! [`RetryPolicy`](crate::base_system::retry::RetryPolicy)。

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::debug;

use super::session::Session;
use crate::base_system::retry::Retryable;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("请求超时: {url}")]
    Timeout { url: String },
    #[error("网络错误 {url}: {message}")]
    Transport { url: String, message: String },
    #[error("HTTP {status}: {url}")]
    Status { url: String, status: u16 },
}

impl Retryable for FetchError {
    fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 一次 GET 的原始结果。
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Page {
    /// 不论页面声明什么编码，一律按 UTF-8 解码。
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub trait PageFetcher {
    fn get(&self, url: &str, session: &Session) -> Result<Page, FetchError>;
}

/// 抓取页面并要求 200，返回 UTF-8 文本。
pub fn fetch_html(
    fetcher: &dyn PageFetcher,
    url: &str,
    session: &Session,
) -> Result<String, FetchError> {
    let page = fetcher.get(url, session)?;
    if page.status != 200 {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: page.status,
        });
    }
    Ok(page.text())
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn get(&self, url: &str, session: &Session) -> Result<Page, FetchError> {
        debug!("GET {}", url);
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let resp = self
            .client
            .get(url)
            .headers(session.headers().clone())
            .send()
            .map_err(map_err)?;
        let status = resp.status().as_u16();
        debug!("响应状态: {} {}", status, url);

        let body = resp.bytes().map_err(map_err)?.to_vec();
        Ok(Page { status, body })
    }
}
