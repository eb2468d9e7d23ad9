//! 登录会话：从浏览器导出的 Cookie JSON 构造请求头，并尝试识别目录页网址。

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::header::{COOKIE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// 记录“最后访问页面”的 Cookie 名。
const FORWARD_COOKIE: &str = "lf___forward__";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("找不到 Cookie 文件 {path}")]
    Missing { path: PathBuf },
    #[error("读取 Cookie 文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解析 Cookie 文件 {path} 失败: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Cookie 文件 {path} 中没有可用的 name/value 记录")]
    Empty { path: PathBuf },
    #[error("请求头 {name} 的值不合法")]
    InvalidHeader { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// 从磁盘读到的全部 Cookie 记录。
#[derive(Debug, Clone)]
pub struct Credentials {
    records: Vec<CookieRecord>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        if !path.exists() {
            return Err(SessionError::Missing {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<CookieRecord> =
            serde_json::from_str(&raw).map_err(|source| SessionError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let creds = Self { records };
        if creds.cookie_header().is_empty() {
            return Err(SessionError::Empty {
                path: path.to_path_buf(),
            });
        }
        debug!("已读取 {} 条 Cookie 记录", creds.records.len());
        Ok(creds)
    }

    /// `name=value` 以 `"; "` 连接，name 或 value 为空的记录跳过。
    pub fn cookie_header(&self) -> String {
        self.records
            .iter()
            .filter(|r| !r.name.is_empty() && !r.value.is_empty())
            .map(|r| format!("{}={}", r.name, r.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// 从转发 Cookie 中识别目录页网址；识别不到返回 `None`，不算错误。
    pub fn detect_catalog_url(&self, base_url: &str, marker: &str) -> Option<String> {
        let record = self.records.iter().find(|r| r.name == FORWARD_COOKIE)?;
        let decoded = urlencoding::decode(&record.value).ok()?;
        if marker.is_empty() || !decoded.contains(marker) {
            return None;
        }
        let url = Url::parse(base_url).ok()?.join(&decoded).ok()?;
        info!("自动识别到目录网址: {}", url);
        Some(url.to_string())
    }
}

/// 整个任务共用的只读请求头。
#[derive(Debug, Clone)]
pub struct Session {
    headers: HeaderMap,
}

impl Session {
    pub fn new(
        credentials: Option<&Credentials>,
        base_url: &str,
        user_agent: &str,
    ) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|_| SessionError::InvalidHeader { name: "User-Agent" })?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(base_url)
                .map_err(|_| SessionError::InvalidHeader { name: "Referer" })?,
        );
        if let Some(creds) = credentials {
            let cookie = creds.cookie_header();
            if !cookie.is_empty() {
                headers.insert(
                    COOKIE,
                    HeaderValue::from_str(&cookie)
                        .map_err(|_| SessionError::InvalidHeader { name: "Cookie" })?,
                );
            }
        }
        Ok(Self { headers })
    }

    /// 不带 Cookie 的匿名会话，用于无需登录的站点。
    pub fn anonymous(base_url: &str, user_agent: &str) -> Result<Self, SessionError> {
        Self::new(None, base_url, user_agent)
    }

    #[cfg(test)]
    pub fn from_cookie_pairs(
        pairs: &[(&str, &str)],
        base_url: &str,
        user_agent: &str,
    ) -> Result<Self, SessionError> {
        let creds = Credentials {
            records: pairs
                .iter()
                .map(|(name, value)| CookieRecord {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        };
        Self::new(Some(&creds), base_url, user_agent)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn has_cookie(&self) -> bool {
        self.headers.contains_key(COOKIE)
    }
}
