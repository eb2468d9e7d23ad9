//! 测试用的脚本化抓取器：按 URL 预设响应序列，并记录每次请求。

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use super::network::{FetchError, Page, PageFetcher};
use super::session::Session;

#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: RefCell<HashMap<String, VecDeque<Result<Page, FetchError>>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 追加一次响应；同一 URL 的响应按顺序消费，用完后返回 404。
    pub(crate) fn push(&self, url: &str, response: Result<Page, FetchError>) -> &Self {
        self.scripts
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn ok(&self, url: &str, html: &str) -> &Self {
        self.push(url, Ok(page(200, html)))
    }

    pub(crate) fn status(&self, url: &str, status: u16) -> &Self {
        self.push(url, Ok(page(status, "")))
    }

    pub(crate) fn timeout(&self, url: &str) -> &Self {
        self.push(
            url,
            Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        )
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|u| *u == url).count()
    }
}

impl PageFetcher for ScriptedFetcher {
    fn get(&self, url: &str, _session: &Session) -> Result<Page, FetchError> {
        self.calls.borrow_mut().push(url.to_string());
        self.scripts
            .borrow_mut()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(page(404, "")))
    }
}

pub(crate) fn page(status: u16, html: &str) -> Page {
    Page {
        status,
        body: html.as_bytes().to_vec(),
    }
}

pub(crate) fn test_session() -> Session {
    Session::from_cookie_pairs(&[("sid", "abc")], "https://example.test", "test-agent")
        .expect("valid test session")
}
