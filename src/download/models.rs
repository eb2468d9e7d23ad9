//! 下载相关的数据模型定义。

/// 目录中的一章。身份由 `url` 决定，`title` 只用于显示和存档标题。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub url: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// 单章下载结果，交给存档写入一次后即丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success(String),
    Failed(String),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success(_))
    }
}

#[derive(Debug, Default, Clone)]
pub struct DownloadResult {
    pub success: u32,
    pub failed: u32,
    pub failed_chapters: Vec<Chapter>,
}

impl DownloadResult {
    pub fn total(&self) -> u32 {
        self.success + self.failed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// 当前章节序号，从 1 开始。
    pub index: usize,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}
