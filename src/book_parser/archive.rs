//! 追加式文本存档。
//!
//! 每章一个条目：分隔线、标题、分隔线、正文（或失败标记）。
//! 文件只以追加模式打开，每写完一章立即落盘。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::download::models::{Chapter, DownloadOutcome};

const DELIMITER_WIDTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    Text(String),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub title: String,
    pub body: EntryBody,
}

impl ArchiveEntry {
    pub fn from_outcome(chapter: &Chapter, outcome: DownloadOutcome) -> Self {
        let body = match outcome {
            DownloadOutcome::Success(text) => EntryBody::Text(text),
            DownloadOutcome::Failed(_) => EntryBody::Failed,
        };
        Self {
            title: chapter.title.clone(),
            body,
        }
    }

    pub fn render(&self) -> String {
        let line = "=".repeat(DELIMITER_WIDTH);
        let body = match &self.body {
            EntryBody::Text(text) => text.clone(),
            EntryBody::Failed => failure_marker(&self.title),
        };
        format!("\n\n{line}\n{}\n{line}\n\n{body}", self.title)
    }
}

pub fn failure_marker(title: &str) -> String {
    format!("[章节 {title} 下载失败]")
}

pub struct ArchiveWriter {
    file: File,
    path: PathBuf,
}

impl ArchiveWriter {
    /// 以追加模式打开；已有内容保持不变。
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!("打开存档: {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, entry: &ArchiveEntry) -> io::Result<()> {
        self.file.write_all(entry.render().as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()
    }
}
