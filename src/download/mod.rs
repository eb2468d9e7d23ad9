//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`：数据模型（Chapter / DownloadOutcome / ProgressSnapshot 等）
//! - `catalog`：目录页抓取、去重与跳过
//! - `progress`：进度上报与 CLI 进度条
//! - `downloader`：逐章下载调度
//! - `plan`：会话、目录网址与任务入口

pub mod catalog;
pub mod downloader;
pub mod models;
pub mod plan;
pub mod progress;
