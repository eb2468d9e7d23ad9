//! 基础设施：配置、日志、重试策略。

pub mod config;
pub mod context;
pub mod logging;
pub mod retry;
