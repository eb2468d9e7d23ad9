//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及从配置派生出的
//! 不可变运行参数 [`RunOptions`]。

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigError, ConfigSpec, FieldMeta};
use super::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 任务配置
    #[serde(default = "default_novel_name")]
    pub novel_name: String,
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_site")]
    pub site: String,
    #[serde(default)]
    pub catalog_url: String,
    #[serde(default = "default_catalog_skip_count")]
    pub catalog_skip_count: usize,

    // 登录配置
    #[serde(default = "default_cookie_file")]
    pub cookie_file: String,
    #[serde(default = "default_true")]
    pub require_session: bool,

    // 排版配置
    #[serde(default = "default_true")]
    pub smart_paragraph: bool,

    // 网络配置
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub retry_jitter_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            novel_name: default_novel_name(),
            save_path: String::new(),
            site: default_site(),
            catalog_url: String::new(),
            catalog_skip_count: default_catalog_skip_count(),
            cookie_file: default_cookie_file(),
            require_session: default_true(),
            smart_paragraph: default_true(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_jitter_ms: 0,
            user_agent: default_user_agent(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 15] = [
            FieldMeta {
                name: "novel_name",
                description: "小说名称（输出文件名，自动追加 .txt）",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径（留空为当前目录）",
            },
            FieldMeta {
                name: "site",
                description: "站点插件, 可选: [alicesw, czbooks]",
            },
            FieldMeta {
                name: "catalog_url",
                description: "备用目录页网址（Cookie 中读不到目录网址时使用）",
            },
            FieldMeta {
                name: "catalog_skip_count",
                description: "跳过目录前几个链接（去掉简介/公告等非正文章节）",
            },
            FieldMeta {
                name: "cookie_file",
                description: "Cookie 文件路径（浏览器导出的 JSON 数组）",
            },
            FieldMeta {
                name: "require_session",
                description: "是否必须加载 Cookie 才能下载",
            },
            FieldMeta {
                name: "smart_paragraph",
                description: "智能排版：按行重建段落并以空行分隔\n站点本身排版正确时请关闭，否则段落会被错误合并",
            },
            FieldMeta {
                name: "min_delay_ms",
                description: "章节间最小等待时间, 单位ms",
            },
            FieldMeta {
                name: "max_delay_ms",
                description: "章节间最大等待时间, 单位ms",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "每个请求的最大尝试次数",
            },
            FieldMeta {
                name: "retry_backoff_ms",
                description: "请求失败后的重试间隔, 单位ms",
            },
            FieldMeta {
                name: "retry_jitter_ms",
                description: "重试间隔额外随机抖动上限, 单位ms（0 表示固定间隔）",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
        ];
        &FIELDS
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.novel_name.trim().is_empty() {
            return Err(ConfigError::Validation("novel_name 不能为空".to_string()));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Validation(format!(
                "min_delay_ms ({}) 不能大于 max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Validation("max_retries 至少为 1".to_string()));
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Validation(
                "request_timeout 至少为 1 秒".to_string(),
            ));
        }
        Ok(())
    }
}

/// 一次下载任务的不可变参数，构造调度器时传入一次。
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_path: PathBuf,
    pub delay_range: RangeInclusive<Duration>,
    pub smart_paragraph: bool,
    pub require_session: bool,
    pub catalog_skip_count: usize,
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn output_path(&self) -> PathBuf {
        let stem = safe_fs_name(&self.novel_name, "_", 120);
        self.default_save_dir().join(format!("{stem}.txt"))
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            output_path: self.output_path(),
            delay_range: Duration::from_millis(self.min_delay_ms)
                ..=Duration::from_millis(self.max_delay_ms),
            smart_paragraph: self.smart_paragraph,
            require_session: self.require_session,
            catalog_skip_count: self.catalog_skip_count,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    fn base_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
            .with_jitter(Duration::from_millis(self.retry_jitter_ms))
    }

    /// 目录请求：403 说明 Cookie 已失效，立即放弃。
    pub fn catalog_retry_policy(&self) -> RetryPolicy {
        self.base_retry_policy().with_fatal_statuses(&[403])
    }

    /// 正文请求：任何失败都只影响当前章节。
    pub fn chapter_retry_policy(&self) -> RetryPolicy {
        self.base_retry_policy()
    }
}

pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            ':' => '：',
            '<' => '《',
            '>' => '》',
            '/' | '\\' => '、',
            '|' => '｜',
            '?' => '？',
            '*' => '＊',
            '"' => '＂',
            c if (c as u32) < 32 => replacement.chars().next().unwrap_or('_'),
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符（如中文）中间截断导致 panic
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    cleaned
}

fn default_true() -> bool {
    true
}

fn default_novel_name() -> String {
    "novel".to_string()
}

fn default_site() -> String {
    "alicesw".to_string()
}

fn default_catalog_skip_count() -> usize {
    0
}

fn default_cookie_file() -> String {
    "cookie.json".to_string()
}

fn default_min_delay_ms() -> u64 {
    3000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
