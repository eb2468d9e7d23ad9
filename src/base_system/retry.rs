//! 有限次数的退避重试策略。
//!
//! 目录请求与正文请求共用同一套循环，只在参数上区分：
//! 最大尝试次数、固定退避 + 可选抖动、以及“一遇到就放弃”的状态码。

use std::fmt::Display;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// 能够报告 HTTP 状态码的错误；没有状态码（连接失败、超时等）时返回 `None`。
pub trait Retryable {
    fn status(&self) -> Option<u16>;
}

#[derive(Debug, Error)]
pub enum RetryError<E: Display> {
    #[error("第 {attempt} 次请求遇到不可重试的错误: {error}")]
    Fatal { attempt: u32, error: E },
    #[error("重试 {attempts} 次仍失败: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E: Display> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal { error, .. } => error,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    jitter: Duration,
    fatal_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            jitter: Duration::ZERO,
            fatal_statuses: Vec::new(),
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_fatal_statuses(mut self, statuses: &[u16]) -> Self {
        self.fatal_statuses = statuses.to_vec();
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_fatal_status(&self, status: u16) -> bool {
        self.fatal_statuses.contains(&status)
    }

    /// 执行 `op`，失败时按策略退避重试。
    ///
    /// `op` 收到从 1 开始的尝试序号。最后一次失败后不再等待。
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if let Some(status) = err.status()
                && self.is_fatal_status(status)
            {
                return Err(RetryError::Fatal {
                    attempt,
                    error: err,
                });
            }

            let max_attempts = self.max_attempts();
            warn!("第 {}/{} 次请求失败: {}", attempt, max_attempts, err);
            if attempt >= max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let wait = self.next_delay();
            if !wait.is_zero() {
                debug!("等待 {:?} 后重试", wait);
                std::thread::sleep(wait);
            }
            attempt += 1;
        }
    }

    fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.backoff;
        }
        let extra = rand::thread_rng().gen_range(Duration::ZERO..=self.jitter);
        self.backoff + extra
    }
}
