//! 进度上报与 CLI 进度条管理。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

use super::models::{Chapter, ProgressSnapshot};

pub(crate) struct ProgressReporter {
    snapshot: ProgressSnapshot,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// stderr 不是终端时 indicatif 自动隐藏进度条，只留日志。
    pub(crate) fn new(total: usize) -> Self {
        let bar = (total > 0).then(|| {
            let style = ProgressStyle::with_template(
                "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

            let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
            bar.set_style(style);
            bar.set_prefix("章节下载");
            bar
        });

        Self {
            snapshot: ProgressSnapshot {
                total,
                ..ProgressSnapshot::default()
            },
            bar,
        }
    }

    /// `index` 从 1 开始。
    pub(crate) fn start_chapter(&mut self, index: usize, chapter: &Chapter) {
        self.snapshot.index = index;
        let total = self.snapshot.total;
        let log = || info!("[{}/{}] 下载: {}", index, total, chapter.title);
        match self.bar.as_ref() {
            Some(bar) => bar.suspend(log),
            None => log(),
        }
    }

    pub(crate) fn record(&mut self, success: bool) {
        if success {
            self.snapshot.success += 1;
        } else {
            self.snapshot.failed += 1;
        }
        if let Some(bar) = self.bar.as_ref() {
            bar.set_message(status_message(&self.snapshot));
            bar.inc(1);
        }
    }

    pub(crate) fn finish(&mut self) -> ProgressSnapshot {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.snapshot
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}

fn status_message(snapshot: &ProgressSnapshot) -> String {
    if snapshot.failed == 0 {
        format!("成功 {}", snapshot.success)
    } else {
        format!("成功 {} 失败 {}", snapshot.success, snapshot.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_index_and_counts() {
        let mut reporter = ProgressReporter::new(3);
        reporter.start_chapter(1, &Chapter::new("一", "u1"));
        reporter.record(true);
        reporter.start_chapter(2, &Chapter::new("二", "u2"));
        reporter.record(false);

        assert_eq!(
            reporter.finish(),
            ProgressSnapshot {
                index: 2,
                total: 3,
                success: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn empty_run_has_no_bar() {
        let mut reporter = ProgressReporter::new(0);
        assert!(reporter.bar.is_none());
        assert_eq!(reporter.finish().total, 0);
    }

    #[test]
    fn message_mentions_failures_only_when_present() {
        let mut snap = ProgressSnapshot {
            success: 4,
            ..ProgressSnapshot::default()
        };
        assert_eq!(status_message(&snap), "成功 4");
        snap.failed = 2;
        assert_eq!(status_message(&snap), "成功 4 失败 2");
    }
}
