//! 逐章下载调度。
//!
//! 严格按目录顺序、单线程执行；每章处理完都会随机等待一段时间，
//! 这是避免被站点限流的唯一手段，不能跳过。

use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{debug, info, warn};

use super::models::{Chapter, DownloadOutcome, DownloadResult};
use super::progress::ProgressReporter;
use crate::book_parser::archive::{ArchiveEntry, ArchiveWriter};
use crate::book_parser::parser::ContentExtractor;
use crate::network_parser::session::Session;

pub struct DownloadScheduler<'a> {
    extractor: ContentExtractor<'a>,
    delay_range: RangeInclusive<Duration>,
}

impl<'a> DownloadScheduler<'a> {
    pub fn new(extractor: ContentExtractor<'a>, delay_range: RangeInclusive<Duration>) -> Self {
        Self {
            extractor,
            delay_range,
        }
    }

    /// 依次下载全部章节并写入存档。章节失败只写失败标记；存档写入失败直接中止。
    pub fn run(
        &self,
        chapters: &[Chapter],
        session: &Session,
        archive: &mut ArchiveWriter,
    ) -> Result<DownloadResult> {
        info!("开始下载：共 {} 章", chapters.len());
        let mut reporter = ProgressReporter::new(chapters.len());
        let mut result = DownloadResult::default();

        for (i, chapter) in chapters.iter().enumerate() {
            reporter.start_chapter(i + 1, chapter);

            let outcome = self.extractor.fetch_content(&chapter.url, session);
            let success = outcome.is_success();
            if let DownloadOutcome::Failed(reason) = &outcome {
                warn!("章节 {} 下载失败: {}", chapter.title, reason);
                result.failed += 1;
                result.failed_chapters.push(chapter.clone());
            } else {
                result.success += 1;
            }

            let entry = ArchiveEntry::from_outcome(chapter, outcome);
            archive
                .write(&entry)
                .with_context(|| format!("写入存档失败: {}", archive.path().display()))?;
            reporter.record(success);

            pause(&self.delay_range);
        }

        let snapshot = reporter.finish();
        debug!("调度结束: {:?}", snapshot);
        Ok(result)
    }
}

fn pause(range: &RangeInclusive<Duration>) {
    let wait = random_delay(range);
    if !wait.is_zero() {
        debug!("等待 {:?}", wait);
        std::thread::sleep(wait);
    }
}

fn random_delay(range: &RangeInclusive<Duration>) -> Duration {
    let (min, max) = (*range.start(), *range.end());
    if min >= max {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::retry::RetryPolicy;
    use crate::book_parser::archive::failure_marker;
    use crate::network_parser::mock::{ScriptedFetcher, test_session};
    use crate::plugins::czbooks::CzBooks;
    use std::fs;
    use std::time::Instant;

    fn chapters(n: usize) -> Vec<Chapter> {
        (1..=n)
            .map(|i| Chapter::new(format!("第{i}章"), format!("https://example.test/c/{i}")))
            .collect()
    }

    fn body(text: &str) -> String {
        format!(r#"<div class="content">{text}</div>"#)
    }

    fn delimited(title: &str, body: &str) -> String {
        let line = "=".repeat(20);
        format!("\n\n{line}\n{title}\n{line}\n\n{body}")
    }

    fn scheduler<'a>(fetcher: &'a ScriptedFetcher, delay: Duration) -> DownloadScheduler<'a> {
        let extractor = ContentExtractor::new(
            fetcher,
            &CzBooks,
            RetryPolicy::fixed(3, Duration::ZERO),
            false,
        );
        DownloadScheduler::new(extractor, delay..=delay)
    }

    #[test]
    fn mixed_run_keeps_order_and_marks_failures() {
        let list = chapters(3);
        let fetcher = ScriptedFetcher::new();
        fetcher.ok(&list[0].url, &body("Hello"));
        for _ in 0..3 {
            fetcher.status(&list[1].url, 500);
        }
        fetcher.ok(&list[2].url, &body("World"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novel.txt");
        let mut archive = ArchiveWriter::open(&path).unwrap();

        let result = scheduler(&fetcher, Duration::ZERO)
            .run(&list, &test_session(), &mut archive)
            .unwrap();
        drop(archive);

        assert_eq!((result.success, result.failed), (2, 1));
        assert_eq!(result.failed_chapters, vec![list[1].clone()]);
        assert_eq!(fetcher.calls_to(&list[1].url), 3);

        let expected = [
            delimited("第1章", "Hello"),
            delimited("第2章", &failure_marker("第2章")),
            delimited("第3章", "World"),
        ]
        .concat();
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);

        let order = fetcher.calls();
        assert_eq!(order.first(), Some(&list[0].url));
        assert_eq!(order.last(), Some(&list[2].url));
    }

    #[test]
    fn page_without_content_does_not_stop_the_run() {
        let list = chapters(2);
        let fetcher = ScriptedFetcher::new();
        for _ in 0..3 {
            fetcher.ok(&list[0].url, "<p>只有导航</p>");
        }
        fetcher.ok(&list[1].url, &body("正文"));

        let dir = tempfile::tempdir().unwrap();
        let mut archive = ArchiveWriter::open(&dir.path().join("a.txt")).unwrap();
        let result = scheduler(&fetcher, Duration::ZERO)
            .run(&list, &test_session(), &mut archive)
            .unwrap();

        assert_eq!(result.total(), 2);
        assert_eq!(result.failed, 1);
        assert_eq!(fetcher.calls_to(&list[1].url), 1);
    }

    #[test]
    fn sleeps_after_every_chapter() {
        let list = chapters(2);
        let fetcher = ScriptedFetcher::new();
        fetcher.ok(&list[0].url, &body("一"));
        fetcher.status(&list[1].url, 404);

        let dir = tempfile::tempdir().unwrap();
        let mut archive = ArchiveWriter::open(&dir.path().join("a.txt")).unwrap();
        let started = Instant::now();
        scheduler(&fetcher, Duration::from_millis(30))
            .run(&list, &test_session(), &mut archive)
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn delay_is_drawn_from_range() {
        let range = Duration::from_millis(3)..=Duration::from_millis(5);
        for _ in 0..50 {
            let d = random_delay(&range);
            assert!(range.contains(&d));
        }
        let fixed = Duration::from_millis(7)..=Duration::from_millis(7);
        assert_eq!(random_delay(&fixed), Duration::from_millis(7));
    }
}
