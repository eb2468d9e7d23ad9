//! 日志系统：控制台 + `logs/latest.log`，退出时压缩归档。
//!
//! 中断（Ctrl-C）和 panic 走同一条收尾路径：先让后台写线程刷完，再打包日志。

use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::{panic, thread, time::Duration};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, warn};
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::write::FileOptions;

const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024; // 10MB
const FLUSH_WAIT: Duration = Duration::from_millis(300);
const LATEST_LOG: &str = "latest.log";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("日志系统已经初始化")]
    AlreadyInitialized,
    #[error("日志订阅器初始化失败: {0}")]
    SubscriberInit(tracing_subscriber::util::TryInitError),
    #[error("日志文件读写失败: {0}")]
    Io(#[from] io::Error),
    #[error("日志压缩失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("时间格式化失败: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Clone, Debug)]
pub struct LogOptions {
    /// 控制台输出 DEBUG 级别；文件始终记录 DEBUG。
    pub debug: bool,
    pub logs_dir: PathBuf,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            debug: false,
            logs_dir: PathBuf::from("logs"),
        }
    }
}

/// 日志目录及其中的 `latest.log`。
#[derive(Debug, Clone)]
struct LogFiles {
    dir: PathBuf,
    latest: PathBuf,
}

impl LogFiles {
    fn prepare(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            latest: dir.join(LATEST_LOG),
        })
    }

    fn rotate_if_large(&self) -> Result<(), LogError> {
        let size = fs::metadata(&self.latest).map(|m| m.len()).unwrap_or(0);
        if size >= MAX_LOG_BYTES {
            self.archive()?;
        }
        Ok(())
    }

    /// 把 `latest.log` 打包成 `log_<时间>.zip` 并删除原文件；空日志直接删除。
    fn archive(&self) -> Result<Option<PathBuf>, LogError> {
        let size = match fs::metadata(&self.latest) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(None),
        };
        if size == 0 {
            let _ = fs::remove_file(&self.latest);
            return Ok(None);
        }

        let stamp = OffsetDateTime::now_utc().format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))?;
        let zip_path = self.dir.join(format!("log_{stamp}.zip"));

        let mut zip = zip::ZipWriter::new(File::create(&zip_path)?);
        zip.start_file(
            format!("{stamp}.log"),
            FileOptions::default().compression_method(CompressionMethod::Deflated),
        )?;
        {
            let mut source = File::open(&self.latest)?;
            io::copy(&mut source, &mut zip)?;
        }
        zip.finish()?;

        let _ = fs::remove_file(&self.latest);
        Ok(Some(zip_path))
    }
}

/// 持有后台写日志线程的 guard；drop 时刷新并归档。
pub struct LogSystem {
    shutdown: Arc<Shutdown>,
}

impl LogSystem {
    pub fn init(options: LogOptions) -> Result<Self, LogError> {
        let files = LogFiles::prepare(&options.logs_dir)?;
        files.rotate_if_large()?;

        let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
            .lossy(false)
            .finish(rolling::never(&files.dir, LATEST_LOG));

        let console_level = if options.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        let console_layer = fmt::layer()
            .with_target(false)
            .with_ansi(io::stderr().is_terminal())
            .with_writer(io::stderr)
            .with_filter(console_level);

        let file_layer = fmt::layer()
            .with_target(false)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(LevelFilter::DEBUG);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                if e.to_string().contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        let shutdown = Arc::new(Shutdown {
            files,
            guard: Mutex::new(Some(guard)),
            done: AtomicBool::new(false),
        });
        shutdown.hook_ctrlc();
        shutdown.hook_panic();

        Ok(Self { shutdown })
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.shutdown.run();
    }
}

struct Shutdown {
    files: LogFiles,
    guard: Mutex<Option<WorkerGuard>>,
    done: AtomicBool,
}

impl Shutdown {
    fn hook_ctrlc(self: &Arc<Self>) {
        let shutdown = Arc::clone(self);
        let installed = ctrlc::set_handler(move || {
            // 存档每章都已落盘，可直接退出
            warn!("收到中断信号，停止下载");
            shutdown.run();
            std::process::exit(130);
        });
        if let Err(err) = installed {
            warn!("无法注册 Ctrl-C 处理: {}", err);
        }
    }

    fn hook_panic(self: &Arc<Self>) {
        let shutdown = Arc::clone(self);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            error!("程序崩溃: {info}");
            shutdown.run();
            previous(info);
        }));
    }

    /// 只执行一次。
    fn run(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
        thread::sleep(FLUSH_WAIT);
        if let Err(err) = self.files.archive() {
            eprintln!("日志归档失败: {err}");
        }
    }
}
