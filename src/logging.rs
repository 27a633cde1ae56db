//! Structured logging setup (spec §6). Follows the teacher's `main.rs`
//! `tracing_subscriber::fmt().with_env_filter(...)` shape, extended with a
//! file sink guarded by the same advisory-lock primitive as the instance
//! lock (`lock.rs`) and a custom `FormatEvent` producing the exact
//! `[YYYY-MM-DD HH:MM:SS.mmm] [thread-or-worker-id] [LEVEL] <message>` line
//! format spec §6 requires (the stock "Full" formatter orders and brackets
//! fields differently).

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use chrono::Local;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::lock::FileLock;

/// Renders `[YYYY-MM-DD HH:MM:SS.mmm] [thread-or-worker-id] [LEVEL] <message>`
/// (spec §6), in place of `tracing_subscriber`'s stock field order/bracketing.
struct BracketedFormatter;

impl<S, N> FormatEvent<S, N> for BracketedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let thread = std::thread::current();
        let thread_id = thread.name().map(str::to_string).unwrap_or_else(|| {
            format!("{:?}", thread.id()).trim_start_matches("ThreadId(").trim_end_matches(')').to_string()
        });
        write!(writer, "[{now}] [{thread_id}] [{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Verbosity levels per spec §6 (`{ERROR=0, WARNING=1, INFO=2, DEBUG=3}`).
pub fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    }
}

/// Holds the log file's advisory lock for the process lifetime. Dropping it
/// releases the lock.
pub struct LogGuard {
    _file_lock: Option<FileLock>,
}

/// Initialize the global `tracing` subscriber.
///
/// Mirrors output to stderr and, if `log_file` is set, to a log file whose
/// writes are serialized via an advisory lock on a sibling `.lock` file —
/// the same primitive the process instance lock uses (spec §5/§4.8).
pub fn init(verbosity: u8, log_file: Option<&Path>) -> Result<LogGuard, AppError> {
    let default_directive = format!(
        "shelfkeeper={},sqlx=warn,reqwest=warn",
        verbosity_to_directive(verbosity)
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let use_color = std::env::var_os("NO_COLOR").is_none();

    let (file_lock, file) = match log_file {
        Some(path) => {
            let lock = FileLock::acquire_sibling(path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(AppError::Io)?;
            (Some(lock), Some(file))
        }
        None => (None, None),
    };

    let stderr_writer = io::stderr.with_max_level(tracing::Level::TRACE);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_color)
        .event_format(BracketedFormatter);

    if let Some(file) = file {
        subscriber
            .with_writer(stderr_writer.and(move || file.try_clone().expect("clone log file handle")))
            .init();
    } else {
        subscriber.with_writer(stderr_writer).init();
    }

    Ok(LogGuard { _file_lock: file_lock })
}
