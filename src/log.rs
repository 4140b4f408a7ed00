use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::erx::{amp, Erx, ResultEX};

/// Discard is a writer that discards all data written to it.
struct Discard;

impl std::io::Write for Discard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// guards must live as long as the process, dropping them stops the writers
static LOG_WORKER_GUARDS: Mutex<Vec<WorkerGuard>> = Mutex::new(Vec::new());

/// install the global tracing subscriber
/// console goes to stdout, files roll daily under `log.dirs` as `{app_name}_siteguard.log`
/// calling it again after a successful install is a no-op
pub async fn logging_initialize(app_name: &str, log_conf: &crate::conf::Log) -> ResultEX {
    let logs_dir = log_conf.dirs.trim();
    if !logs_dir.is_empty() {
        let is_dir = tokio::fs::metadata(logs_dir).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(Erx::new(&format!("log dir is not a directory: {}", logs_dir)));
        }
    }

    let mut installed = LOG_WORKER_GUARDS.lock().map_err(amp("log guards lock poisoned"))?;
    if !installed.is_empty() {
        return Ok(());
    }

    let (nonblocking, discard_guard) = tracing_appender::non_blocking(Discard {});
    let (console, console_reload) =
        tracing_subscriber::reload::Layer::new(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(nonblocking.clone()));

    let (persist, persist_reload) =
        tracing_subscriber::reload::Layer::new(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(nonblocking.clone()));

    let mut guards: Vec<WorkerGuard> = vec![discard_guard];
    if log_conf.console {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        console_reload
            .reload(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(true))
            .map_err(amp("console reload failed"))?;
    }

    if !logs_dir.is_empty() {
        let prefix = format!("{}_siteguard.log", app_name);
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, prefix));
        guards.push(guard);
        persist_reload
            .reload(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
            .map_err(amp("persist reload failed"))?;
    }

    let filter = tracing_subscriber::EnvFilter::try_new(log_conf.level.as_str()).map_err(amp("invalid log level"))?;
    tracing_subscriber::registry()
        .with(console)
        .with(persist)
        .with(filter)
        .try_init()
        .map_err(amp("tracing subscriber already set"))?;

    installed.extend(guards);
    Ok(())
}
