//! Logging pipeline for binaries and tests embedding this crate.
//!
//! The crate itself logs via the [`log`] facade, which is bridged into the
//! [`slog`] logger built here.

use std::{env, io};

use chrono::{Local, SecondsFormat};
use slog::{
    o, Discard, Drain, Duplicate, FilterLevel, FnValue, Fuse, Level, Logger,
    PushFnValue, Record,
};
use slog_async::Async;
use slog_json::Json;
use slog_scope::GlobalLoggerGuard;

use crate::conf;

/// Builds JSON [`Logger`] which prints all its log records to `w_out` writer,
/// but WARN level (and higher) to `w_err` writer.
///
/// Records below the provided `level` are dropped, unless the `RUST_LOG`
/// environment variable enables them for some module.
///
/// Every record carries `msg`, `fqn`, `time` and `lvl` keys.
pub fn new_dual_logger<W1, W2>(w_out: W1, w_err: W2, level: Level) -> Logger
where
    W1: io::Write + Send + 'static,
    W2: io::Write + Send + 'static,
{
    let drain_out = Json::new(w_out).build();
    let drain_err = Json::new(w_err).build();
    let drain = Duplicate(
        drain_out.filter(|r| !r.level().is_at_least(Level::Warning)),
        drain_err.filter_level(Level::Warning),
    )
    .map(Fuse);
    let drain = slog_envlogger::LogBuilder::new(drain)
        .filter(
            None,
            FilterLevel::from_usize(level.as_usize())
                .unwrap_or(FilterLevel::Info),
        )
        .parse(&env::var("RUST_LOG").unwrap_or_default())
        .build()
        .fuse();
    let drain = Async::new(drain).chan_size(2048).build().fuse();
    add_default_keys(&Logger::root(drain, o!()))
}

/// Installs the global logger configured by the provided `conf`, and bridges
/// the [`log`] facade into it.
///
/// Logging is disabled if `conf` sets no valid level.
///
/// # Errors
///
/// If a [`log`] facade logger is installed already.
pub fn init(
    conf: &conf::Log,
) -> Result<GlobalLoggerGuard, ::log::SetLoggerError> {
    let logger = match conf.level() {
        Some(level) => new_dual_logger(io::stdout(), io::stderr(), level),
        None => Logger::root(Discard, o!()),
    };
    let guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init()?;
    Ok(guard)
}

/// Returns a child of the provided `logger` adding the following keys to
/// every record:
/// - `msg`: record message;
/// - `fqn`: module and line the record was logged at;
/// - `time`: local time of the record in [RFC 3339] format, with
///   milliseconds;
/// - `lvl`: record level.
///
/// [RFC 3339]: https://www.ietf.org/rfc/rfc3339.txt
fn add_default_keys(logger: &Logger) -> Logger {
    logger.new(o!(
        "msg" => PushFnValue(|r: &Record<'_>, s| s.emit(r.msg())),
        "fqn" => PushFnValue(|r: &Record<'_>, s| {
            s.emit(format_args!("{}:{}", r.module(), r.line()))
        }),
        "time" => PushFnValue(|_: &Record<'_>, s| {
            s.emit(Local::now().to_rfc3339_opts(SecondsFormat::Millis, false))
        }),
        "lvl" => FnValue(|r: &Record<'_>| r.level().as_short_str()),
    ))
}

#[cfg(test)]
mod spec {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use serial_test::serial;
    use slog::{info, warn, Level};

    use crate::conf::Conf;

    use super::{init, new_dual_logger};

    /// Writer into a shared buffer.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn splits_warnings_into_second_writer() {
        let (out, err) = (Buffer::default(), Buffer::default());
        let logger = new_dual_logger(out.clone(), err.clone(), Level::Info);

        info!(logger, "camera acquired");
        warn!(logger, "camera busy");
        slog::debug!(logger, "below level");
        drop(logger);

        let (out, err) = (out.contents(), err.contents());
        assert!(out.contains("camera acquired"));
        assert!(out.contains(r#""lvl":"INFO""#));
        assert!(out.contains(r#""fqn":"local_media::log::spec:"#));
        assert!(!out.contains("camera busy"));
        assert!(err.contains("camera busy"));
        assert!(!out.contains("below level"));
        assert!(!err.contains("below level"));
    }

    #[test]
    #[serial]
    fn init_bridges_log_facade_once() {
        let guard = init(&Conf::default().log).unwrap();
        ::log::info!("logging initialized");
        slog_scope::info!("scoped logging initialized");

        assert!(init(&Conf::default().log).is_err());
        drop(guard);
    }
}
