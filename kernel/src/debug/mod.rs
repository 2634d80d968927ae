//! Kernel logging
//!
//! `log` backend that writes `[LEVEL] target: message` lines to a console
//! component. The maximum level is chosen at compile time with the
//! `log-*` features; with none selected it defaults to `Info`.
//!
//! The logger gets its own console: the monitor's channel carries
//! diagnostic lines only.

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record};
use spin::Once;

use crate::components::console::{Console, ConsoleWriter};

/// Console-backed logger
pub struct ConsoleLogger {
    console: Once<&'static dyn Console>,
}

impl ConsoleLogger {
    pub const fn new() -> Self {
        Self { console: Once::new() }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(console) = self.console.get() {
            let _ = writeln!(
                ConsoleWriter::new(*console),
                "[{:<5}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger::new();

/// Compile-time maximum level
pub const fn max_level() -> LevelFilter {
    if cfg!(feature = "log-trace") {
        LevelFilter::Trace
    } else if cfg!(feature = "log-debug") {
        LevelFilter::Debug
    } else if cfg!(feature = "log-info") {
        LevelFilter::Info
    } else if cfg!(feature = "log-warn") {
        LevelFilter::Warn
    } else if cfg!(feature = "log-error") {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    }
}

/// Route `log` output to `console`
///
/// # Errors
/// Fails if another logger was installed first.
pub fn init(console: &'static dyn Console) -> Result<(), log::SetLoggerError> {
    LOGGER.console.call_once(|| console);
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level());
    Ok(())
}
