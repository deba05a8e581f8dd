//! Minimal stderr logger for the driver binary.
//!
//! The library only ever emits through the `log` facade; installing a
//! backend is the binary's business.

use log::{Level, LevelFilter, Metadata, Record};

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the stderr logger.
///
/// # Arguments
/// * `max_level` - The maximum log level to display.
pub fn init(max_level: LevelFilter) {
    log::set_logger(&LOGGER).expect("logger already installed");
    log::set_max_level(max_level);
}
