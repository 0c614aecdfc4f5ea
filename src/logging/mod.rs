//! Log routing.
//!
//! Records go to the console through `simple_logger` until the terminal UI
//! takes over the screen. While a [`Diversion`] is alive they are appended to a
//! file instead, so nothing is printed over the rendered video.

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use simple_logger::SimpleLogger;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Default log file while the terminal UI is up
pub const LOG_FILE: &str = "tello-pilot.log";

type FileSlot = Arc<Mutex<Option<File>>>;

struct PilotLogger {
    console: SimpleLogger,
    file: FileSlot,
}

impl Log for PilotLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut slot = self.file.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_mut() {
            Some(file) => {
                let line = format!(
                    "{} {:<5} [{}] {}\n",
                    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    record.args()
                );
                // Nowhere left to report a failed write while the screen is taken
                let _ = file.write_all(line.as_bytes());
            }
            None => self.console.log(record),
        }
    }

    fn flush(&self) {
        let mut slot = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = slot.as_mut() {
            file.flush().ok();
        }
    }
}

/// Handle for moving log output between the console and a file
#[derive(Default)]
pub struct LogRouter {
    file: FileSlot,
}

impl LogRouter {
    /// Install the global logger. `RUST_LOG` overrides `default`.
    pub fn init(default: LevelFilter) -> Result<Self, SetLoggerError> {
        let router = Self::default();
        let logger = router.logger(SimpleLogger::new().with_level(default).env());
        log::set_max_level(logger.console.max_level());
        log::set_boxed_logger(Box::new(logger))?;
        Ok(router)
    }

    fn logger(&self, console: SimpleLogger) -> PilotLogger {
        PilotLogger {
            console,
            file: self.file.clone(),
        }
    }

    /// Append records to `path` until the returned guard is dropped
    pub fn divert(&self, path: &Path) -> std::io::Result<Diversion<'_>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.file.lock().unwrap_or_else(|e| e.into_inner()) = Some(file);
        Ok(Diversion { router: self })
    }
}

/// Sends records back to the console when dropped
pub struct Diversion<'a> {
    router: &'a LogRouter,
}

impl Drop for Diversion<'_> {
    fn drop(&mut self) {
        let mut slot = self.router.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut file) = slot.take() {
            file.flush().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn emit(logger: &PilotLogger, level: Level, text: &str) {
        logger.log(
            &Record::builder()
                .args(format_args!("{text}"))
                .level(level)
                .target("tello_pilot::test")
                .build(),
        );
    }

    #[test]
    fn test_diverted_records_land_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        let router = LogRouter::default();
        let logger = router.logger(SimpleLogger::new().with_level(LevelFilter::Info));

        {
            let _diversion = router.divert(&path).unwrap();
            emit(&logger, Level::Warn, "keeping tmp after failed assembly");
            emit(&logger, Level::Debug, "too chatty");
        }
        emit(&logger, Level::Warn, "back on the console");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("WARN  [tello_pilot::test] keeping tmp after failed assembly"));
        assert!(!written.contains("too chatty"));
        assert!(!written.contains("back on the console"));
        assert!(router.file.lock().unwrap().is_none());
    }

    #[test]
    fn test_divert_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        let router = LogRouter::default();
        let logger = router.logger(SimpleLogger::new().with_level(LevelFilter::Info));

        for text in ["first flight", "second flight"] {
            let _diversion = router.divert(&path).unwrap();
            emit(&logger, Level::Info, text);
        }

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.lines().nth(1).unwrap().ends_with("second flight"));
    }

    #[test]
    fn test_divert_to_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let router = LogRouter::default();
        assert!(router.divert(&dir.path().join("nope").join(LOG_FILE)).is_err());
        assert!(router.file.lock().unwrap().is_none());
    }
}
