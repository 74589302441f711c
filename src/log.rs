use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// Global logger that forwards records into a replaceable backend.
///
/// Front ends install `env_logger` at start and may swap it later.
#[derive(Default)]
pub struct LoggerSwitcher {
    inner: RwLock<Option<Box<dyn Log + Send + Sync>>>,
}

impl LoggerSwitcher {
    /// Replace active logger. The first call also registers the switcher as the `log` backend.
    ///
    /// # Arguments
    ///
    /// * `logger`: new backend
    /// * `filter`: max level that reaches the backend
    pub fn switch<L: Log + Send + Sync + 'static>(&'static self, logger: L, filter: LevelFilter) {
        if let Ok(mut inner) = self.inner.write() {
            *inner = Some(Box::new(logger));
        }
        _ = log::set_logger(self);
        log::set_max_level(filter);
    }
}

impl Log for LoggerSwitcher {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.inner.read() {
            Ok(inner) => inner.as_ref().is_some_and(|l| l.enabled(metadata)),
            Err(_) => false,
        }
    }

    fn log(&self, record: &Record) {
        if let Ok(inner) = self.inner.read() {
            if let Some(logger) = inner.as_ref() {
                logger.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Ok(inner) = self.inner.read() {
            if let Some(logger) = inner.as_ref() {
                logger.flush();
            }
        }
    }
}

pub static LOGGER_SWITCHER: Lazy<LoggerSwitcher> = Lazy::new(LoggerSwitcher::default);
