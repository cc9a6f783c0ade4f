//! QuickFix Logging System
//!
//! Console + per-run log file output. The logger is a plain value that is
//! cloned into every component that reports progress, so the debug switch
//! travels with it instead of living in process-wide state.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Download,
    Install,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Info => "[INFO]",
            LogLevel::Download => "[DOWNLOAD]",
            LogLevel::Install => "[INSTALL]",
            LogLevel::Warning => "[WARN]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

// ============================================================================
// Sink
// ============================================================================

#[derive(Default)]
struct LogSink {
    log_file: Option<File>,
    console: bool,
    captured: Option<Vec<String>>,
}

impl LogSink {
    fn write_line(&mut self, console_line: &str, file_line: &str) {
        if let Some(ref mut file) = self.log_file {
            let _ = writeln!(file, "{}", file_line);
            let _ = file.flush();
        }

        if let Some(ref mut lines) = self.captured {
            lines.push(console_line.to_string());
        }

        if self.console {
            println!("{}", console_line);
        }
    }
}

fn log_header() -> String {
    format!(
        r#"================================================================================
QuickFix Log - {}
================================================================================
Application:   QuickFix v{}
Platform:      {} ({})
================================================================================"#,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

// ============================================================================
// Logger
// ============================================================================

#[derive(Clone)]
pub struct Logger {
    debug: bool,
    sink: Arc<Mutex<LogSink>>,
}

impl Logger {
    /// Console-only logger
    pub fn console(debug: bool) -> Self {
        Self {
            debug,
            sink: Arc::new(Mutex::new(LogSink {
                console: true,
                ..Default::default()
            })),
        }
    }

    /// Console logger that also writes `quickfix_<timestamp>.log` in `log_dir`.
    ///
    /// If the log file cannot be created the logger silently stays
    /// console-only.
    pub fn with_log_dir(debug: bool, log_dir: &Path) -> Self {
        let _ = fs::create_dir_all(log_dir);

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("quickfix_{}.log", timestamp));

        let mut log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok();

        if let Some(ref mut file) = log_file {
            let _ = writeln!(file, "{}", log_header());
        }

        Self {
            debug,
            sink: Arc::new(Mutex::new(LogSink {
                log_file,
                console: true,
                captured: None,
            })),
        }
    }

    /// In-memory logger, used by tests to assert on emitted messages
    pub fn capture(debug: bool) -> Self {
        Self {
            debug,
            sink: Arc::new(Mutex::new(LogSink {
                captured: Some(Vec::new()),
                ..Default::default()
            })),
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Lines recorded by a capturing logger (empty otherwise)
    pub fn captured(&self) -> Vec<String> {
        self.sink.lock().captured.clone().unwrap_or_default()
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level == LogLevel::Debug && !self.debug {
            return;
        }

        let console_line = format!("{} {}", level.prefix(), message);
        let file_line = format!("[{}] {}", Local::now().format("%H:%M:%S"), console_line);
        self.sink.lock().write_line(&console_line, &file_line);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn download(&self, message: &str) {
        self.log(LogLevel::Download, message);
    }

    pub fn install(&self, message: &str) {
        self.log(LogLevel::Install, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}
