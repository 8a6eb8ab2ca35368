use std::{
    env,
    fmt::Write as _,
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
    thread,
};

use chrono::{format::DelayedFormat, DateTime, Local};
use crossbeam_channel::{unbounded, Sender};
use once_cell::sync::Lazy;

/// 日誌目錄的環境變數，未設定時寫到 ./log
const LOG_DIR: &str = "TWSE_LOG_DIR";
/// 批次寫入的緩衝大小
const BATCH_SIZE: usize = 4096;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

pub struct Logger {
    writer: Option<Sender<LogMessage>>,
}

impl Logger {
    pub(crate) fn new(log_name: &str) -> Self {
        let log_path = match Self::get_log_path(log_name) {
            Some(p) => p,
            None => {
                error_console(format!(
                    "Failed to create log directory for {}, file logging disabled.",
                    log_name
                ));
                return Logger { writer: None };
            }
        };
        let (tx, rx) = unbounded::<LogMessage>();

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let file = match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
            {
                Ok(f) => f,
                Err(why) => {
                    error_console(format!(
                        "Failed to open log file {:?} because {:?}",
                        log_path, why
                    ));
                    return;
                }
            };

            let mut writer = BufWriter::new(file);
            let mut line = String::with_capacity(BATCH_SIZE);

            while let Ok(received) = rx.recv() {
                if writeln!(
                    &mut line,
                    "{} {} {}",
                    received.created_at.format("%F %X%.6f"),
                    received.level,
                    received.msg
                )
                .is_err()
                {
                    continue;
                }

                if rx.is_empty() || line.len() >= BATCH_SIZE {
                    if writer.write_all(line.as_bytes()).is_err() || writer.flush().is_err() {
                        info_console(line.clone())
                    }

                    line.clear();
                }
            }
        });

        Logger { writer: Some(tx) }
    }

    pub(crate) fn info(&self, log: String) {
        self.send(log::Level::Info, log);
    }

    pub(crate) fn warn(&self, log: String) {
        self.send(log::Level::Warn, log);
    }

    pub(crate) fn error(&self, log: String) {
        self.send(log::Level::Error, log);
    }

    pub(crate) fn debug(&self, log: String) {
        self.send(log::Level::Debug, log);
    }

    fn send(&self, level: log::Level, msg: String) {
        let Some(writer) = &self.writer else {
            return;
        };

        if let Err(why) = writer.send(LogMessage::new(level, msg)) {
            error_console(why.to_string());
        }
    }

    fn get_log_path(name: &str) -> Option<PathBuf> {
        let path = env::var(LOG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("log"));

        if !path.exists() {
            fs::create_dir_all(&path).ok()?;
        }

        let mut log_path = path;
        log_path.push(format!("{}_{}.log", name, Local::now().format("%Y-%m-%d")));

        Some(log_path)
    }
}

pub struct LogMessage {
    pub level: log::Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: log::Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    println!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
