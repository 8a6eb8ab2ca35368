use std::{env, path::PathBuf, str::FromStr};

use anyhow::Result;
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::logging;

const CONFIG_PATH: &str = "app.json";

/// 臺灣證券交易所基本市況報導網站
pub const DEFAULT_BASE_URL: &str = "https://mis.twse.com.tw";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub twse: Twse,
}

const TWSE_BASE_URL: &str = "TWSE_BASE_URL";
const TWSE_TIMEOUT_SECS: &str = "TWSE_TIMEOUT_SECS";
const TWSE_CONNECT_TIMEOUT_SECS: &str = "TWSE_CONNECT_TIMEOUT_SECS";
const TWSE_PROXY: &str = "TWSE_PROXY";
const TWSE_PARTIAL_POLICY: &str = "TWSE_PARTIAL_POLICY";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Twse {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub partial_policy: PartialPolicy,
}

impl Default for Twse {
    fn default() -> Self {
        Twse {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            proxy: None,
            partial_policy: PartialPolicy::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    8
}

/// 多檔查詢時，查不到或資料不完整的股票要如何處理
#[derive(Serialize, Deserialize, Default, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartialPolicy {
    /// 略過該檔股票，並記錄在 `QueryResult::missing`
    #[default]
    Omit,
    /// 任何一檔失敗就整批失敗
    Strict,
}

impl FromStr for PartialPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" => Ok(PartialPolicy::Omit),
            "strict" => Ok(PartialPolicy::Strict),
            other => Err(anyhow::anyhow!("unknown partial policy '{}'", other)),
        }
    }
}

pub static SETTINGS: Lazy<App> = Lazy::new(|| {
    App::get().unwrap_or_else(|why| {
        logging::error_console(format!(
            "I can't read the config context because {:?}",
            why
        ));
        App::default().override_with_env()
    })
});

impl App {
    fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::default().override_with_env())
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(base_url) = env::var(TWSE_BASE_URL) {
            self.twse.base_url = base_url;
        }

        if let Ok(timeout) = env::var(TWSE_TIMEOUT_SECS) {
            self.twse.timeout_secs = u64::from_str(&timeout).unwrap_or(self.twse.timeout_secs);
        }

        if let Ok(timeout) = env::var(TWSE_CONNECT_TIMEOUT_SECS) {
            self.twse.connect_timeout_secs =
                u64::from_str(&timeout).unwrap_or(self.twse.connect_timeout_secs);
        }

        if let Ok(proxy) = env::var(TWSE_PROXY) {
            self.twse.proxy = if proxy.trim().is_empty() {
                None
            } else {
                Some(proxy)
            };
        }

        if let Ok(policy) = env::var(TWSE_PARTIAL_POLICY) {
            match PartialPolicy::from_str(&policy) {
                Ok(p) => self.twse.partial_policy = p,
                Err(why) => logging::error_console(format!("{:?}", why)),
            }
        }

        self
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
