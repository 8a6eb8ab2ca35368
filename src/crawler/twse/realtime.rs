use std::collections::HashMap;

use chrono::Local;
use concat_string::concat_string;
use reqwest::header::{self, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    crawler::twse::{Symbol, TwseClient},
    error::{QuoteError, Result},
    util::http,
};

/// 基本市況報導 API 的路徑
pub const PATH: &str = "/stock/api/getStockInfo.jsp";

/// 交易所回應代碼，0000 表示成功
const RT_CODE_OK: &str = "0000";

/// 即時報價的一筆原始資料，欄位名稱沿用交易所的縮寫
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawStockInfo {
    /// 股票代號
    #[serde(rename = "c", default, deserialize_with = "string_or_number")]
    pub symbol: Option<String>,
    /// 股票簡稱
    #[serde(rename = "n", default, deserialize_with = "string_or_number")]
    pub name: Option<String>,
    /// 公司全名
    #[serde(rename = "nf", default, deserialize_with = "string_or_number")]
    pub full_name: Option<String>,
    /// tse 上市 / otc 上櫃
    #[serde(rename = "ex", default, deserialize_with = "string_or_number")]
    pub exchange: Option<String>,
    /// 最近成交價
    #[serde(rename = "z", default, deserialize_with = "string_or_number")]
    pub last_price: Option<String>,
    /// 前一筆成交價
    #[serde(rename = "pz", default, deserialize_with = "string_or_number")]
    pub trade_price: Option<String>,
    /// 開盤價
    #[serde(rename = "o", default, deserialize_with = "string_or_number")]
    pub open_price: Option<String>,
    /// 最高價
    #[serde(rename = "h", default, deserialize_with = "string_or_number")]
    pub high_price: Option<String>,
    /// 最低價
    #[serde(rename = "l", default, deserialize_with = "string_or_number")]
    pub low_price: Option<String>,
    /// 昨收價
    #[serde(rename = "y", default, deserialize_with = "string_or_number")]
    pub prev_close: Option<String>,
    /// 漲停價
    #[serde(rename = "u", default, deserialize_with = "string_or_number")]
    pub upper_limit: Option<String>,
    /// 跌停價
    #[serde(rename = "w", default, deserialize_with = "string_or_number")]
    pub lower_limit: Option<String>,
    /// 累積成交量
    #[serde(rename = "v", default, deserialize_with = "string_or_number")]
    pub accumulated_volume: Option<String>,
    /// 當盤成交量
    #[serde(rename = "tv", default, deserialize_with = "string_or_number")]
    pub trade_volume: Option<String>,
    /// 最佳五檔賣價，以 `_` 分隔
    #[serde(rename = "a", default, deserialize_with = "string_or_number")]
    pub ask_prices: Option<String>,
    /// 最佳五檔買價，以 `_` 分隔
    #[serde(rename = "b", default, deserialize_with = "string_or_number")]
    pub bid_prices: Option<String>,
    /// 最佳五檔賣量，以 `_` 分隔
    #[serde(rename = "f", default, deserialize_with = "string_or_number")]
    pub ask_volumes: Option<String>,
    /// 最佳五檔買量，以 `_` 分隔
    #[serde(rename = "g", default, deserialize_with = "string_or_number")]
    pub bid_volumes: Option<String>,
    /// 資料時間 (epoch 毫秒)
    #[serde(rename = "tlong", default, deserialize_with = "string_or_number")]
    pub timestamp: Option<String>,
    /// 交易日 YYYYMMDD
    #[serde(rename = "d", default, deserialize_with = "string_or_number")]
    pub trade_date: Option<String>,
    /// 資料時刻 HH:MM:SS
    #[serde(rename = "t", default, deserialize_with = "string_or_number")]
    pub trade_time: Option<String>,
    /// 頻道，例︰2330.tw
    #[serde(rename = "ch", default, deserialize_with = "string_or_number")]
    pub channel: Option<String>,
    /// 其餘未使用的欄位，保留下來讓 `save_json` 能完整寫回
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryTime {
    #[serde(default)]
    pub sys_date: Option<String>,
    #[serde(default)]
    pub sys_time: Option<String>,
    #[serde(default)]
    pub stock_info_item: Option<i64>,
    #[serde(default)]
    pub stock_info: Option<i64>,
    #[serde(default)]
    pub session_str: Option<String>,
    #[serde(default)]
    pub show_chart: Option<bool>,
    #[serde(default)]
    pub session_from_time: Option<i64>,
    #[serde(default)]
    pub session_latest_time: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockInfoResponse {
    #[serde(default)]
    pub msg_array: Vec<RawStockInfo>,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default)]
    pub user_delay: Option<i64>,
    #[serde(default)]
    pub rtcode: Option<String>,
    #[serde(default)]
    pub query_time: Option<QueryTime>,
    #[serde(default)]
    pub rtmessage: Option<String>,
    #[serde(default)]
    pub ex_key: Option<String>,
    #[serde(default)]
    pub cached_alive: Option<i64>,
}

impl StockInfoResponse {
    /// rtcode 不是 0000 時回傳 `QuoteError::Exchange`，沒有 rtcode 視為成功
    pub fn ensure_ok(&self) -> Result<()> {
        match self.rtcode.as_deref() {
            None | Some(RT_CODE_OK) => Ok(()),
            Some(code) => Err(QuoteError::Exchange {
                code: code.to_string(),
                message: self.rtmessage.clone().unwrap_or_default(),
            }),
        }
    }
}

/// 交易所偶爾會把數字欄位回成 JSON number，一律轉成字串
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// 組出查詢用的 ex_ch 參數，例︰tse_2330.tw|otc_2330.tw
pub fn build_ex_ch(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .flat_map(|s| s.channels())
        .collect::<Vec<_>>()
        .join("|")
}

/// 組出完整的查詢網址，`_` 參數避免被中間的快取擋下
pub fn build_url(base_url: &str, symbols: &[Symbol]) -> String {
    let ex_ch = build_ex_ch(symbols);
    let cache_buster = Local::now().timestamp_millis().to_string();
    concat_string!(
        base_url.trim_end_matches('/'),
        PATH,
        "?ex_ch=",
        urlencoding::encode(&ex_ch),
        "&json=1&delay=0&_=",
        cache_buster
    )
}

fn build_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers
}

/// 抓取指定股票的即時報價原始資料
pub async fn visit(client: &TwseClient, symbols: &[Symbol]) -> Result<StockInfoResponse> {
    let url = build_url(&client.options().base_url, symbols);
    let response =
        http::get_json::<StockInfoResponse>(client.http(), &url, Some(build_headers())).await?;
    response.ensure_ok()?;

    Ok(response)
}
