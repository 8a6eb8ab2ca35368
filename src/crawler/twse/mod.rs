use std::{fmt, time::Duration};

use concat_string::concat_string;
use once_cell::sync::OnceCell;
use reqwest::Client;

use crate::{
    config::{PartialPolicy, SETTINGS},
    declare::StockExchange,
    error::{Result, ValidationError},
    logging,
    quote::QueryResult,
    util::http::{self, TransportOptions},
};

/// 基本市況報導-即時報價
pub mod realtime;

const MAX_SYMBOL_LEN: usize = 32;

/// 共用的預設 client，第一次查詢時依 `SETTINGS` 建立
static DEFAULT_CLIENT: OnceCell<TwseClient> = OnceCell::new();

/// 查詢用的股票代號
///
/// 純數字的代號 (例︰`2330`) 會同時查詢上市與上櫃頻道；其他寫法
/// (例︰`tse_t00.tw`) 視為已經指定好的頻道，原樣送出。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let len = trimmed.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        if let Some(ch) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
        {
            return Err(ValidationError::SymbolInvalidChar {
                symbol: trimmed.to_string(),
                ch,
            });
        }

        Ok(Symbol(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_code(&self) -> bool {
        self.0.chars().all(|c| c.is_ascii_digit())
    }

    /// 要送給交易所的頻道
    pub fn channels(&self) -> Vec<String> {
        if self.is_code() {
            StockExchange::iterator()
                .map(|e| concat_string!(e.channel_prefix(), "_", self.0, ".tw"))
                .collect()
        } else {
            vec![self.0.clone()]
        }
    }

    /// 回傳資料 `c` 欄位對應的代號，例︰`tse_t00.tw` => `t00`
    pub fn code(&self) -> &str {
        if self.is_code() {
            return &self.0;
        }

        let without_prefix = self
            .0
            .split_once('_')
            .filter(|(prefix, _)| StockExchange::from_channel_prefix(prefix).is_some())
            .map(|(_, rest)| rest)
            .unwrap_or(&self.0);

        match without_prefix.len().checked_sub(3) {
            Some(at)
                if without_prefix.is_char_boundary(at)
                    && without_prefix[at..].eq_ignore_ascii_case(".tw") =>
            {
                &without_prefix[..at]
            }
            _ => without_prefix,
        }
    }

    /// 比對回傳資料的代號
    pub fn matches(&self, code: &str) -> bool {
        self.code().eq_ignore_ascii_case(code.trim())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// 單一代號或代號清單皆可作為查詢參數
pub trait IntoSymbols {
    fn into_symbols(self) -> Vec<String>;
}

impl IntoSymbols for &str {
    fn into_symbols(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoSymbols for String {
    fn into_symbols(self) -> Vec<String> {
        vec![self]
    }
}

impl<S: AsRef<str>> IntoSymbols for &[S] {
    fn into_symbols(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>> IntoSymbols for Vec<S> {
    fn into_symbols(self) -> Vec<String> {
        self.as_slice().into_symbols()
    }
}

impl<S: AsRef<str>, const N: usize> IntoSymbols for [S; N] {
    fn into_symbols(self) -> Vec<String> {
        self.as_slice().into_symbols()
    }
}

/// 驗證代號並去除重複，保留第一次出現的順序
///
/// 清單為空時在送出任何請求前就回傳錯誤。
pub fn parse_symbols<S: IntoSymbols>(symbols: S) -> Result<Vec<Symbol>, ValidationError> {
    let inputs = symbols.into_symbols();
    if inputs.is_empty() {
        return Err(ValidationError::EmptySymbols);
    }

    let mut parsed: Vec<Symbol> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let symbol = Symbol::parse(&input)?;
        if !parsed.contains(&symbol) {
            parsed.push(symbol);
        }
    }

    Ok(parsed)
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub transport: TransportOptions,
    pub partial_policy: PartialPolicy,
}

impl ClientOptions {
    /// 依 `app.json` 與環境變數建立
    pub fn from_settings() -> Self {
        let twse = &SETTINGS.twse;
        ClientOptions {
            base_url: twse.base_url.clone(),
            transport: TransportOptions {
                timeout: Duration::from_secs(twse.timeout_secs),
                connect_timeout: Duration::from_secs(twse.connect_timeout_secs),
                proxy: twse.proxy.clone(),
            },
            partial_policy: twse.partial_policy,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_partial_policy(mut self, policy: PartialPolicy) -> Self {
        self.partial_policy = policy;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        let twse = crate::config::Twse::default();
        ClientOptions {
            base_url: twse.base_url,
            transport: TransportOptions {
                timeout: Duration::from_secs(twse.timeout_secs),
                connect_timeout: Duration::from_secs(twse.connect_timeout_secs),
                proxy: twse.proxy,
            },
            partial_policy: twse.partial_policy,
        }
    }
}

/// 臺灣證券交易所即時報價查詢
#[derive(Debug, Clone)]
pub struct TwseClient {
    http: Client,
    options: ClientOptions,
}

impl TwseClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = http::build_client(&options.transport)?;
        Ok(TwseClient { http, options })
    }

    /// 使用呼叫端自己管理的 reqwest client，`options.transport` 不會套用
    pub fn with_client(http: Client, options: ClientOptions) -> Self {
        TwseClient { http, options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// 查詢一檔或多檔股票的即時報價
    ///
    /// 結果依照查詢順序排列，同一代號只會出現一次。查不到的代號依
    /// `PartialPolicy` 略過 (列在 `QueryResult::missing`) 或讓整批失敗；
    /// 全部都查不到時一律回傳 `QuoteError::NotFound`。
    pub async fn query<S: IntoSymbols>(&self, symbols: S) -> Result<QueryResult> {
        let symbols = parse_symbols(symbols)?;
        let response = realtime::visit(self, &symbols).await?;
        logging::debug_file_async(format!(
            "twse realtime {} returned {} records",
            realtime::build_ex_ch(&symbols),
            response.msg_array.len()
        ));

        QueryResult::assemble(&symbols, response, self.options.partial_policy)
    }
}

fn default_client() -> Result<&'static TwseClient> {
    DEFAULT_CLIENT.get_or_try_init(|| TwseClient::new(ClientOptions::from_settings()))
}

/// 以共用的 client 查詢即時報價
pub async fn query_stock_info<S: IntoSymbols>(symbols: S) -> Result<QueryResult> {
    default_client()?.query(symbols).await
}
