use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::{
    config::PartialPolicy,
    crawler::twse::{
        realtime::{QueryTime, RawStockInfo, StockInfoResponse},
        Symbol,
    },
    declare::StockExchange,
    error::{QuoteError, Result, ValidationError},
    logging,
    util::text,
};

/// 報價顯示
pub mod format;

/// 交易所時區 UTC+8，沒有日光節約
const EXCHANGE_OFFSET_SECS: i32 = 8 * 3600;

/// 8 小時在 `FixedOffset` 的有效範圍 (±24 小時) 內，`east_opt` 一定有值
pub fn exchange_offset() -> FixedOffset {
    FixedOffset::east_opt(EXCHANGE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// 最佳五檔的其中一檔
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: u64,
}

/// 一檔股票在查詢當下的即時報價
///
/// 價格為 `None` 表示交易所目前沒有該欄位的資料 (例如開盤前尚無成交)，
/// 與價格為零是不同的狀態。
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StockInfo {
    pub symbol: String,
    pub name: String,
    pub full_name: String,
    pub exchange: Option<StockExchange>,
    /// 最近成交價 `z`，沒有時依序改用前一筆成交價 `pz`、最佳一檔買賣價的中間價
    pub last_price: Option<Decimal>,
    pub open_price: Option<Decimal>,
    pub high_price: Option<Decimal>,
    pub low_price: Option<Decimal>,
    pub prev_close: Option<Decimal>,
    pub upper_limit: Option<Decimal>,
    pub lower_limit: Option<Decimal>,
    pub best_bid_price: Option<Decimal>,
    pub best_ask_price: Option<Decimal>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub accumulated_volume: u64,
    pub timestamp: DateTime<FixedOffset>,
}

impl TryFrom<&RawStockInfo> for StockInfo {
    type Error = ValidationError;

    fn try_from(raw: &RawStockInfo) -> Result<Self, Self::Error> {
        let symbol = required(None, "c", raw.symbol.as_deref())?;
        let name = required(Some(symbol.as_str()), "n", raw.name.as_deref())?;
        let field = FieldReader { symbol: &symbol };

        let bids = field.price_levels(
            ("b", raw.bid_prices.as_deref()),
            ("g", raw.bid_volumes.as_deref()),
        )?;
        let asks = field.price_levels(
            ("a", raw.ask_prices.as_deref()),
            ("f", raw.ask_volumes.as_deref()),
        )?;
        let best_bid_price = bids.first().map(|l| l.price);
        let best_ask_price = asks.first().map(|l| l.price);

        let last_price = match field.decimal("z", raw.last_price.as_deref())? {
            Some(p) => Some(p),
            None => match field.decimal("pz", raw.trade_price.as_deref())? {
                Some(p) => Some(p),
                None => field.mid_price(
                    best_ask_price,
                    best_bid_price,
                    raw.ask_prices.as_deref(),
                )?,
            },
        };

        Ok(StockInfo {
            full_name: raw
                .full_name
                .as_deref()
                .filter(|s| !text::is_unavailable(s))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| name.clone()),
            exchange: raw
                .exchange
                .as_deref()
                .and_then(StockExchange::from_channel_prefix),
            last_price,
            open_price: field.decimal("o", raw.open_price.as_deref())?,
            high_price: field.decimal("h", raw.high_price.as_deref())?,
            low_price: field.decimal("l", raw.low_price.as_deref())?,
            prev_close: field.decimal("y", raw.prev_close.as_deref())?,
            upper_limit: field.decimal("u", raw.upper_limit.as_deref())?,
            lower_limit: field.decimal("w", raw.lower_limit.as_deref())?,
            best_bid_price,
            best_ask_price,
            bids,
            asks,
            accumulated_volume: field.volume("v", raw.accumulated_volume.as_deref())?,
            timestamp: field.timestamp(raw)?,
            symbol,
            name,
        })
    }
}

fn required(
    symbol: Option<&str>,
    field: &'static str,
    value: Option<&str>,
) -> Result<String, ValidationError> {
    match value {
        Some(v) if !text::is_unavailable(v) => Ok(v.trim().to_string()),
        _ => Err(ValidationError::MissingField {
            symbol: symbol.map(str::to_string),
            field,
        }),
    }
}

/// 將交易所的字串欄位轉成對應型別，失敗時帶上股票代號與欄位名稱
struct FieldReader<'a> {
    symbol: &'a str,
}

impl FieldReader<'_> {
    fn malformed(&self, field: &'static str, value: &str) -> ValidationError {
        ValidationError::MalformedNumber {
            symbol: self.symbol.to_string(),
            field,
            value: value.to_string(),
        }
    }

    fn decimal(
        &self,
        field: &'static str,
        value: Option<&str>,
    ) -> Result<Option<Decimal>, ValidationError> {
        let Some(v) = value.filter(|v| !text::is_unavailable(v)) else {
            return Ok(None);
        };

        let d = text::parse_decimal(v).map_err(|_| self.malformed(field, v))?;
        if d.is_sign_negative() && !d.is_zero() {
            return Err(ValidationError::NegativeValue {
                symbol: self.symbol.to_string(),
                field,
            });
        }

        Ok(Some(d.normalize()))
    }

    fn volume(&self, field: &'static str, value: Option<&str>) -> Result<u64, ValidationError> {
        let Some(v) = value.filter(|v| !text::is_unavailable(v)) else {
            return Ok(0);
        };

        let n = text::parse_i64(v).map_err(|_| self.malformed(field, v))?;
        u64::try_from(n).map_err(|_| ValidationError::NegativeValue {
            symbol: self.symbol.to_string(),
            field,
        })
    }

    /// 最佳一檔買賣價的中間價，相加溢位時視為格式錯誤的數字
    fn mid_price(
        &self,
        ask: Option<Decimal>,
        bid: Option<Decimal>,
        raw_ask: Option<&str>,
    ) -> Result<Option<Decimal>, ValidationError> {
        let (Some(ask), Some(bid)) = (ask, bid) else {
            return Ok(None);
        };

        ask.checked_add(bid)
            .and_then(|sum| sum.checked_div(dec!(2)))
            .map(|mid| Some(mid.normalize()))
            .ok_or_else(|| self.malformed("a", raw_ask.unwrap_or_default()))
    }

    /// 最佳五檔，價格與數量皆以 `_` 分隔且結尾多一個 `_`
    fn price_levels(
        &self,
        (price_field, prices): (&'static str, Option<&str>),
        (volume_field, volumes): (&'static str, Option<&str>),
    ) -> Result<Vec<PriceLevel>, ValidationError> {
        let split = |s: Option<&str>| -> Vec<String> {
            s.unwrap_or_default()
                .split('_')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        };
        let prices = split(prices);
        let volumes = split(volumes);

        let mut levels = Vec::with_capacity(prices.len());
        for (i, p) in prices.iter().enumerate() {
            let Some(price) = self.decimal(price_field, Some(p.as_str()))? else {
                continue;
            };
            let volume = self.volume(volume_field, volumes.get(i).map(String::as_str))?;
            levels.push(PriceLevel { price, volume });
        }

        Ok(levels)
    }

    /// 優先使用 tlong，沒有時以 d + t 組合
    fn timestamp(&self, raw: &RawStockInfo) -> Result<DateTime<FixedOffset>, ValidationError> {
        let offset = exchange_offset();

        let from_tlong = raw
            .timestamp
            .as_deref()
            .and_then(|t| t.trim().parse::<i64>().ok())
            .filter(|ms| *ms > 0)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|utc| utc.with_timezone(&offset));

        let from_date_time = || {
            let date = NaiveDate::parse_from_str(raw.trade_date.as_deref()?.trim(), "%Y%m%d").ok()?;
            let time = NaiveTime::parse_from_str(raw.trade_time.as_deref()?.trim(), "%H:%M:%S").ok()?;
            offset
                .from_local_datetime(&NaiveDateTime::new(date, time))
                .single()
        };

        from_tlong
            .or_else(from_date_time)
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                symbol: self.symbol.to_string(),
                tlong: raw.timestamp.clone().unwrap_or_default(),
                date: raw.trade_date.clone().unwrap_or_default(),
                time: raw.trade_time.clone().unwrap_or_default(),
            })
    }
}

/// 一次查詢的結果，順序與查詢的代號相同
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub stocks: Vec<StockInfo>,
    /// 有查詢但沒有回傳 (或資料不完整而被略過) 的代號
    pub missing: Vec<String>,
    /// 交易所回應的系統時間
    pub query_time: Option<DateTime<FixedOffset>>,
}

impl QueryResult {
    /// 依查詢的代號整理交易所回傳的資料
    ///
    /// 同一代號只取第一筆 (純數字代號會同時查上市與上櫃，正常只有一邊有資料)。
    /// 資料轉換失敗或查不到的代號在 `PartialPolicy::Omit` 下會被略過並記錄，
    /// `PartialPolicy::Strict` 下直接回傳錯誤。全部都查不到時回傳
    /// `QuoteError::NotFound`。
    pub fn assemble(
        symbols: &[Symbol],
        response: StockInfoResponse,
        policy: PartialPolicy,
    ) -> Result<QueryResult> {
        let mut parsed: Vec<Option<StockInfo>> = Vec::with_capacity(response.msg_array.len());
        for raw in &response.msg_array {
            match StockInfo::try_from(raw) {
                Ok(stock) => parsed.push(Some(stock)),
                Err(why) => {
                    if policy == PartialPolicy::Strict {
                        return Err(why.into());
                    }
                    logging::warn_file_async(format!(
                        "Skip twse realtime record {:?} because {}",
                        raw.symbol, why
                    ));
                }
            }
        }

        let mut stocks = Vec::with_capacity(symbols.len());
        let mut missing = Vec::new();
        for symbol in symbols {
            let found = parsed
                .iter_mut()
                .find(|s| matches!(s, Some(stock) if symbol.matches(&stock.symbol)))
                .and_then(Option::take);

            match found {
                Some(stock) => stocks.push(stock),
                None => missing.push(symbol.code().to_string()),
            }
        }

        if stocks.is_empty() {
            return Err(QuoteError::NotFound {
                symbols: symbols.iter().map(|s| s.code().to_string()).collect(),
            });
        }

        if !missing.is_empty() {
            if policy == PartialPolicy::Strict {
                return Err(QuoteError::NotFound { symbols: missing });
            }
            logging::warn_file_async(format!("twse realtime has no quote for {:?}", missing));
        }

        Ok(QueryResult {
            stocks,
            missing,
            query_time: response.query_time.as_ref().and_then(parse_query_time),
        })
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// 每個查詢的代號都有回傳資料
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StockInfo> {
        self.stocks.iter()
    }

    pub fn get(&self, symbol: &str) -> Option<&StockInfo> {
        self.stocks
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol.trim()))
    }
}

impl IntoIterator for QueryResult {
    type Item = StockInfo;
    type IntoIter = std::vec::IntoIter<StockInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.stocks.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a StockInfo;
    type IntoIter = std::slice::Iter<'a, StockInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.stocks.iter()
    }
}

fn parse_query_time(query_time: &QueryTime) -> Option<DateTime<FixedOffset>> {
    let date = NaiveDate::parse_from_str(query_time.sys_date.as_deref()?, "%Y%m%d").ok()?;
    let time = NaiveTime::parse_from_str(query_time.sys_time.as_deref()?, "%H:%M:%S").ok()?;
    exchange_offset()
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    fn fixture(json: &str) -> StockInfoResponse {
        serde_json::from_str(json).unwrap()
    }

    fn symbols(codes: &[&str]) -> Vec<Symbol> {
        codes.iter().map(|c| Symbol::parse(c).unwrap()).collect()
    }

    fn raw(json: &str) -> RawStockInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_stock_info_from_raw() {
        let response = fixture(include_str!("../../tests/testdata/2330.json"));
        let stock = StockInfo::try_from(&response.msg_array[0]).unwrap();

        assert_eq!(stock.symbol, "2330");
        assert_eq!(stock.name, "台積電");
        assert_eq!(stock.full_name, "台灣積體電路製造股份有限公司");
        assert_eq!(stock.exchange, Some(StockExchange::TWSE));
        assert_eq!(stock.last_price, Some(dec!(735)));
        assert_eq!(stock.open_price, Some(dec!(730)));
        assert_eq!(stock.high_price, Some(dec!(738)));
        assert_eq!(stock.low_price, Some(dec!(728)));
        assert_eq!(stock.prev_close, Some(dec!(730)));
        assert_eq!(stock.upper_limit, Some(dec!(803)));
        assert_eq!(stock.lower_limit, Some(dec!(657)));
        assert_eq!(stock.best_bid_price, Some(dec!(735)));
        assert_eq!(stock.best_ask_price, Some(dec!(736)));
        assert_eq!(stock.bids.len(), 5);
        assert_eq!(
            stock.asks[4],
            PriceLevel {
                price: dec!(740),
                volume: 1027
            }
        );
        assert_eq!(stock.accumulated_volume, 18342);

        assert_eq!(stock.timestamp.offset().local_minus_utc(), 8 * 3600);
        assert_eq!(
            (stock.timestamp.year(), stock.timestamp.month(), stock.timestamp.day()),
            (2024, 5, 10)
        );
        assert_eq!(
            (stock.timestamp.hour(), stock.timestamp.minute(), stock.timestamp.second()),
            (13, 30, 0)
        );
    }

    #[test]
    fn test_blank_bid_ask_is_unavailable() {
        let response = fixture(include_str!("../../tests/testdata/2330_2317.json"));
        let stock = StockInfo::try_from(&response.msg_array[0]).unwrap();

        assert_eq!(stock.symbol, "2317");
        assert_eq!(stock.best_bid_price, None);
        assert!(stock.bids.is_empty());
        assert_eq!(stock.best_ask_price, Some(dec!(151)));
    }

    #[test]
    fn test_no_trade_uses_mid_price() {
        let response = fixture(include_str!("../../tests/testdata/006208_before_open.json"));
        let stock = StockInfo::try_from(&response.msg_array[0]).unwrap();

        assert_eq!(stock.last_price, Some(dec!(108.05)));
        assert_eq!(stock.open_price, None);
        assert_eq!(stock.high_price, None);
        assert_eq!(stock.low_price, None);
        assert_eq!(stock.accumulated_volume, 0);
    }

    #[test]
    fn test_last_price_falls_back_to_trade_price() {
        let response = fixture(include_str!("../../tests/testdata/2330_between_trades.json"));
        let stock = StockInfo::try_from(&response.msg_array[0]).unwrap();

        assert_eq!(stock.best_ask_price, Some(dec!(736)));
        assert_eq!(stock.best_bid_price, Some(dec!(730)));
        assert_eq!(stock.last_price, Some(dec!(735)));

        let stock = StockInfo::try_from(&raw(
            r#"{"c":"2330","n":"台積電","z":"-","pz":"-","a":"736_","b":"730_","tlong":"1715319000000"}"#,
        ))
        .unwrap();
        assert_eq!(stock.last_price, Some(dec!(733)));
    }

    #[test]
    fn test_mid_price_overflow_is_malformed() {
        let huge = "70000000000000000000000000000";
        let json = format!(
            r#"{{"c":"2330","n":"台積電","z":"-","a":"{huge}_","b":"{huge}_","tlong":"1715319000000"}}"#
        );

        assert!(matches!(
            StockInfo::try_from(&raw(&json)),
            Err(ValidationError::MalformedNumber { field: "a", .. })
        ));
    }

    #[test]
    fn test_exchange_offset() {
        assert_eq!(exchange_offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_no_trade_and_no_quote() {
        let stock = StockInfo::try_from(&raw(
            r#"{"c":"2539","n":"櫻花建","z":"-","a":"-","b":"-","tlong":"1715319000000"}"#,
        ))
        .unwrap();
        assert_eq!(stock.last_price, None);
        assert_eq!(stock.full_name, "櫻花建");
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(
            StockInfo::try_from(&raw(r#"{"n":"台積電","tlong":"1715319000000"}"#)),
            Err(ValidationError::MissingField {
                symbol: None,
                field: "c"
            })
        );
        assert_eq!(
            StockInfo::try_from(&raw(r#"{"c":"2330","n":"-","tlong":"1715319000000"}"#)),
            Err(ValidationError::MissingField {
                symbol: Some("2330".to_string()),
                field: "n"
            })
        );
    }

    #[test]
    fn test_malformed_and_negative_numbers() {
        assert!(matches!(
            StockInfo::try_from(&raw(
                r#"{"c":"2330","n":"台積電","z":"7x5","tlong":"1715319000000"}"#
            )),
            Err(ValidationError::MalformedNumber { field: "z", .. })
        ));
        assert!(matches!(
            StockInfo::try_from(&raw(
                r#"{"c":"2330","n":"台積電","o":"-730.0000","tlong":"1715319000000"}"#
            )),
            Err(ValidationError::NegativeValue { field: "o", .. })
        ));
        assert!(matches!(
            StockInfo::try_from(&raw(
                r#"{"c":"2330","n":"台積電","v":"-5","tlong":"1715319000000"}"#
            )),
            Err(ValidationError::NegativeValue { field: "v", .. })
        ));
    }

    #[test]
    fn test_timestamp_fallback_to_date_and_time() {
        let stock = StockInfo::try_from(&raw(
            r#"{"c":"2330","n":"台積電","d":"20240510","t":"09:05:30"}"#,
        ))
        .unwrap();
        assert_eq!(
            stock.timestamp.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
            "2024-05-10 09:05:30 +08:00"
        );

        assert!(matches!(
            StockInfo::try_from(&raw(r#"{"c":"2330","n":"台積電","tlong":"-"}"#)),
            Err(ValidationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_assemble_skips_invalid_record() {
        let response = fixture(
            r#"{"msgArray":[
                {"c":"2330","n":"台積電","z":"abc","tlong":"1715319000000"},
                {"c":"2317","n":"鴻海","z":"151.0000","tlong":"1715319000000"}
            ],"rtcode":"0000"}"#,
        );

        let result =
            QueryResult::assemble(&symbols(&["2330", "2317"]), response.clone(), PartialPolicy::Omit)
                .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.missing, vec!["2330".to_string()]);
        assert!(result.get("2317").is_some());
        assert!(result.query_time.is_none());

        assert!(matches!(
            QueryResult::assemble(&symbols(&["2330", "2317"]), response, PartialPolicy::Strict),
            Err(QuoteError::Validation(ValidationError::MalformedNumber { .. }))
        ));
    }

    #[test]
    fn test_assemble_keeps_first_record_per_symbol() {
        let response = fixture(
            r#"{"msgArray":[
                {"c":"2330","n":"台積電","ex":"tse","z":"735.0000","tlong":"1715319000000"},
                {"c":"2330","n":"台積電","ex":"otc","z":"1.0000","tlong":"1715319000000"},
                {"c":"t00","n":"發行量加權股價指數","z":"20702.25","tlong":"1715319000000"}
            ]}"#,
        );

        let result = QueryResult::assemble(
            &symbols(&["tse_t00.tw", "2330"]),
            response,
            PartialPolicy::Omit,
        )
        .unwrap();
        let codes: Vec<_> = result.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(codes, vec!["t00", "2330"]);
        assert_eq!(result.stocks[1].exchange, Some(StockExchange::TWSE));
        assert_eq!(result.stocks[1].last_price, Some(dec!(735)));
        assert!(result.is_complete());
    }

    #[test]
    fn test_assemble_query_time() {
        let result = QueryResult::assemble(
            &symbols(&["2330"]),
            fixture(include_str!("../../tests/testdata/2330.json")),
            PartialPolicy::Omit,
        )
        .unwrap();
        assert_eq!(
            result
                .query_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            Some("2024-05-10 13:30:05".to_string())
        );
        assert_eq!(result.into_iter().count(), 1);
    }
}
