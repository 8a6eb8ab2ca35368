//! 臺灣證券交易所基本市況報導 (mis.twse.com.tw) 的即時報價查詢
//!
//! ```no_run
//! # async fn run() -> twse_quote::error::Result<()> {
//! let result = twse_quote::query_stock_info(["2330", "2317"]).await?;
//! for stock in &result {
//!     println!("{} {:?}", stock.symbol, stock.last_price);
//! }
//! println!("{}", result.pretty_repr());
//! # Ok(())
//! # }
//! ```

pub mod bot;
pub mod config;
pub mod crawler;
pub mod declare;
pub mod error;
pub mod logging;
pub mod quote;
pub mod util;

pub use crate::{
    config::PartialPolicy,
    crawler::twse::{query_stock_info, ClientOptions, IntoSymbols, Symbol, TwseClient},
    error::{QuoteError, ValidationError},
    quote::{format::Direction, PriceLevel, QueryResult, StockInfo},
};
