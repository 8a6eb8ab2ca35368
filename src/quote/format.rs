use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::{
    bot::telegram::escape,
    quote::{QueryResult, StockInfo},
    util::text,
};

/// 沒有任何報價時的訊息
pub const NO_STOCK_INFORMATION: &str = "*No stock information available*";

/// 欄位沒有資料時顯示的文字
const UNAVAILABLE: &str = "-";

/// 漲跌方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(change: Decimal) -> Self {
        if change > Decimal::ZERO {
            Direction::Up
        } else if change < Decimal::ZERO {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Direction::Up => "🔺",
            Direction::Down => "🔻",
            Direction::Flat => "⏸️",
        }
    }
}

impl StockInfo {
    /// 漲跌幅的比較基準：昨收，沒有昨收時用開盤價
    pub fn baseline_price(&self) -> Option<Decimal> {
        self.prev_close
            .filter(|p| *p > Decimal::ZERO)
            .or_else(|| self.open_price.filter(|p| *p > Decimal::ZERO))
    }

    /// 漲跌幅 (%)，四捨五入到小數第二位；缺少成交價、基準價或計算溢位時為 0
    pub fn change_percent(&self) -> Decimal {
        let (Some(last), Some(base)) = (self.last_price, self.baseline_price()) else {
            return Decimal::ZERO;
        };

        let change = last
            .checked_div(base)
            .and_then(|ratio| ratio.checked_sub(Decimal::ONE))
            .and_then(|ratio| ratio.checked_mul(dec!(100)));
        match change {
            Some(change) => {
                let rounded =
                    change.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                if rounded.is_zero() {
                    Decimal::ZERO
                } else {
                    rounded
                }
            }
            None => Decimal::ZERO,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::of(self.change_percent())
    }

    /// 轉成 Telegram MarkdownV2 格式的文字
    ///
    /// ```text
    /// ⏰ 2024\-05\-10 13:30:00
    /// 📊 *台積電 \(2330\)*
    /// Open: `730\.00`
    /// High: `738\.00`
    /// Low: `728\.00`
    /// Last: `735\.00`
    /// Change: 🔺 `\+0\.68%`
    /// Volume: `18,342`
    /// ```
    pub fn pretty_repr(&self) -> String {
        let change = self.change_percent();
        let sign = if change < Decimal::ZERO { "" } else { "+" };

        format!(
            "⏰ {time}\n\
             📊 *{name} \\({symbol}\\)*\n\
             Open: `{open}`\n\
             High: `{high}`\n\
             Low: `{low}`\n\
             Last: `{last}`\n\
             Change: {glyph} `{change}`\n\
             Volume: `{volume}`",
            time = escape(&self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            name = escape(&self.name),
            symbol = escape(&self.symbol),
            open = escape(&price_or_unavailable(self.open_price)),
            high = escape(&price_or_unavailable(self.high_price)),
            low = escape(&price_or_unavailable(self.low_price)),
            last = escape(&price_or_unavailable(self.last_price)),
            glyph = Direction::of(change).glyph(),
            change = escape(&format!("{}{:.2}%", sign, change)),
            volume = escape(&text::group_thousands(&self.accumulated_volume.to_string())),
        )
    }
}

fn price_or_unavailable(price: Option<Decimal>) -> String {
    price
        .map(text::format_price)
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

impl fmt::Display for StockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_repr())
    }
}

impl QueryResult {
    /// 每檔股票一個區塊，依查詢順序以空行分隔
    pub fn pretty_repr(&self) -> String {
        if self.stocks.is_empty() {
            return NO_STOCK_INFORMATION.to_string();
        }

        self.stocks
            .iter()
            .map(StockInfo::pretty_repr)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_repr())
    }
}
