use serde::{Deserialize, Serialize};

/// 交易所
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockExchange {
    /// 臺灣證券交易所 1
    TWSE,
    /// 證券櫃檯買賣市場 2
    TPEx,
}

impl StockExchange {
    /// 即時報價頻道的前綴，例︰tse_2330.tw
    pub fn channel_prefix(&self) -> &'static str {
        match self {
            StockExchange::TWSE => "tse",
            StockExchange::TPEx => "otc",
        }
    }

    /// 由回傳資料的 `ex` 欄位判斷交易所
    pub fn from_channel_prefix(prefix: &str) -> Option<StockExchange> {
        match prefix.trim().to_ascii_lowercase().as_str() {
            "tse" => Some(StockExchange::TWSE),
            "otc" => Some(StockExchange::TPEx),
            _ => None,
        }
    }

    pub fn iterator() -> impl Iterator<Item = Self> {
        [Self::TWSE, Self::TPEx].iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_prefix() {
        let prefixes: Vec<_> = StockExchange::iterator()
            .map(|e| e.channel_prefix())
            .collect();
        assert_eq!(prefixes, vec!["tse", "otc"]);
        assert_eq!(
            StockExchange::from_channel_prefix("OTC"),
            Some(StockExchange::TPEx)
        );
        assert_eq!(StockExchange::from_channel_prefix("nyse"), None);
    }
}
