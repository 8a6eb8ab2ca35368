use reqwest::StatusCode;
use thiserror::Error;

/// 輸入或回傳資料不符合預期時的錯誤
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol list cannot be empty")]
    EmptySymbols,
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol '{symbol}' contains invalid character '{ch}'")]
    SymbolInvalidChar { symbol: String, ch: char },

    #[error("record {symbol:?} is missing required field '{field}'")]
    MissingField {
        symbol: Option<String>,
        field: &'static str,
    },
    #[error("field '{field}' of {symbol} is not a number: '{value}'")]
    MalformedNumber {
        symbol: String,
        field: &'static str,
        value: String,
    },
    #[error("field '{field}' of {symbol} must be non-negative")]
    NegativeValue { symbol: String, field: &'static str },
    #[error("record {symbol} has no usable timestamp (tlong='{tlong}', d='{date}', t='{time}')")]
    InvalidTimestamp {
        symbol: String,
        tlong: String,
        date: String,
        time: String,
    },
}

/// 查詢即時報價時可能發生的錯誤
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to reach {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: StatusCode },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("exchange answered rtcode {code}: {message}")]
    Exchange { code: String, message: String },

    #[error("no quote returned for {symbols:?}")]
    NotFound { symbols: Vec<String> },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = QuoteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_converts_into_quote_error() {
        let err: QuoteError = ValidationError::EmptySymbols.into();
        assert!(matches!(
            err,
            QuoteError::Validation(ValidationError::EmptySymbols)
        ));
        assert_eq!(err.to_string(), "symbol list cannot be empty");
    }

    #[test]
    fn test_http_error_message() {
        let err = QuoteError::Http {
            url: "https://mis.twse.com.tw".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(
            err.to_string(),
            "HTTP 500 Internal Server Error from https://mis.twse.com.tw"
        );
    }
}
