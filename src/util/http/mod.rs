use std::time::{Duration, Instant};

use once_cell::sync::{Lazy, OnceCell};
use reqwest::{header, Client, Method, Response};
use serde::de::DeserializeOwned;

use crate::{
    error::{QuoteError, Result},
    logging::Logger,
};

pub mod user_agent;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// rustls 只能安裝一次加密實作
static CRYPTO_PROVIDER: OnceCell<()> = OnceCell::new();

/// 建立 reqwest client 所需的傳輸設定
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(8),
            proxy: None,
        }
    }
}

/// Builds a reqwest client tuned for the exchange's quote endpoint.
///
/// # Errors
///
/// Returns `QuoteError::Client` when the proxy URL is invalid or the TLS
/// backend cannot be initialised.
pub fn build_client(options: &TransportOptions) -> Result<Client> {
    CRYPTO_PROVIDER.get_or_init(|| {
        // 已經有其他地方安裝過時會回傳 Err，忽略即可
        let _ = rustls::crypto::ring::default_provider().install_default();
    });

    let mut builder = Client::builder()
        // ===== 壓縮 =====
        .brotli(true)
        .gzip(true)
        .zstd(true)
        // ===== 超時設置 =====
        .connect_timeout(options.connect_timeout)
        .timeout(options.timeout)
        // ===== TCP 優化 =====
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(60))
        // ===== 連接池 =====
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        // ===== Cookie 和重定向 =====
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::limited(5))
        // ===== Headers =====
        .referer(true)
        .user_agent(user_agent::gen_random_ua());

    if let Some(proxy) = options.proxy.as_deref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(QuoteError::Client)?);
    }

    builder.build().map_err(QuoteError::Client)
}

/// Performs an HTTP GET request and deserializes the JSON response into the specified type.
///
/// Transport failures, non-2xx statuses and malformed bodies are reported as
/// `QuoteError::Connection`, `QuoteError::Http` and `QuoteError::Decode`
/// respectively. Nothing is retried.
pub async fn get_json<RES: DeserializeOwned>(
    client: &Client,
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<RES> {
    let response = send(client, Method::GET, url, headers).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(QuoteError::Http {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(|e| QuoteError::Connection {
        url: url.to_string(),
        source: e,
    })?;

    serde_json::from_str(&body).map_err(|e| {
        LOGGER.error(format!("Error parsing response JSON({}): {:?}", body, e));
        QuoteError::Decode {
            url: url.to_string(),
            source: e,
        }
    })
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    headers: Option<header::HeaderMap>,
) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let mut rb = client.request(method, url);

    if let Some(h) = headers {
        rb = rb.headers(h);
    }

    let start = Instant::now();
    let res = rb.send().await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            LOGGER.info(format!(
                "{} {} {} ms",
                visit_log,
                response.status(),
                elapsed
            ));
            Ok(response)
        }
        Err(why) => {
            LOGGER.error(format!(
                "{} failed because {:?}. {} ms",
                visit_log, why, elapsed
            ));
            Err(QuoteError::Connection {
                url: url.to_string(),
                source: why,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, Debug)]
    struct Pong {
        ok: bool,
    }

    #[test]
    fn test_build_client_rejects_bad_proxy() {
        let options = TransportOptions {
            proxy: Some("::not a proxy::".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_client(&options),
            Err(QuoteError::Client(_))
        ));
    }

    #[tokio::test]
    async fn test_get_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = build_client(&TransportOptions::default()).unwrap();
        let pong: Pong = get_json(&client, &format!("{}/ping", server.url()), None)
            .await
            .unwrap();

        assert!(pong.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_json_maps_status_and_body_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;
        server
            .mock("GET", "/garbage")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = build_client(&TransportOptions::default()).unwrap();

        let down = get_json::<Pong>(&client, &format!("{}/down", server.url()), None).await;
        assert!(matches!(
            down,
            Err(QuoteError::Http { status, .. }) if status.as_u16() == 503
        ));

        let garbage = get_json::<Pong>(&client, &format!("{}/garbage", server.url()), None).await;
        assert!(matches!(garbage, Err(QuoteError::Decode { .. })));
    }
}
