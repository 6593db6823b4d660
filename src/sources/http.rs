//! HTTP adapter for the stock data provider

use super::{MetricsSource, RawSourceResponse, SourceKind};
use crate::config::SourceConfig;
use crate::db::models::TrackedInstrument;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const API_KEY_HEADER: &str = "X-API-Key";

/// Provider client shared by every fetch of a run
pub struct HttpMetricsSource {
    client: Client,
    base_url: String,
    market: String,
    timeout: Duration,
}

impl HttpMetricsSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout())
            .build()?;

        Ok(Self::with_client(
            client,
            &config.base_url,
            &config.market,
            config.request_timeout(),
        ))
    }

    pub fn with_client(client: Client, base_url: &str, market: &str, timeout: Duration) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client,
            base_url,
            market: market.to_string(),
            timeout,
        }
    }

    async fn request(
        &self,
        kind: SourceKind,
        instrument: &TrackedInstrument,
    ) -> Result<RawSourceResponse> {
        let url = format!("{}{}", self.base_url, kind.endpoint());

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(API_KEY_HEADER, instrument.api_key.as_str())
            .query(&[
                ("symbol", instrument.symbol.as_str()),
                ("market", self.market.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_string())
                    .or_insert_with(|| value.to_string());
            }
        }

        let body = response.bytes().await?.to_vec();

        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(RawSourceResponse::new(status.as_u16(), body, headers))
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch_one(
        &self,
        kind: SourceKind,
        instrument: &TrackedInstrument,
        cancel: &CancellationToken,
    ) -> Result<RawSourceResponse> {
        tracing::debug!(
            ticker = %instrument.symbol,
            source = kind.endpoint(),
            key = %instrument.key_fingerprint(),
            "Fetching upstream data"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.request(kind, instrument)) => {
                outcome.unwrap_or(Err(AppError::Timeout(self.timeout)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::time::Instant;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn echo(
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if key != "key-1" {
            return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
        }
        Json(json!({
            "success": true,
            "symbol": query.get("symbol"),
            "market": query.get("market"),
            "accept": headers.get("accept").and_then(|v| v.to_str().ok()),
        }))
        .into_response()
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(10)).await;
        "{}"
    }

    fn source(base_url: &str, timeout: Duration) -> HttpMetricsSource {
        HttpMetricsSource::with_client(Client::new(), base_url, "id-id", timeout)
    }

    #[test]
    fn test_new_uses_configured_timeout() {
        let config = SourceConfig {
            request_timeout_secs: 7,
            ..SourceConfig::default()
        };
        let source = HttpMetricsSource::new(&config).unwrap();
        assert_eq!(source.timeout, Duration::from_secs(7));
        assert!(source.base_url.ends_with('/'));
    }

    #[tokio::test]
    async fn test_fetch_both_sources() {
        let base = spawn_stub(
            Router::new()
                .route("/earnings", get(echo))
                .route("/equities", get(echo)),
        )
        .await;
        let source = source(&base, Duration::from_secs(5));
        let instrument = TrackedInstrument::new("BBCA", "key-1");

        let pair = source.fetch(&instrument, &CancellationToken::new()).await;

        let earnings = pair.earnings.unwrap();
        assert_eq!(earnings.status, 200);
        assert_eq!(earnings.success, Some(true));
        assert!(earnings.headers.contains_key("content-type"));
        let body: serde_json::Value = serde_json::from_slice(&earnings.body).unwrap();
        assert_eq!(body["symbol"], "BBCA");
        assert_eq!(body["market"], "id-id");
        assert_eq!(body["accept"], "application/json");

        assert_eq!(pair.equities.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_status_error_is_isolated() {
        let base = spawn_stub(
            Router::new()
                .route("/earnings", get(echo))
                .route(
                    "/equities",
                    get(|| async { (StatusCode::BAD_GATEWAY, "upstream unavailable") }),
                ),
        )
        .await;
        let source = source(&base, Duration::from_secs(5));
        let instrument = TrackedInstrument::new("BBRI", "key-1");

        let pair = source.fetch(&instrument, &CancellationToken::new()).await;

        assert!(pair.earnings.is_ok());
        match pair.equities {
            Err(AppError::UpstreamStatus { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream unavailable");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_credential_is_status_error() {
        let base = spawn_stub(Router::new().route("/earnings", get(echo))).await;
        let source = source(&base, Duration::from_secs(5));
        let instrument = TrackedInstrument::new("BBRI", "wrong");

        let result = source
            .fetch_one(SourceKind::Earnings, &instrument, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::UpstreamStatus { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_timeout_is_per_call() {
        let base = spawn_stub(
            Router::new()
                .route("/earnings", get(slow))
                .route("/equities", get(echo)),
        )
        .await;
        let source = source(&base, Duration::from_millis(200));
        let instrument = TrackedInstrument::new("TLKM", "key-1");

        let started = Instant::now();
        let pair = source.fetch(&instrument, &CancellationToken::new()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(pair.earnings, Err(AppError::Timeout(_))));
        assert!(pair.equities.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_aborts_both_calls() {
        let base = spawn_stub(
            Router::new()
                .route("/earnings", get(slow))
                .route("/equities", get(slow)),
        )
        .await;
        let source = source(&base, Duration::from_secs(30));
        let instrument = TrackedInstrument::new("ASII", "key-1");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let pair = source.fetch(&instrument, &cancel).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(pair.earnings, Err(AppError::Cancelled)));
        assert!(matches!(pair.equities, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = source(&format!("http://{}", addr), Duration::from_secs(5));
        let instrument = TrackedInstrument::new("UNVR", "key-1");
        let result = source
            .fetch_one(SourceKind::Equities, &instrument, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::Transport(_))));
    }
}
