//! The generic upstream HTTP client.
//!
//! Both upstreams are instances of the same call path parametrised by a
//! [`RequestPolicy`]: the caching reverse-proxy in front of the MET product
//! suite (short timeouts, cache-header parsing) and the Frost stations API
//! (basic auth, longer timeouts, never cached).

use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Method;
use serde_json::Value;

use crate::context;
use crate::error::{ErrorCode, ToolError};
use crate::upstream::cache::{AGE_HEADER, CACHE_STATUS_HEADER, CacheInfo};

const USER_AGENT: &str = concat!("nordvaer/", env!("CARGO_PKG_VERSION"));

/// How one upstream is reached: base URL, timeouts, auth, cache semantics.
#[derive(Debug, Clone)]
pub struct RequestPolicy {
    /// Short name used in logs ("met-proxy", "frost").
    pub name: &'static str,
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Precomputed `Authorization` header value, if any.
    pub auth_header: Option<String>,
    /// Whether responses carry proxy cache headers worth parsing.
    pub cache_aware: bool,
    /// Path probed by the health check.
    pub health_path: &'static str,
    /// Statuses counted as "reachable" by the health probe.
    pub health_ok: &'static [u16],
}

impl RequestPolicy {
    /// Policy for the caching reverse-proxy.
    pub fn proxy(base_url: impl Into<String>, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            name: "met-proxy",
            base_url: base_url.into(),
            timeout,
            connect_timeout,
            auth_header: None,
            cache_aware: true,
            health_path: "/healthz",
            health_ok: &[200],
        }
    }

    /// Policy for the Frost stations API.
    ///
    /// Frost authenticates with HTTP basic auth using the client id as
    /// username and an empty password. A 401 from the health probe still
    /// means the service is up.
    pub fn frost(base_url: impl Into<String>, client_id: Option<&str>, timeout: Duration) -> Self {
        let auth_header = client_id.map(|id| {
            let credentials = BASE64.encode(format!("{}:", id));
            format!("Basic {}", credentials)
        });
        if auth_header.is_none() {
            tracing::warn!(
                "No Frost client id configured; station requests will be unauthenticated"
            );
        }
        Self {
            name: "frost",
            base_url: base_url.into(),
            timeout,
            connect_timeout: Duration::from_secs(2),
            auth_header,
            cache_aware: false,
            health_path: "/sources/v0.jsonld?types=SensorSystem&limit=1",
            health_ok: &[200, 401],
        }
    }
}

/// Per-call options for [`UpstreamClient::fetch`].
#[derive(Debug, Default)]
pub struct FetchOptions {
    pub method: Option<Method>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    pub request_id: Option<String>,
}

/// A successful upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub data: Value,
    pub status: u16,
    pub cache: CacheInfo,
}

/// Shared, stateless upstream client. Safe for concurrent use.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    policy: RequestPolicy,
}

impl UpstreamClient {
    pub fn new(policy: RequestPolicy) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(policy.connect_timeout)
            .build()
            .map_err(|e| ToolError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, policy })
    }

    pub fn policy(&self) -> &RequestPolicy {
        &self.policy
    }

    fn url_for(&self, path: &str) -> String {
        let base = self.policy.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Issue one request and translate the outcome into the error taxonomy.
    pub async fn fetch(&self, path: &str, opts: FetchOptions) -> Result<UpstreamResponse, ToolError> {
        let request_id = opts
            .request_id
            .or_else(context::current_request_id)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let method = opts.method.unwrap_or(Method::GET);
        let url = self.url_for(path);
        let timeout = opts.timeout.unwrap_or(self.policy.timeout);

        tracing::debug!(
            request_id = %request_id,
            url = %url,
            method = %method,
            upstream = self.policy.name,
            "upstream call"
        );

        let mut request = self.http.request(method.clone(), &url);
        if let Some(auth) = &self.policy.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        for (name, value) in &opts.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &opts.body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = match tokio::time::timeout(timeout, request.send()).await {
            Err(_) => {
                return Err(ToolError::upstream_unavailable(format!(
                    "Request to {} timed out after {} ms",
                    self.policy.name,
                    timeout.as_millis()
                ))
                .with_request_id(request_id));
            }
            Ok(Err(e)) => {
                return Err(ToolError::upstream_unavailable(format!(
                    "Request to {} failed: {}",
                    self.policy.name, e
                ))
                .with_request_id(request_id));
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status().as_u16();
        let cache = if self.policy.cache_aware {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string())
            };
            CacheInfo::from_values(
                header(CACHE_STATUS_HEADER).as_deref(),
                header(AGE_HEADER).as_deref(),
            )
        } else {
            CacheInfo::default()
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            request_id = %request_id,
            url = %url,
            method = %method,
            status,
            latency_ms,
            cached = cache.cached,
            age_seconds = cache.age_seconds,
            "upstream call completed"
        );

        if !(200..300).contains(&status) {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let mut err = ToolError::from_status(
                status,
                format!("{} returned status {}", self.policy.name, status),
            )
            .with_request_id(request_id);
            if err.code == ErrorCode::RateLimited {
                if let Some(seconds) = retry_after {
                    err = err.with_retry_after(seconds);
                }
            }
            return Err(err);
        }

        let data: Value = response.json().await.map_err(|e| {
            ToolError::upstream_unavailable(format!(
                "Invalid response body from {}: {}",
                self.policy.name, e
            ))
        })?;

        Ok(UpstreamResponse {
            data,
            status,
            cache,
        })
    }

    /// Short-timeout reachability probe. Never errors.
    pub async fn probe_health(&self) -> bool {
        let url = self.url_for(self.policy.health_path);
        let mut request = self.http.get(&url);
        if let Some(auth) = &self.policy.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        match tokio::time::timeout(Duration::from_secs(2), request.send()).await {
            Ok(Ok(response)) => self.policy.health_ok.contains(&response.status().as_u16()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::get;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn proxy_policy(base: &str) -> RequestPolicy {
        RequestPolicy::proxy(base, Duration::from_secs(5), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn fetch_parses_body_and_cache_headers() {
        let router = Router::new().route(
            "/weatherapi/test",
            get(|| async {
                let mut headers = HeaderMap::new();
                headers.insert("x-cache-status", "HIT".parse().unwrap());
                headers.insert("age", "120".parse().unwrap());
                (headers, axum::Json(serde_json::json!({"ok": true})))
            }),
        );
        let base = spawn_server(router).await;

        let client = UpstreamClient::new(proxy_policy(&base)).unwrap();
        let response = client
            .fetch("/weatherapi/test", FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.data["ok"], true);
        assert!(response.cache.cached);
        assert_eq!(response.cache.age_seconds, Some(120));
    }

    #[tokio::test]
    async fn rate_limit_extracts_retry_after() {
        let router = Router::new().route(
            "/weatherapi/test",
            get(|| async {
                let mut headers = HeaderMap::new();
                headers.insert("retry-after", "30".parse().unwrap());
                (axum::http::StatusCode::TOO_MANY_REQUESTS, headers, "slow down")
            }),
        );
        let base = spawn_server(router).await;

        let client = UpstreamClient::new(proxy_policy(&base)).unwrap();
        let err = client
            .fetch("/weatherapi/test", FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimited);
        assert!(err.retryable());
        assert_eq!(err.details.retry_after_seconds, Some(30));
        assert_eq!(err.details.upstream_status, Some(429));
    }

    #[tokio::test]
    async fn not_found_maps_to_invalid_input() {
        let router = Router::new();
        let base = spawn_server(router).await;

        let client = UpstreamClient::new(proxy_policy(&base)).unwrap();
        let err = client
            .fetch("/missing", FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn connection_refused_is_upstream_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = UpstreamClient::new(proxy_policy(&format!("http://{}", addr))).unwrap();
        let err = client.fetch("/x", FetchOptions::default()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamUnavailable);
        assert!(err.retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_deterministic() {
        // A listener that accepts and then stays silent; with the clock
        // paused the runtime advances straight to the deadline.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut sockets = Vec::new();
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                sockets.push(socket);
            }
        });

        let client = UpstreamClient::new(proxy_policy(&format!("http://{}", addr))).unwrap();
        let err = client
            .fetch(
                "/slow",
                FetchOptions {
                    timeout: Some(Duration::from_millis(250)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamUnavailable);
        assert!(err.message.contains("250 ms"));
    }

    #[tokio::test]
    async fn frost_policy_sends_basic_auth_and_ignores_cache_headers() {
        let router = Router::new().route(
            "/observations",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let mut out = HeaderMap::new();
                out.insert("x-cache-status", "HIT".parse().unwrap());
                (out, axum::Json(serde_json::json!({"auth": auth})))
            }),
        );
        let base = spawn_server(router).await;

        let policy = RequestPolicy::frost(&base, Some("my-client-id"), Duration::from_secs(10));
        let client = UpstreamClient::new(policy).unwrap();
        let response = client
            .fetch("/observations", FetchOptions::default())
            .await
            .unwrap();
        // base64("my-client-id:")
        assert_eq!(response.data["auth"], "Basic bXktY2xpZW50LWlkOg==");
        // Frost has no shared cache in front of it.
        assert!(!response.cache.cached);
        assert_eq!(response.cache.status, None);
    }

    #[tokio::test]
    async fn health_probe_accepts_configured_statuses() {
        let router = Router::new().route(
            "/sources/v0.jsonld",
            get(|| async { (axum::http::StatusCode::UNAUTHORIZED, "auth required") }),
        );
        let base = spawn_server(router).await;

        let frost = UpstreamClient::new(RequestPolicy::frost(
            &base,
            Some("id"),
            Duration::from_secs(10),
        ))
        .unwrap();
        assert!(frost.probe_health().await);

        let proxy = UpstreamClient::new(proxy_policy(&base)).unwrap();
        assert!(!proxy.probe_health().await);
    }
}
