//! HTTP transport with ordered proxy failover.
//!
//! Each configured proxy gets its own reqwest client. A request walks the
//! proxy list in order and only advances when connecting to the proxy
//! itself failed; any other failure ends the attempt.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Proxy};
use tracing::warn;

use super::errors::TransportError;

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Sends requests for the updater. Implementations decide how requests reach the network.
#[async_trait]
pub trait AssetTransport: Send + Sync {
    /// Send one request and return the response whatever its status.
    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<TransportResponse, TransportError>;

    /// GET `url` and return the body of a 200 response.
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Vec<u8>, TransportError> {
        let response = self.send(Method::GET, url, headers).await?;
        if response.status != 200 {
            return Err(TransportError::Status(response.status));
        }
        Ok(response.body)
    }
}

struct Route {
    proxy: Option<String>,
    client: Client,
}

/// reqwest-backed transport that fails over across proxies.
pub struct ProxyFailoverTransport {
    routes: Vec<Route>,
}

impl ProxyFailoverTransport {
    /// Create a transport for the given proxy URLs. An empty list means direct connections.
    pub fn new(proxies: &[String], timeout: Duration) -> Result<Self, TransportError> {
        let mut routes = Vec::with_capacity(proxies.len().max(1));

        if proxies.is_empty() {
            let client = Client::builder()
                .timeout(timeout)
                .no_proxy()
                .build()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            routes.push(Route {
                proxy: None,
                client,
            });
        }

        for proxy in proxies {
            let proxy_config =
                Proxy::all(proxy).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let client = Client::builder()
                .timeout(timeout)
                .proxy(proxy_config)
                .build()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            routes.push(Route {
                proxy: Some(proxy.clone()),
                client,
            });
        }

        Ok(Self { routes })
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[async_trait]
impl AssetTransport for ProxyFailoverTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<TransportResponse, TransportError> {
        let mut last_failure = None;
        for route in &self.routes {
            let result = route
                .client
                .request(method.clone(), url)
                .headers(headers.clone())
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => match &route.proxy {
                    Some(proxy) if e.is_connect() => {
                        warn!("Failed to connect to proxy {}: {}", proxy, e);
                        last_failure = Some(TransportError::ProxyConnection {
                            proxy: proxy.clone(),
                            message: e.to_string(),
                        });
                        continue;
                    }
                    _ if e.is_timeout() => return Err(TransportError::Timeout(e.to_string())),
                    _ if e.is_builder() => {
                        return Err(TransportError::InvalidRequest(e.to_string()))
                    }
                    _ => return Err(TransportError::Request(e.to_string())),
                },
            };

            let status = response.status().as_u16();
            let response_headers = response.headers().clone();
            let body = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(e.to_string())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

            return Ok(TransportResponse {
                status,
                headers: response_headers,
                body: body.to_vec(),
            });
        }

        Err(match last_failure {
            Some(failure) => TransportError::ProxiesExhausted(Box::new(failure)),
            None => TransportError::InvalidRequest("no route configured".to_string()),
        })
    }
}
