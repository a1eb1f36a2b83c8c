use async_trait::async_trait;
use bytes::Bytes;
use log::warn;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::v2board::error::ApiError;
use crate::v2board::models::ApiConfig;

/// Extra attempts after the first one, connection-level failures only
pub const RETRY_COUNT: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single call against the panel, relative to the configured host
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl PanelRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Sends panel requests. Any HTTP status counts as a response; only failures
/// to get one at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: &PanelRequest) -> Result<RawResponse, ApiError>;
}

/// reqwest-backed transport that attaches `node_id` and `token` to every call
pub struct HttpTransport {
    client: Client,
    api_host: String,
    fixed_query: Vec<(String, String)>,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let timeout = if config.timeout > 0 {
            Duration::from_secs(config.timeout)
        } else {
            DEFAULT_TIMEOUT
        };

        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpTransport {
            client,
            api_host: config.api_host.clone(),
            fixed_query: vec![
                ("node_id".to_string(), config.node_id.to_string()),
                ("token".to_string(), config.key.clone()),
            ],
        })
    }

    fn assemble_url(&self, path: &str) -> String {
        format!("{}{}", self.api_host, path)
    }

    fn merge_query(&self, extra: &[(String, String)]) -> Vec<(String, String)> {
        let mut params = self.fixed_query.clone();
        for (key, value) in extra {
            match params.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.clone(),
                None => params.push((key.clone(), value.clone())),
            }
        }
        params
    }

    async fn send_once(
        &self,
        url: &str,
        query: &[(String, String)],
        request: &PanelRequest,
    ) -> Result<RawResponse, reqwest::Error> {
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        builder = builder.query(query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await?;
        let status = res.status().as_u16();
        let body = res.bytes().await?;
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: &PanelRequest) -> Result<RawResponse, ApiError> {
        let url = self.assemble_url(&request.path);
        let query = self.merge_query(&request.query);

        let mut attempt = 0;
        loop {
            // reqwest errors carry the full URL, token included
            match self.send_once(&url, &query, request).await.map_err(reqwest::Error::without_url) {
                Ok(res) => return Ok(res),
                Err(e) if attempt < RETRY_COUNT => {
                    attempt += 1;
                    warn!("request {} failed, retry {}/{}: {}", url, attempt, RETRY_COUNT, e);
                    tokio::time::sleep(RETRY_WAIT).await;
                }
                Err(e) => {
                    warn!("request {} failed: {}", url, e);
                    return Err(ApiError::Transport {
                        url,
                        source: Box::new(e),
                    });
                }
            }
        }
    }
}
