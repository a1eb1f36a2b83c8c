use log::{Level, debug, log};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

use crate::v2board::error::ApiError;
use crate::v2board::extract::{self, NodeExtractor};
use crate::v2board::models::{
    ApiConfig, ClientInfo, DetectResult, DetectRule, NodeInfo, NodeStatus, NodeType, OnlineUser,
    UserInfo, UserTraffic,
};
use crate::v2board::response::parse_response;
use crate::v2board::rules;
use crate::v2board::state::SyncState;
use crate::v2board::transport::{HttpTransport, PanelRequest, RawResponse, Transport};

/// Client for one node on a V2Board panel.
///
/// Every operation issues at most one request (Shadowsocks node config issues
/// the user-list request) and runs no background work. Operations can be
/// called concurrently; the only shared state is the last node-config
/// response and the last online-user counts, kept in [`SyncState`].
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    config: ApiConfig,
    node_type: NodeType,
    local_rules: Vec<DetectRule>,
    state: SyncState,
    debug: AtomicBool,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Builds a client on top of any [`Transport`]. Validates the node type and
    /// loads the local rule list.
    pub fn with_transport(config: ApiConfig, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        let node_type: NodeType = config.node_type.parse()?;
        let local_rules = rules::load_local_rules(config.rule_list_path.as_deref())?;

        Ok(ApiClient {
            transport,
            config,
            node_type,
            local_rules,
            state: SyncState::new(),
            debug: AtomicBool::new(false),
        })
    }

    pub fn describe(&self) -> ClientInfo {
        ClientInfo {
            api_host: self.config.api_host.clone(),
            node_id: self.config.node_id,
            key: self.config.key.clone(),
            node_type: self.node_type,
        }
    }

    /// Log every request and response at info level instead of debug.
    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    fn assemble_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_host, path)
    }

    fn log_level(&self) -> Level {
        if self.debug.load(Ordering::Relaxed) {
            Level::Info
        } else {
            Level::Debug
        }
    }

    fn log_response(&self, url: &str, res: &RawResponse) {
        log!(
            self.log_level(),
            "response {}: status {}, body: {}",
            url,
            res.status,
            String::from_utf8_lossy(&res.body)
        );
    }

    async fn call(&self, request: PanelRequest, cancel: &CancellationToken) -> Result<Value, ApiError> {
        let url = self.assemble_url(&request.path);
        log!(
            self.log_level(),
            "request {:?} {} query={:?} body={:?}",
            request.method,
            url,
            request.query,
            request.body
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled { url }),
            res = self.transport.request(&request) => res,
        };

        if let Ok(res) = &result {
            self.log_response(&url, res);
        }
        parse_response(&url, result)
    }

    /// Pulls the node configuration. For Shadowsocks this fetches the user
    /// list and derives the node from its first entry.
    pub async fn fetch_node_config(&self, cancel: &CancellationToken) -> Result<NodeInfo, ApiError> {
        let parse: NodeExtractor = match self.node_type {
            NodeType::V2ray => extract::parse_v2ray_node,
            NodeType::Trojan => extract::parse_trojan_node,
            NodeType::Shadowsocks => {
                let users = self.fetch_user_list(cancel).await?;
                return self.shadowsocks_node(&users);
            }
        };

        let request = PanelRequest::get(self.node_type.config_path()).query("local_port", "1");
        let response = self.call(request, cancel).await?;
        self.state.store_config_response(response.clone()).await;

        parse(&response, &self.config).map_err(|e| e.with_body(response.to_string()))
    }

    /// Shadowsocks node info derived from an already fetched user list, so a
    /// caller that needs both issues a single user-list request.
    pub fn shadowsocks_node(&self, users: &[UserInfo]) -> Result<NodeInfo, ApiError> {
        if self.node_type != NodeType::Shadowsocks {
            return Err(ApiError::Precondition("node info from users is only defined for Shadowsocks"));
        }
        extract::node_from_first_user(users, &self.config)
    }

    /// Pulls the complete user list. The result replaces any earlier list.
    pub async fn fetch_user_list(&self, cancel: &CancellationToken) -> Result<Vec<UserInfo>, ApiError> {
        let request = PanelRequest::get(self.node_type.user_path());
        let response = self.call(request, cancel).await?;

        extract::parse_users(&response, self.node_type, &self.config)
            .map_err(|e| e.with_body(response.to_string()))
    }

    /// Reports online users. The per-user counts are recorded before the
    /// request goes out, so they reflect this batch even if it fails.
    pub async fn report_online_users(
        &self,
        online_users: &[OnlineUser],
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        self.state.replace_online(online_users).await;

        let request = PanelRequest::post(self.node_type.online_path(), json!(online_users))
            .query("node_id", self.config.node_id.to_string());
        self.call(request, cancel).await?;
        Ok(())
    }

    pub async fn report_user_traffic(
        &self,
        user_traffic: &[UserTraffic],
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let request = PanelRequest::post(self.node_type.submit_path(), json!(user_traffic))
            .query("node_id", self.config.node_id.to_string());
        self.call(request, cancel).await?;
        Ok(())
    }

    /// Local rules followed by the panel's domain rules. Panel rules only exist
    /// for V2ray, and require a node config to have been fetched first.
    pub async fn fetch_detection_rules(&self) -> Result<Vec<DetectRule>, ApiError> {
        let mut rule_list = self.local_rules.clone();
        if self.node_type != NodeType::V2ray {
            return Ok(rule_list);
        }

        let response = self.state.config_response().await.ok_or(ApiError::Precondition(
            "fetch_node_config must succeed before fetch_detection_rules",
        ))?;
        rule_list.extend(rules::panel_rules(&response)?);
        Ok(rule_list)
    }

    /// The panel has no status endpoint; accepted and dropped.
    pub async fn report_node_status(&self, status: &NodeStatus) -> Result<(), ApiError> {
        debug!("node status not reported, panel has no endpoint: {:?}", status);
        Ok(())
    }

    /// The panel has no endpoint for rule hits; accepted and dropped.
    pub async fn report_illegal(&self, results: &[DetectResult]) -> Result<(), ApiError> {
        debug!("{} detect results not reported, panel has no endpoint", results.len());
        Ok(())
    }

    /// Per-user connection counts from the most recent online report
    pub async fn last_report_online(&self) -> HashMap<i32, u32> {
        self.state.last_report_online().await
    }
}
