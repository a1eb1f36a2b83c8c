use bytes::Bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::v2board::error::ApiError;

/// Protocol served by a node. Each variant has its own panel endpoints and
/// its own node-config extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Tunnel protocol with tcp/ws/grpc stream transports
    V2ray,
    /// TLS-terminating proxy protocol
    Trojan,
    /// Cipher-based proxy protocol, no dedicated config endpoint
    Shadowsocks,
}

impl NodeType {
    fn panel_name(self) -> &'static str {
        match self {
            NodeType::V2ray => "SkyhtV2ray",
            NodeType::Trojan => "SkyhtTrojan",
            NodeType::Shadowsocks => "SkyhtShadowsocks",
        }
    }

    fn api_path(self, action: &str) -> String {
        format!("/api/v1/server/{}/{}", self.panel_name(), action)
    }

    /// Node config endpoint. Shadowsocks panels do not serve one; its node
    /// info is derived from the user list instead.
    pub fn config_path(self) -> String {
        self.api_path("config")
    }

    pub fn user_path(self) -> String {
        self.api_path("user")
    }

    pub fn online_path(self) -> String {
        self.api_path("online")
    }

    pub fn submit_path(self) -> String {
        self.api_path("submit")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::V2ray => "V2ray",
            NodeType::Trojan => "Trojan",
            NodeType::Shadowsocks => "Shadowsocks",
        }
    }
}

impl FromStr for NodeType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "V2ray" => Ok(NodeType::V2ray),
            "Trojan" => Ok(NodeType::Trojan),
            "Shadowsocks" => Ok(NodeType::Shadowsocks),
            other => Err(ApiError::UnsupportedProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node configuration handed to the proxy engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_type: NodeType,
    pub node_id: i32,
    pub port: u16,
    /// "tcp", "ws", "grpc", or whatever network tag the panel sent
    pub transport_protocol: String,
    pub enable_tls: bool,
    pub host: String,
    pub path: String,
    pub service_name: String,
    pub cipher_method: String,
    pub alter_id: u16,
    /// Raw tcp header settings, consumed verbatim by the proxy engine
    pub header: Option<Bytes>,
    pub enable_vless: bool,
    pub vless_flow: String,
}

/// Per-protocol user credential. Exactly one kind exists for a given node type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Uuid(String),
    Password(String),
    Cipher { secret: String, method: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: i32,
    pub email: String,
    pub credential: Credential,
    pub alter_id: u16,
    /// Bytes per second, 0 means unlimited
    pub speed_limit: u64,
    /// 0 means unlimited
    pub device_limit: u32,
    /// Only set for Shadowsocks users
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUser {
    #[serde(rename = "user_id")]
    pub uid: i32,
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTraffic {
    #[serde(rename = "user_id")]
    pub uid: i32,
    #[serde(rename = "u")]
    pub upload: i64,
    #[serde(rename = "d")]
    pub download: i64,
}

/// Domain detection rule. Locally sourced rules use id -1.
#[derive(Debug, Clone)]
pub struct DetectRule {
    pub id: i32,
    pub pattern: Regex,
}

impl PartialEq for DetectRule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.pattern.as_str() == other.pattern.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub cpu: f64,
    pub mem: f64,
    pub disk: f64,
    pub uptime: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectResult {
    pub uid: i32,
    pub rule_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub api_host: String,
    pub node_id: i32,
    pub key: String,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_host: String,
    pub node_id: i32,
    pub key: String,
    pub node_type: String,
    #[serde(default)]
    pub enable_vless: bool,
    #[serde(default)]
    pub vless_flow: String,
    /// Local speed limit override in Mbps, 0 defers to the panel
    #[serde(default)]
    pub speed_limit: f64,
    /// Local device limit, always applied
    #[serde(default)]
    pub device_limit: u32,
    /// Request timeout in seconds, 0 falls back to 5
    #[serde(default)]
    pub timeout: u64,
    pub rule_list_path: Option<PathBuf>,
}
