//! Protocol extractors: panel JSON in, uniform [`NodeInfo`] / [`UserInfo`] out.
//!
//! Each protocol decodes into its own intermediate shape first, so a missing
//! required key surfaces as a [`SchemaError`] instead of a zero value.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::v2board::error::{ApiError, SchemaError};
use crate::v2board::models::{ApiConfig, Credential, NodeInfo, NodeType, UserInfo};

/// Maps a decoded node-config response to [`NodeInfo`]
pub type NodeExtractor = fn(&Value, &ApiConfig) -> Result<NodeInfo, SchemaError>;

#[derive(Deserialize)]
struct Inbound {
    port: u16,
    #[serde(rename = "streamSettings")]
    stream_settings: StreamSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamSettings {
    network: Option<String>,
    security: Option<String>,
    ws_settings: Option<WsSettings>,
    grpc_settings: Option<GrpcSettings>,
    tcp_settings: Option<TcpSettings>,
}

#[derive(Deserialize)]
struct WsSettings {
    #[serde(default)]
    path: String,
    headers: Option<WsHeaders>,
}

#[derive(Deserialize)]
struct WsHeaders {
    #[serde(rename = "Host", default)]
    host: String,
}

#[derive(Deserialize)]
struct GrpcSettings {
    #[serde(rename = "serviceName", default)]
    service_name: String,
}

#[derive(Deserialize)]
struct TcpSettings {
    header: Option<Value>,
}

#[derive(Deserialize)]
struct TrojanNode {
    local_port: u16,
    ssl: Option<TrojanSsl>,
}

#[derive(Deserialize)]
struct TrojanSsl {
    #[serde(default)]
    sni: String,
}

#[derive(Deserialize)]
struct RawUser {
    id: i32,
    /// Mbps, null on the panel means no limit
    speed_limit: Option<u64>,
}

#[derive(Deserialize)]
struct V2rayUserEntry {
    v2ray_user: V2rayUser,
}

#[derive(Deserialize)]
struct V2rayUser {
    uuid: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    alter_id: u16,
}

#[derive(Deserialize)]
struct TrojanUserEntry {
    trojan_user: TrojanUser,
}

#[derive(Deserialize)]
struct TrojanUser {
    password: String,
}

#[derive(Deserialize)]
struct ShadowsocksUser {
    secret: String,
    cipher: String,
    port: u16,
}

fn base_node(node_type: NodeType, config: &ApiConfig) -> NodeInfo {
    NodeInfo {
        node_type,
        node_id: config.node_id,
        port: 0,
        transport_protocol: "tcp".to_string(),
        enable_tls: false,
        host: String::new(),
        path: String::new(),
        service_name: String::new(),
        cipher_method: String::new(),
        alter_id: 0,
        header: None,
        enable_vless: false,
        vless_flow: String::new(),
    }
}

/// V2ray node config. Accepts a single `inbound` object, or the first entry
/// of an `inbounds` array as older panel builds send.
pub fn parse_v2ray_node(tree: &Value, config: &ApiConfig) -> Result<NodeInfo, SchemaError> {
    let inbound = if let Some(inbound) = tree.get("inbound") {
        inbound
    } else if let Some(inbounds) = tree.get("inbounds") {
        inbounds
            .as_array()
            .and_then(|list| list.first())
            .ok_or_else(|| SchemaError("inbounds is empty or not an array".to_string()))?
    } else {
        return Err(SchemaError("unable to find inbound(s) in the nodeInfo".to_string()));
    };

    let inbound = Inbound::deserialize(inbound)?;
    let stream = inbound.stream_settings;
    let transport_protocol = stream.network.unwrap_or_else(|| "tcp".to_string());

    let mut path = String::new();
    let mut host = String::new();
    let mut service_name = String::new();
    let mut header = None;

    match transport_protocol.as_str() {
        "ws" => {
            if let Some(ws) = stream.ws_settings {
                path = ws.path;
                host = ws.headers.map(|h| h.host).unwrap_or_default();
            }
        }
        "grpc" => {
            if let Some(grpc) = stream.grpc_settings {
                service_name = grpc.service_name;
            }
        }
        "tcp" => {
            if let Some(raw) = stream.tcp_settings.and_then(|tcp| tcp.header) {
                header = Some(Bytes::from(serde_json::to_vec(&raw)?));
            }
        }
        _ => {}
    }

    Ok(NodeInfo {
        port: inbound.port,
        transport_protocol,
        enable_tls: stream.security.as_deref() == Some("tls"),
        host,
        path,
        service_name,
        header,
        enable_vless: config.enable_vless,
        vless_flow: config.vless_flow.clone(),
        ..base_node(NodeType::V2ray, config)
    })
}

pub fn parse_trojan_node(tree: &Value, config: &ApiConfig) -> Result<NodeInfo, SchemaError> {
    let node = TrojanNode::deserialize(tree)?;

    Ok(NodeInfo {
        port: node.local_port,
        enable_tls: true,
        host: node.ssl.map(|ssl| ssl.sni).unwrap_or_default(),
        ..base_node(NodeType::Trojan, config)
    })
}

/// Shadowsocks has no config endpoint; port and cipher come from the first user.
pub fn node_from_first_user(users: &[UserInfo], config: &ApiConfig) -> Result<NodeInfo, ApiError> {
    let first = users.first().ok_or(ApiError::EmptyUserList)?;
    let cipher_method = match &first.credential {
        Credential::Cipher { method, .. } => method.clone(),
        _ => String::new(),
    };

    Ok(NodeInfo {
        port: first.port.unwrap_or_default(),
        cipher_method,
        ..base_node(NodeType::Shadowsocks, config)
    })
}

/// Bytes per second. A local limit above zero overrides the panel value.
pub fn effective_speed_limit(configured_mbps: f64, panel_mbps: u64) -> u64 {
    if configured_mbps > 0.0 {
        (configured_mbps * 1_000_000.0 / 8.0) as u64
    } else {
        panel_mbps.saturating_mul(1_000_000) / 8
    }
}

pub fn parse_users(tree: &Value, node_type: NodeType, config: &ApiConfig) -> Result<Vec<UserInfo>, SchemaError> {
    let data = tree
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError("data field not found".to_string()))?;

    data.iter()
        .enumerate()
        .map(|(i, entry)| {
            parse_user(entry, node_type, config).map_err(|e| SchemaError(format!("user #{}: {}", i, e)))
        })
        .collect()
}

fn parse_user(entry: &Value, node_type: NodeType, config: &ApiConfig) -> Result<UserInfo, SchemaError> {
    let raw = RawUser::deserialize(entry)?;

    let mut user = UserInfo {
        uid: raw.id,
        email: String::new(),
        credential: Credential::Uuid(String::new()),
        alter_id: 0,
        speed_limit: effective_speed_limit(config.speed_limit, raw.speed_limit.unwrap_or(0)),
        device_limit: config.device_limit,
        port: None,
    };

    match node_type {
        NodeType::V2ray => {
            let v2ray = V2rayUserEntry::deserialize(entry)?.v2ray_user;
            user.email = v2ray.email;
            user.alter_id = v2ray.alter_id;
            user.credential = Credential::Uuid(v2ray.uuid);
        }
        NodeType::Trojan => {
            let trojan = TrojanUserEntry::deserialize(entry)?.trojan_user;
            user.email = trojan.password.clone();
            user.credential = Credential::Password(trojan.password);
        }
        NodeType::Shadowsocks => {
            let ss = ShadowsocksUser::deserialize(entry)?;
            user.email = ss.secret.clone();
            user.port = Some(ss.port);
            user.credential = Credential::Cipher {
                secret: ss.secret,
                method: ss.cipher,
            };
        }
    }

    Ok(user)
}
