mod callback;
mod client;
mod error;
mod extract;
mod models;
mod response;
mod rules;
mod state;
mod transport;

pub use callback::EventCallback;
pub use client::ApiClient;
pub use error::{ApiError, SchemaError};
pub use extract::effective_speed_limit;
pub use models::{
    ApiConfig, ClientInfo, Credential, DetectResult, DetectRule, NodeInfo, NodeStatus, NodeType,
    OnlineUser, UserInfo, UserTraffic,
};
pub use response::parse_response;
pub use rules::{LOCAL_RULE_ID, load_local_rules};
pub use state::SyncState;
pub use transport::{HttpTransport, Method, PanelRequest, RawResponse, RETRY_COUNT, Transport};
