use crate::v2board::models::{DetectRule, NodeInfo, OnlineUser, UserInfo, UserTraffic};
use async_trait::async_trait;

/// Callback trait connecting the sync loop to the proxy engine
#[async_trait]
pub trait EventCallback: Send + Sync {
    /// Called when the node configuration changed
    fn on_node_info_updated(&self, node_info: NodeInfo);

    /// Called when the user list changed. The list is the complete membership.
    fn on_users_updated(&self, users: Vec<UserInfo>);

    /// Called when the detection rule list changed
    fn on_rules_updated(&self, rules: Vec<DetectRule>);

    /// Called to get currently online users for reporting. Return None to skip.
    async fn get_online_users(&self) -> Option<Vec<OnlineUser>>;

    /// Called to get traffic data for pushing. Return None to skip push.
    async fn get_traffic_data(&self) -> Option<Vec<UserTraffic>>;
}
