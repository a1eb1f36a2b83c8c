//! Periodic driver for [`ApiClient`]: pulls node config, users and rules, and
//! pushes online users and traffic, until cancelled.

use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::v2board::{ApiClient, ApiError, DetectRule, EventCallback, NodeInfo, NodeType, UserInfo};

pub struct Scheduler {
    client: Arc<ApiClient>,
    callback: Arc<dyn EventCallback>,
    pull_interval: Duration,
    push_interval: Duration,
}

/// Last values handed to the callback, so unchanged pulls are not re-sent
#[derive(Default)]
struct Snapshot {
    node_info: Option<NodeInfo>,
    users: Option<Vec<UserInfo>>,
    rules: Option<Vec<DetectRule>>,
}

fn changed<T: PartialEq>(last: &Option<T>, value: &T) -> bool {
    last.as_ref() != Some(value)
}

impl Scheduler {
    pub fn new(client: Arc<ApiClient>, callback: Arc<dyn EventCallback>, sync: &SyncConfig) -> Self {
        Self {
            client,
            callback,
            pull_interval: sync.pull_interval_duration(),
            push_interval: sync.push_interval_duration(),
        }
    }

    /// Runs the pull and push loops concurrently until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Pull interval: {}s, Push interval: {}s",
            self.pull_interval.as_secs(),
            self.push_interval.as_secs()
        );
        tokio::join!(self.pull_task(&cancel), self.push_task(&cancel));
        info!("Scheduler stopped");
    }

    async fn pull_task(&self, cancel: &CancellationToken) {
        let mut ticker = interval(self.pull_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut snapshot = Snapshot::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.pull_once(&mut snapshot, cancel).await;
        }
    }

    async fn pull_once(&self, snapshot: &mut Snapshot, cancel: &CancellationToken) {
        if self.client.node_type() == NodeType::Shadowsocks {
            // Node info comes from the user list; fetch it once per tick.
            match self.client.fetch_user_list(cancel).await {
                Ok(users) => {
                    self.apply_node_info(snapshot, self.client.shadowsocks_node(&users));
                    self.apply_users(snapshot, Ok(users));
                }
                Err(e) => error!("[Pull] Failed to fetch user list: {}", e),
            }
        } else {
            self.apply_node_info(snapshot, self.client.fetch_node_config(cancel).await);
            self.apply_users(snapshot, self.client.fetch_user_list(cancel).await);
        }

        match self.client.fetch_detection_rules().await {
            Ok(rules) => {
                if changed(&snapshot.rules, &rules) {
                    info!("[Pull] Loaded {} detection rules", rules.len());
                    snapshot.rules = Some(rules.clone());
                    self.callback.on_rules_updated(rules);
                }
            }
            Err(e) => error!("[Pull] Failed to fetch detection rules: {}", e),
        }
    }

    fn apply_node_info(&self, snapshot: &mut Snapshot, result: Result<NodeInfo, ApiError>) {
        match result {
            Ok(node_info) => {
                if changed(&snapshot.node_info, &node_info) {
                    info!("[Pull] Node configuration updated: {:?}", node_info);
                    snapshot.node_info = Some(node_info.clone());
                    self.callback.on_node_info_updated(node_info);
                } else {
                    debug!("[Pull] Node configuration not modified");
                }
            }
            Err(e) => error!("[Pull] Failed to fetch node configuration: {}", e),
        }
    }

    fn apply_users(&self, snapshot: &mut Snapshot, result: Result<Vec<UserInfo>, ApiError>) {
        match result {
            Ok(users) => {
                if changed(&snapshot.users, &users) {
                    info!("[Pull] Fetched {} users", users.len());
                    snapshot.users = Some(users.clone());
                    self.callback.on_users_updated(users);
                } else {
                    debug!("[Pull] User list not modified");
                }
            }
            Err(e) => error!("[Pull] Failed to fetch user list: {}", e),
        }
    }

    async fn push_task(&self, cancel: &CancellationToken) {
        let mut ticker = interval(self.push_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing has been collected yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.push_once(cancel).await;
        }
    }

    async fn push_once(&self, cancel: &CancellationToken) {
        match self.callback.get_online_users().await {
            Some(online) if !online.is_empty() => {
                debug!("[Push] Reporting {} online users", online.len());
                if let Err(e) = self.client.report_online_users(&online, cancel).await {
                    error!("[Push] Failed to report online users: {}", e);
                }
            }
            _ => debug!("[Push] No online users to report"),
        }

        match self.callback.get_traffic_data().await {
            Some(traffic) if !traffic.is_empty() => {
                info!("[Push] Pushing traffic data for {} users...", traffic.len());
                match self.client.report_user_traffic(&traffic, cancel).await {
                    Ok(()) => info!("[Push] Traffic data pushed successfully"),
                    Err(e) => error!("[Push] Failed to push traffic data: {}", e),
                }
            }
            _ => debug!("[Push] No traffic data to push"),
        }
    }
}
