use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::v2board::models::OnlineUser;

#[derive(Debug, Default)]
struct Inner {
    config_response: Option<Arc<Value>>,
    last_report_online: HashMap<i32, u32>,
}

/// State shared between the client's operations: the last decoded node
/// config and the online counts from the last report. One lock guards both;
/// it is only held for the read or write itself.
#[derive(Debug, Default)]
pub struct SyncState {
    inner: Mutex<Inner>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store_config_response(&self, response: Value) {
        let mut inner = self.inner.lock().await;
        inner.config_response = Some(Arc::new(response));
    }

    pub async fn config_response(&self) -> Option<Arc<Value>> {
        let inner = self.inner.lock().await;
        inner.config_response.clone()
    }

    /// Replaces the online map with per-user connection counts of `batch`.
    pub async fn replace_online(&self, batch: &[OnlineUser]) {
        let mut report_online: HashMap<i32, u32> = HashMap::new();
        for user in batch {
            *report_online.entry(user.uid).or_insert(0) += 1;
        }

        let mut inner = self.inner.lock().await;
        inner.last_report_online = report_online;
    }

    pub async fn last_report_online(&self) -> HashMap<i32, u32> {
        let inner = self.inner.lock().await;
        inner.last_report_online.clone()
    }
}
