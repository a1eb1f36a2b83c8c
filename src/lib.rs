//! Panel synchronization client for V2Board-style control panels.
//!
//! [`v2board::ApiClient`] pulls node configuration and users for a V2ray,
//! Trojan or Shadowsocks node and reports online users and traffic back.
//! [`scheduler::Scheduler`] drives it on a fixed cadence.

pub mod config;
pub mod scheduler;
pub mod v2board;
