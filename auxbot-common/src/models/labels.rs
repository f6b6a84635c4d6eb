//! Label schema shared by the provisioner (writer) and the registry (reader).
//!
//! Compute units and network endpoints carry tenant identity as labels; the
//! controller has no other datastore, so rehydration after a restart depends
//! on both sides agreeing on these keys. Bump [`LABEL_SCHEMA_VERSION`] when a
//! key changes meaning.

use std::collections::BTreeMap;

pub const LABEL_SCHEMA_VERSION: &str = "v1";

pub const SCHEMA_LABEL: &str = "auxbot.dev/label-schema";
pub const APP_LABEL: &str = "app";
pub const APP_WORKER: &str = "worker";
pub const GUILD_LABEL: &str = "discord-guild-id";
pub const CHANNEL_LABEL: &str = "discord-channel-id";

/// Selector for every worker compute unit in a namespace.
pub fn worker_selector() -> String {
    format!("{}={}", APP_LABEL, APP_WORKER)
}

/// Selector for the objects belonging to one tenant.
pub fn tenant_selector(guild_id: &str) -> String {
    format!("{}={},{}={}", APP_LABEL, APP_WORKER, GUILD_LABEL, guild_id)
}

/// Full label set stamped on a tenant's compute unit.
pub fn worker_labels(guild_id: &str, channel_id: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.to_string(), APP_WORKER.to_string());
    labels.insert(GUILD_LABEL.to_string(), guild_id.to_string());
    labels.insert(CHANNEL_LABEL.to_string(), channel_id.to_string());
    labels.insert(SCHEMA_LABEL.to_string(), LABEL_SCHEMA_VERSION.to_string());
    labels
}
