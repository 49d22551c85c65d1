use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetpool_domain::id::{ClusterId, HostId};

/// Sentinel `user_id` for a cluster whose backend composition has not yet
/// finished coming up. Kept alongside the explicit `ClusterStatus` column as
/// the externally-projected value, rather than being the sole state signal.
pub const NOT_READY_FOR_APPLY: &str = "__NOT_READY_FOR_APPLY__";

/// Lifecycle state of a cluster record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    Provisioning,
    Idle,
    Leased,
    Releasing,
}

/// A live or recently-archived cluster record.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub host_id: HostId,
    pub api_url: String,
    pub user_id: String,
    pub status: ClusterStatus,
    pub shape: ClusterShape,
    pub node_containers: Vec<String>,
    pub create_ts: DateTime<Utc>,
    pub apply_ts: Option<DateTime<Utc>>,
    pub release_ts: Option<DateTime<Utc>>,
}

impl Cluster {
    /// An idle cluster is eligible for `apply`.
    pub fn is_idle(&self) -> bool {
        self.status == ClusterStatus::Idle && self.user_id.is_empty()
    }
}

/// Cluster shape attributes used both at creation and as `apply` filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterShape {
    pub consensus_plugin: String,
    pub consensus_mode: String,
    pub size: i32,
}

/// Fields needed to insert a brand new cluster record.
#[derive(Debug, Clone)]
pub struct NewCluster {
    pub name: String,
    pub host_id: HostId,
    pub api_url: String,
    pub user_id: String,
    pub shape: ClusterShape,
}

/// A possibly-empty set of shape constraints used by `apply`.
///
/// Every field here is enumerated; unknown filter keys are rejected at the
/// facade layer before they ever reach the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterCondition {
    pub consensus_plugin: Option<String>,
    pub consensus_mode: Option<String>,
    pub size: Option<i32>,
}

impl ClusterCondition {
    pub fn matches(&self, shape: &ClusterShape) -> bool {
        self.consensus_plugin
            .as_ref()
            .is_none_or(|v| v == &shape.consensus_plugin)
            && self
                .consensus_mode
                .as_ref()
                .is_none_or(|v| v == &shape.consensus_mode)
            && self.size.is_none_or(|v| v == shape.size)
    }
}

/// Which of the two persistent collections a query or mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Active,
    Released,
}

/// Predicate passed to `list`/`get`, in lieu of the original's open-ended
/// dictionary.
#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    pub id: Option<ClusterId>,
    pub host_id: Option<HostId>,
    pub user_id: Option<UserIdFilter>,
}

/// `user_id` is the one field the original predicate language compares with
/// both equality and inequality (the `inused` filter passes `!=`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdFilter {
    Eq(String),
    Ne(String),
}

impl ClusterFilter {
    /// `user_id != ""` — every leased-or-releasing cluster.
    pub fn in_use() -> Self {
        Self {
            user_id: Some(UserIdFilter::Ne(String::new())),
            ..Default::default()
        }
    }

    pub fn by_id(id: ClusterId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(UserIdFilter::Eq(user_id.into())),
            ..Default::default()
        }
    }
}

/// A host record, as read/written through `HostRegistry`.
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub id: HostId,
    pub daemon_url: String,
    pub status: String,
    pub capacity: i32,
    pub clusters: Vec<String>,
}

impl Host {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn has_room(&self) -> bool {
        (self.clusters.len() as i32) < self.capacity
    }
}

/// Canonical externally-visible projection of a cluster record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterProjection {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub host_id: String,
    pub api_url: String,
    #[serde(serialize_with = "fleetpool_core::serde::to_rfc3339_ms")]
    pub create_ts: DateTime<Utc>,
    #[serde(serialize_with = "serialize_optional_ts")]
    pub apply_ts: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_optional_ts")]
    pub release_ts: Option<DateTime<Utc>>,
    pub node_containers: Vec<String>,
    /// Present only when the projection is returned from `apply`, which
    /// additionally exposes the lease's daemon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_url: Option<String>,
}

fn serialize_optional_ts<S>(
    ts: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match ts {
        Some(ts) => fleetpool_core::serde::to_rfc3339_ms(ts, serializer),
        // Missing timestamps render as "" for forward compatibility.
        None => serializer.serialize_str(""),
    }
}

impl From<Cluster> for ClusterProjection {
    fn from(c: Cluster) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name,
            user_id: c.user_id,
            host_id: c.host_id.to_string(),
            api_url: c.api_url,
            create_ts: c.create_ts,
            apply_ts: c.apply_ts,
            release_ts: c.release_ts,
            node_containers: c.node_containers,
            daemon_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_match_empty_condition_against_any_shape() {
        let cond = ClusterCondition::default();
        let shape = ClusterShape {
            consensus_plugin: "raft".into(),
            consensus_mode: "solo".into(),
            size: 4,
        };
        assert!(cond.matches(&shape));
    }

    #[test]
    fn should_reject_mismatched_size() {
        let cond = ClusterCondition {
            size: Some(4),
            ..Default::default()
        };
        let shape = ClusterShape {
            consensus_plugin: "raft".into(),
            consensus_mode: "solo".into(),
            size: 3,
        };
        assert!(!cond.matches(&shape));
    }

    #[test]
    fn should_build_in_use_filter_as_not_equal_empty_string() {
        let filter = ClusterFilter::in_use();
        assert_eq!(filter.user_id, Some(UserIdFilter::Ne(String::new())));
    }
}
