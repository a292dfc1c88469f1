//! Membership registry
//!
//! In-memory, TTL-based directory of live clusters. Members are upserted on
//! every heartbeat and evicted lazily: producing a snapshot removes every
//! entry whose heartbeat is older than the TTL, so no sweeper task is needed.
//!
//! ## Locking
//!
//! A single reader/writer lock guards the map. `register` takes it
//! exclusively. `snapshot` classifies entries under the shared lock and then
//! deletes the stale ones under the exclusive lock as a separate step.
//! Deletion by name is idempotent, so overlapping snapshots can race on the
//! same stale entry without double counting.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::member::{Member, RegisteredMember};

/// Default time a member stays live after its last heartbeat
pub const DEFAULT_MEMBER_TTL_SECS: i64 = 5 * 60;

/// Result of a registry snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Live members, sorted by name
    pub live: Vec<Member>,
    /// Names removed by this snapshot
    pub evicted: Vec<String>,
}

/// Concurrent-safe registry of live members
pub struct Registry {
    members: RwLock<HashMap<String, RegisteredMember>>,
    ttl: chrono::Duration,
}

impl Registry {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Upsert a member with the current wall-clock time as its heartbeat.
    ///
    /// The time is taken after the lock is acquired, so among concurrent
    /// calls for one name the last writer also carries the latest time.
    pub async fn register(&self, member: Member) {
        let mut members = self.members.write().await;
        let now = Utc::now();
        Self::upsert(&mut members, member, now);
    }

    /// Upsert a member with an explicit heartbeat time.
    pub async fn register_at(&self, member: Member, now: DateTime<Utc>) {
        let mut members = self.members.write().await;
        Self::upsert(&mut members, member, now);
    }

    fn upsert(
        members: &mut HashMap<String, RegisteredMember>,
        member: Member,
        now: DateTime<Utc>,
    ) {
        let name = member.name.clone();
        let previous = members.insert(
            name.clone(),
            RegisteredMember {
                member,
                last_heartbeat: now,
            },
        );

        match previous {
            Some(_) => debug!(cluster = %name, "Refreshed member heartbeat"),
            None => info!(cluster = %name, "Registered new member"),
        }
    }

    /// Live members at the current time, evicting stale ones.
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot_at(Utc::now()).await
    }

    /// Live members at `now`, evicting every member outside the TTL window.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Snapshot {
        let (mut live, stale) = {
            let members = self.members.read().await;
            let mut live = Vec::with_capacity(members.len());
            let mut stale = Vec::new();

            for (name, entry) in members.iter() {
                if entry.is_live(self.ttl, now) {
                    live.push(entry.member.clone());
                } else {
                    stale.push(name.clone());
                }
            }
            (live, stale)
        };

        let evicted = if stale.is_empty() {
            Vec::new()
        } else {
            let mut members = self.members.write().await;
            let mut evicted = Vec::with_capacity(stale.len());

            for name in stale {
                // A heartbeat may have landed between the two lock phases
                let still_stale = members
                    .get(&name)
                    .is_some_and(|entry| !entry.is_live(self.ttl, now));

                if still_stale && members.remove(&name).is_some() {
                    info!(cluster = %name, "Evicted stale member");
                    evicted.push(name);
                }
            }
            evicted
        };

        live.sort_by(|a, b| a.name.cmp(&b.name));
        Snapshot { live, evicted }
    }

    /// Number of entries currently held, live or not.
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Heartbeat time recorded for a member, if present.
    pub async fn last_heartbeat(&self, name: &str) -> Option<DateTime<Utc>> {
        self.members
            .read()
            .await
            .get(name)
            .map(|entry| entry.last_heartbeat)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(chrono::Duration::seconds(DEFAULT_MEMBER_TTL_SECS))
    }
}
