use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use inviterole_models::attribution::AttributionResult;
use inviterole_models::id::GuildId;
use inviterole_models::invite::InviteSnapshot;
use inviterole_models::member::JoinEvent;
use tokio::sync::Mutex;

use crate::assigner::{RetryPolicy, RoleAssigner};
use crate::attribution::attribute;
use crate::error::{AssignError, SerializerError, SnapshotError};
use crate::mapper::{MappedRole, RoleMapper};
use crate::platform::Platform;
use crate::snapshot::InviteSnapshotStore;

/// What happened to the role side of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleOutcome {
    /// Attribution did not single out one invite.
    NotAttributed,
    /// The invite is known but grants no role.
    NoMapping,
    Granted(MappedRole),
    /// The member left before the grant landed.
    MemberLeft(MappedRole),
    Failed { role: MappedRole, error: AssignError },
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub event: JoinEvent,
    pub attribution: AttributionResult,
    pub role: RoleOutcome,
    /// Baseline the join was diffed against.
    pub before: Option<InviteSnapshot>,
    /// Capture taken for this join; the next join's baseline.
    pub after: Option<InviteSnapshot>,
}

/// One guild's join queue: a FIFO lock around its snapshot store, plus a flag
/// raised when the baseline may have missed joins.
struct Lane {
    store: Mutex<InviteSnapshotStore>,
    stale: AtomicBool,
}

impl Lane {
    /// Drop the baseline if it was marked stale since the last lock holder.
    /// Must be called with the store locked, before any refresh.
    fn take_stale(&self, store: &mut InviteSnapshotStore) {
        if self.stale.swap(false, Ordering::SeqCst) {
            store.invalidate();
        }
    }
}

/// Runs joins one guild at a time.
///
/// Each guild gets its own lane. A join holds its lane from the refresh until
/// the role call has finished, so join n+1 always diffs against the capture
/// join n produced. Lanes of different guilds never contend.
///
/// Whenever the chain may have a gap (a failed refresh, or a gateway
/// reconnect during which join events were lost) the baseline is dropped and
/// the next join only re-seeds it.
pub struct JoinSerializer {
    platform: Arc<dyn Platform>,
    mapper: Arc<RoleMapper>,
    assigner: RoleAssigner,
    lanes: DashMap<GuildId, Arc<Lane>>,
    shutting_down: AtomicBool,
}

impl JoinSerializer {
    pub fn new(platform: Arc<dyn Platform>, mapper: Arc<RoleMapper>, policy: RetryPolicy) -> Self {
        Self {
            assigner: RoleAssigner::new(platform.clone(), policy),
            platform,
            mapper,
            lanes: DashMap::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    fn lane(&self, guild_id: GuildId) -> Arc<Lane> {
        self.lanes
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(Lane {
                    store: Mutex::new(InviteSnapshotStore::new(guild_id, self.platform.clone())),
                    stale: AtomicBool::new(false),
                })
            })
            .clone()
    }

    /// Capture a fresh baseline for a guild, at boot or after a reconnect.
    ///
    /// On failure the baseline is dropped; the next join re-seeds it.
    pub async fn prime(&self, guild_id: GuildId) -> Result<InviteSnapshot, SnapshotError> {
        let lane = self.lane(guild_id);
        let mut store = lane.store.lock().await;
        lane.take_stale(&mut store);
        match store.refresh().await {
            Ok(snapshot) => {
                tracing::info!(guild_id = %guild_id, invites = snapshot.len(), "invite baseline captured");
                Ok(snapshot)
            }
            Err(err) => {
                store.invalidate();
                Err(err)
            }
        }
    }

    /// Note that joins for `guild_id` may have gone unseen. Takes effect for
    /// every join that locks the lane after this call.
    pub fn mark_stale(&self, guild_id: GuildId) {
        self.lane(guild_id).stale.store(true, Ordering::SeqCst);
        tracing::debug!(guild_id = %guild_id, "invite baseline marked stale");
    }

    /// The current baseline of a guild without touching the network.
    pub async fn baseline(&self, guild_id: GuildId) -> Option<InviteSnapshot> {
        let lane = self.lanes.get(&guild_id).map(|lane| lane.clone())?;
        let mut store = lane.store.lock().await;
        lane.take_stale(&mut store);
        store.current()
    }

    /// Stop starting new joins. Joins already past their lane lock run to completion.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub async fn submit(&self, event: JoinEvent) -> Result<JoinOutcome, SerializerError> {
        let lane = self.lane(event.guild_id);
        let mut store = lane.store.lock().await;

        if self.is_shutting_down() {
            tracing::info!(
                guild_id = %event.guild_id,
                member_id = %event.member_id,
                "dropping queued join during shutdown"
            );
            return Err(SerializerError::ShuttingDown);
        }

        lane.take_stale(&mut store);
        let before = store.current();
        let after = match store.refresh().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(
                    guild_id = %event.guild_id,
                    member_id = %event.member_id,
                    error = %err,
                    "could not refresh invites, join left unattributed"
                );
                store.invalidate();
                return Ok(JoinOutcome {
                    event,
                    attribution: AttributionResult::Unresolved,
                    role: RoleOutcome::NotAttributed,
                    before,
                    after: None,
                });
            }
        };

        let attribution = match &before {
            Some(before) => attribute(before, &after),
            None => {
                tracing::info!(
                    guild_id = %event.guild_id,
                    member_id = %event.member_id,
                    "no invite baseline yet, join cannot be attributed"
                );
                AttributionResult::Unresolved
            }
        };

        let role = self.apply(&event, &attribution).await;
        drop(store);

        Ok(JoinOutcome {
            event,
            attribution,
            role,
            before,
            after: Some(after),
        })
    }

    async fn apply(&self, event: &JoinEvent, attribution: &AttributionResult) -> RoleOutcome {
        let code = match attribution {
            AttributionResult::Resolved(code) => code,
            AttributionResult::Ambiguous(codes) => {
                tracing::warn!(
                    guild_id = %event.guild_id,
                    member_id = %event.member_id,
                    candidates = ?codes,
                    "several invites were used at once, not assigning a role"
                );
                return RoleOutcome::NotAttributed;
            }
            AttributionResult::Unresolved => {
                tracing::info!(
                    guild_id = %event.guild_id,
                    member_id = %event.member_id,
                    "could not determine which invite was used"
                );
                return RoleOutcome::NotAttributed;
            }
        };

        let Some(role) = self.mapper.resolve(code) else {
            tracing::info!(
                guild_id = %event.guild_id,
                member_id = %event.member_id,
                code = %code,
                "invite has no role mapping"
            );
            return RoleOutcome::NoMapping;
        };

        let reason = format!("Automatic role assignment via invite {code}");
        match self
            .assigner
            .assign(event.guild_id, event.member_id, role, &reason)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    guild_id = %event.guild_id,
                    member_id = %event.member_id,
                    code = %code,
                    role = %role.name,
                    role_id = %role.id,
                    "role assigned"
                );
                RoleOutcome::Granted(role.clone())
            }
            Err(error) if error.is_benign() => {
                tracing::debug!(
                    guild_id = %event.guild_id,
                    member_id = %event.member_id,
                    role_id = %role.id,
                    "member left before the role could be granted"
                );
                RoleOutcome::MemberLeft(role.clone())
            }
            Err(error) => {
                tracing::error!(
                    guild_id = %event.guild_id,
                    member_id = %event.member_id,
                    code = %code,
                    role = %role.name,
                    role_id = %role.id,
                    error = %error,
                    "failed to assign role"
                );
                RoleOutcome::Failed {
                    role: role.clone(),
                    error,
                }
            }
        }
    }
}
