use std::sync::Arc;

use inviterole_core::{JoinOutcome, JoinSerializer, SerializerError, SnapshotError};
use inviterole_models::gateway::GatewayEvent;
use inviterole_models::id::GuildId;
use inviterole_models::invite::InviteSnapshot;
use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinError, JoinSet};

enum Finished {
    Join(Result<JoinOutcome, SerializerError>),
    Primed(Result<InviteSnapshot, SnapshotError>),
}

/// Spawn one task per join for `guild_id` until shutdown or until the
/// gateway side of the channel is gone, then let started joins finish.
///
/// Every READY means a fresh session that may have missed joins, so the
/// guild's baseline is marked stale and captured again.
pub async fn run_joins(
    serializer: Arc<JoinSerializer>,
    mut events: mpsc::Receiver<GatewayEvent>,
    guild_id: GuildId,
    shutdown: Arc<Notify>,
) {
    let mut tasks = JoinSet::new();

    loop {
        if serializer.is_shutting_down() {
            break;
        }
        tokio::select! {
            _ = shutdown.notified() => break,
            event = events.recv() => match event {
                Some(GatewayEvent::Ready) => {
                    serializer.mark_stale(guild_id);
                    let serializer = serializer.clone();
                    tasks.spawn(async move { Finished::Primed(serializer.prime(guild_id).await) });
                }
                Some(GatewayEvent::MemberJoined(event)) if event.guild_id != guild_id => {
                    tracing::debug!(guild_id = %event.guild_id, "ignoring join in unconfigured guild");
                }
                Some(GatewayEvent::MemberJoined(event)) => {
                    tracing::info!(
                        guild_id = %event.guild_id,
                        member_id = %event.member_id,
                        "member joined"
                    );
                    let serializer = serializer.clone();
                    tasks.spawn(async move { Finished::Join(serializer.submit(event).await) });
                }
                None => break,
            },
            Some(done) = tasks.join_next(), if !tasks.is_empty() => log_finished(done),
        }
    }

    serializer.shutdown();
    drop(events);
    if !tasks.is_empty() {
        tracing::info!(pending = tasks.len(), "waiting for in-flight joins");
    }
    while let Some(done) = tasks.join_next().await {
        log_finished(done);
    }
}

fn log_finished(done: Result<Finished, JoinError>) {
    match done {
        Ok(Finished::Join(Ok(outcome))) => {
            tracing::debug!(
                member_id = %outcome.event.member_id,
                attribution = %outcome.attribution,
                "join processed"
            );
        }
        Ok(Finished::Join(Err(SerializerError::ShuttingDown))) => {}
        Ok(Finished::Primed(Ok(_))) => {}
        Ok(Finished::Primed(Err(e))) => tracing::warn!(
            error = %e,
            "could not recapture invites after reconnect, the next join will only seed a baseline"
        ),
        Err(e) => tracing::error!(error = %e, "join task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use inviterole_core::{MappedRole, Platform, PlatformError, RetryPolicy, RoleMapper, RoleMapping};
    use inviterole_models::id::{RoleId, UserId};
    use inviterole_models::invite::InviteRecord;
    use inviterole_models::member::JoinEvent;
    use std::sync::Mutex;

    const GUILD: GuildId = GuildId::new(1);

    #[derive(Default)]
    struct Recorder {
        uses: Mutex<u32>,
        grants: Mutex<Vec<UserId>>,
    }

    #[async_trait]
    impl Platform for Recorder {
        async fn list_invites(&self, _: GuildId) -> Result<Vec<InviteRecord>, PlatformError> {
            Ok(vec![InviteRecord {
                code: "abc123".into(),
                uses: *self.uses.lock().unwrap(),
                max_uses: None,
                created_at: Utc::now() - chrono::Duration::days(1),
            }])
        }

        async fn grant_role(&self, _: GuildId, member: UserId, _: RoleId, _: &str) -> Result<(), PlatformError> {
            self.grants.lock().unwrap().push(member);
            Ok(())
        }
    }

    fn joined(member: u64, guild_id: GuildId) -> GatewayEvent {
        GatewayEvent::MemberJoined(JoinEvent {
            member_id: UserId::new(member),
            guild_id,
            joined_at: Utc::now(),
        })
    }

    async fn wait_for_grants(platform: &Recorder, count: usize) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while platform.grants.lock().unwrap().len() < count {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn serializer(platform: Arc<Recorder>) -> Arc<JoinSerializer> {
        let mapping = RoleMapping::from_entries([(
            "abc123",
            MappedRole {
                id: RoleId::new(9),
                name: "Moderator".into(),
            },
        )])
        .unwrap();
        Arc::new(JoinSerializer::new(
            platform,
            Arc::new(RoleMapper::new(mapping)),
            RetryPolicy::default(),
        ))
    }

    #[tokio::test]
    async fn processes_joins_until_channel_closes() {
        let platform = Arc::new(Recorder::default());
        let serializer = serializer(platform.clone());
        serializer.prime(GUILD).await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(run_joins(
            serializer.clone(),
            rx,
            GUILD,
            Arc::new(Notify::new()),
        ));

        *platform.uses.lock().unwrap() += 1;
        tx.send(joined(7, GUILD)).await.unwrap();
        wait_for_grants(&platform, 1).await;
        tx.send(joined(8, GuildId::new(999))).await.unwrap();
        drop(tx);

        runner.await.unwrap();
        assert_eq!(*platform.grants.lock().unwrap(), vec![UserId::new(7)]);
        assert!(serializer.is_shutting_down());
    }

    #[tokio::test]
    async fn stops_taking_joins_after_shutdown() {
        let platform = Arc::new(Recorder::default());
        let serializer = serializer(platform.clone());
        let (tx, rx) = mpsc::channel(8);

        serializer.shutdown();
        tx.send(joined(7, GUILD)).await.unwrap();

        run_joins(serializer, rx, GUILD, Arc::new(Notify::new())).await;
        assert!(platform.grants.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reconnect_does_not_pin_missed_join_on_next_member() {
        let platform = Arc::new(Recorder::default());
        let serializer = serializer(platform.clone());
        serializer.prime(GUILD).await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(run_joins(
            serializer.clone(),
            rx,
            GUILD,
            Arc::new(Notify::new()),
        ));

        // Someone joins through abc123 while the session is down.
        *platform.uses.lock().unwrap() += 1;
        tx.send(GatewayEvent::Ready).await.unwrap();
        // The next member comes in without touching any counter.
        tx.send(joined(7, GUILD)).await.unwrap();
        // And a later one really uses abc123.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        *platform.uses.lock().unwrap() += 1;
        tx.send(joined(8, GUILD)).await.unwrap();
        wait_for_grants(&platform, 1).await;
        drop(tx);

        runner.await.unwrap();
        assert_eq!(*platform.grants.lock().unwrap(), vec![UserId::new(8)]);
    }
}
