use std::sync::Arc;
use std::time::Duration;

use inviterole_models::id::{GuildId, UserId};

use crate::error::{AssignError, PlatformError};
use crate::mapper::MappedRole;
use crate::platform::Platform;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total calls allowed while the platform keeps answering "rate limited".
    pub rate_limit_attempts: u32,
    /// Retries after network errors, spaced `backoff_base * 2^n`.
    pub transient_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_attempts: 3,
            transient_retries: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Grants roles, retrying the failures that are worth retrying.
pub struct RoleAssigner {
    platform: Arc<dyn Platform>,
    policy: RetryPolicy,
}

impl RoleAssigner {
    pub fn new(platform: Arc<dyn Platform>, policy: RetryPolicy) -> Self {
        Self { platform, policy }
    }

    pub async fn assign(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        role: &MappedRole,
        reason: &str,
    ) -> Result<(), AssignError> {
        let mut attempts = 0u32;
        let mut rate_limited = 0u32;
        let mut transient = 0u32;

        loop {
            attempts += 1;
            let err = match self
                .platform
                .grant_role(guild_id, member_id, role.id, reason)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            let delay = match err {
                PlatformError::Forbidden(message) => return Err(AssignError::Forbidden(message)),
                PlatformError::NotFound => return Err(AssignError::NotFound),
                PlatformError::RateLimited { retry_after } => {
                    rate_limited += 1;
                    if rate_limited >= self.policy.rate_limit_attempts {
                        return Err(AssignError::RateLimited {
                            retry_after,
                            attempts,
                        });
                    }
                    retry_after
                }
                PlatformError::Transient(message) => {
                    if transient >= self.policy.transient_retries {
                        return Err(AssignError::TransientNetworkError { message, attempts });
                    }
                    let delay = backoff_delay(self.policy.backoff_base, transient);
                    transient += 1;
                    delay
                }
            };

            tracing::warn!(
                guild_id = %guild_id,
                member_id = %member_id,
                role_id = %role.id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "role grant failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// `base * 2^retry`, saturating instead of overflowing on large config values.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inviterole_models::id::RoleId;
    use inviterole_models::invite::InviteRecord;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct ScriptedPlatform {
        replies: Mutex<VecDeque<Result<(), PlatformError>>>,
        grants: Mutex<u32>,
    }

    impl ScriptedPlatform {
        fn new(replies: Vec<Result<(), PlatformError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                grants: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.grants.lock().unwrap()
        }
    }

    #[async_trait]
    impl Platform for ScriptedPlatform {
        async fn list_invites(&self, _: GuildId) -> Result<Vec<InviteRecord>, PlatformError> {
            Ok(Vec::new())
        }

        async fn grant_role(&self, _: GuildId, _: UserId, _: RoleId, _: &str) -> Result<(), PlatformError> {
            *self.grants.lock().unwrap() += 1;
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    fn moderator() -> MappedRole {
        MappedRole {
            id: RoleId::new(10),
            name: "Moderator".into(),
        }
    }

    fn rate_limited(secs: u64) -> Result<(), PlatformError> {
        Err(PlatformError::RateLimited {
            retry_after: Duration::from_secs(secs),
        })
    }

    fn transient() -> Result<(), PlatformError> {
        Err(PlatformError::Transient("connection reset".into()))
    }

    async fn run(platform: &Arc<ScriptedPlatform>) -> Result<(), AssignError> {
        let assigner = RoleAssigner::new(platform.clone(), RetryPolicy::default());
        assigner
            .assign(GuildId::new(1), UserId::new(2), &moderator(), "test")
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_twice_then_success() {
        let platform = ScriptedPlatform::new(vec![rate_limited(2), rate_limited(2), Ok(())]);
        let started = Instant::now();
        assert!(run(&platform).await.is_ok());
        assert_eq!(platform.calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_surfaces_after_three_attempts() {
        let platform = ScriptedPlatform::new(vec![rate_limited(1), rate_limited(1), rate_limited(5)]);
        let err = run(&platform).await.unwrap_err();
        assert_eq!(platform.calls(), 3);
        assert_eq!(
            err,
            AssignError::RateLimited {
                retry_after: Duration::from_secs(5),
                attempts: 3,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn forbidden_is_not_retried() {
        let platform = ScriptedPlatform::new(vec![Err(PlatformError::Forbidden("Missing Permissions".into()))]);
        let err = run(&platform).await.unwrap_err();
        assert_eq!(platform.calls(), 1);
        assert!(matches!(err, AssignError::Forbidden(_)));
        assert!(!err.is_benign());
    }

    #[tokio::test(start_paused = true)]
    async fn member_gone_is_benign_and_not_retried() {
        let platform = ScriptedPlatform::new(vec![Err(PlatformError::NotFound)]);
        let err = run(&platform).await.unwrap_err();
        assert_eq!(platform.calls(), 1);
        assert!(err.is_benign());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_back_off_exponentially() {
        let platform = ScriptedPlatform::new(vec![transient(), transient(), Ok(())]);
        let started = Instant::now();
        assert!(run(&platform).await.is_ok());
        assert_eq!(platform.calls(), 3);
        // 1s + 2s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_surface_when_exhausted() {
        let platform = ScriptedPlatform::new(vec![transient(), transient(), transient(), transient()]);
        let started = Instant::now();
        let err = run(&platform).await.unwrap_err();
        assert_eq!(platform.calls(), 4);
        assert!(started.elapsed() >= Duration::from_secs(7));
        assert!(matches!(err, AssignError::TransientNetworkError { attempts: 4, .. }));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(Duration::from_secs(1), 2), Duration::from_secs(4));
        let huge = Duration::from_millis(u64::MAX);
        assert_eq!(backoff_delay(huge, 12), Duration::MAX);
        assert_eq!(backoff_delay(Duration::from_secs(1), 64), Duration::MAX);
    }
}
