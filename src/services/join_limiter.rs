use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    constants::JOIN_RATE_LIMIT_WINDOW_SECS,
    error::{AppError, Result},
};

/// Per-player matchmaking join limit, counted in fixed redis windows.
/// Fails open: without redis, or when redis errors, joins are let through.
#[derive(Clone)]
pub struct JoinRateLimiter {
    redis: Option<ConnectionManager>,
    limit_per_window: u32,
}

fn time_bucket(window_seconds: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now / window_seconds.max(1)
}

fn limiter_key(player_id: &str, bucket: u64) -> String {
    format!(
        "arena:join:rl:{}:{}",
        player_id.trim().to_ascii_lowercase(),
        bucket
    )
}

impl JoinRateLimiter {
    pub fn new(redis: Option<ConnectionManager>, limit_per_window: u32) -> Self {
        Self {
            redis,
            limit_per_window,
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.redis.is_some() && self.limit_per_window > 0
    }

    pub async fn check(&self, player_id: &str) -> Result<()> {
        if self.limit_per_window == 0 {
            return Ok(());
        }
        let Some(redis) = &self.redis else {
            return Ok(());
        };

        let key = limiter_key(player_id, time_bucket(JOIN_RATE_LIMIT_WINDOW_SECS));
        let mut conn = redis.clone();

        let count: i64 = match conn.incr(&key, 1_i64).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Join rate limiter skipped (incr failed): {}", err);
                return Ok(());
            }
        };
        if count == 1 {
            let _: std::result::Result<bool, redis::RedisError> =
                conn.expire(&key, JOIN_RATE_LIMIT_WINDOW_SECS as i64).await;
        }

        if count > i64::from(self.limit_per_window) {
            tracing::warn!(
                "Join rate limit exceeded player={} count={} limit={}",
                player_id,
                count,
                self.limit_per_window
            );
            return Err(AppError::RateLimitExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_without_redis_lets_everyone_through() {
        let limiter = JoinRateLimiter::new(None, 1);
        assert!(!limiter.is_active());
        for _ in 0..5 {
            limiter.check("alice").await.unwrap();
        }
    }

    #[test]
    fn key_is_normalized_per_player_and_window() {
        assert_eq!(limiter_key(" Alice ", 42), "arena:join:rl:alice:42");
        assert_ne!(limiter_key("alice", 42), limiter_key("alice", 43));
    }

    #[test]
    fn join_window_buckets_epoch_seconds() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let bucket = time_bucket(JOIN_RATE_LIMIT_WINDOW_SECS);
        let expected = now / JOIN_RATE_LIMIT_WINDOW_SECS;
        assert!(bucket == expected || bucket == expected + 1);
    }

    #[test]
    fn zero_window_does_not_divide_by_zero() {
        assert!(time_bucket(0) > 0);
    }
}
