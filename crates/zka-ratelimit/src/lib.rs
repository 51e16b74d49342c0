// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-window per-key rate limiter.
//!
//! `rl:<prefix>:<key>` is atomically incremented on every [`RateLimiter::check`]
//! call. The TTL is set to the window length only on the first request of a
//! window — later requests within the same window never reset it, so a burst
//! of traffic cannot keep pushing its own deadline back.

#![deny(unsafe_code)]

use std::time::Duration;
use zka_error::AgentError;
use zka_kv::KvStore;

/// Outcome of a [`RateLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the call is admitted.
    pub allowed: bool,
    /// Requests remaining in the current window after this call.
    pub remaining: u32,
    /// Seconds until the window resets, populated when `allowed` is `false`.
    pub retry_after: Option<Duration>,
}

/// A fixed-window counter keyed by an arbitrary prefix plus caller-supplied key.
pub struct RateLimiter<'a> {
    store: &'a dyn KvStore,
    prefix: &'a str,
    max_requests: u32,
    window: Duration,
}

impl<'a> RateLimiter<'a> {
    /// Construct a limiter admitting up to `max_requests` calls per `window`
    /// for keys namespaced under `prefix`.
    pub fn new(store: &'a dyn KvStore, prefix: &'a str, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            prefix,
            max_requests,
            window,
        }
    }

    /// Atomically check and record one request against `key`.
    ///
    /// # Errors
    ///
    /// Propagates any [`zka_kv::KvStore`] failure.
    pub async fn check(&self, key: &str) -> Result<Decision, AgentError> {
        let storage_key = format!("rl:{}:{}", self.prefix, key);
        let count = self.store.incr(&storage_key).await?;
        if count == 1 {
            self.store.expire(&storage_key, self.window).await?;
        }
        let count_u32 = u32::try_from(count).unwrap_or(u32::MAX);
        let allowed = count_u32 <= self.max_requests;
        let remaining = self.max_requests.saturating_sub(count_u32);
        let retry_after = if allowed {
            None
        } else {
            Some(self.store.ttl(&storage_key).await?.unwrap_or(self.window))
        };
        Ok(Decision {
            allowed,
            remaining,
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zka_kv::MemoryKvStore;

    #[tokio::test]
    async fn admits_up_to_max_requests_then_blocks() {
        let store = MemoryKvStore::new();
        let limiter = RateLimiter::new(&store, "test", 2, Duration::from_secs(60));

        let d1 = limiter.check("alice").await.unwrap();
        assert!(d1.allowed);
        assert_eq!(d1.remaining, 1);

        let d2 = limiter.check("alice").await.unwrap();
        assert!(d2.allowed);
        assert_eq!(d2.remaining, 0);

        let d3 = limiter.check("alice").await.unwrap();
        assert!(!d3.allowed);
        assert!(d3.retry_after.unwrap() <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn distinct_keys_have_independent_windows() {
        let store = MemoryKvStore::new();
        let limiter = RateLimiter::new(&store, "test", 1, Duration::from_secs(60));
        assert!(limiter.check("alice").await.unwrap().allowed);
        assert!(limiter.check("bob").await.unwrap().allowed);
        assert!(!limiter.check("alice").await.unwrap().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_is_only_set_on_first_request_of_window() {
        let store = MemoryKvStore::new();
        let limiter = RateLimiter::new(&store, "test", 5, Duration::from_secs(100));
        limiter.check("alice").await.unwrap();
        tokio::time::advance(Duration::from_secs(50)).await;
        limiter.check("alice").await.unwrap();
        let remaining = store.ttl("rl:test:alice").await.unwrap().unwrap();
        // Second call must not have reset the window: ~50s left, not ~100s.
        assert!(remaining <= Duration::from_secs(50));
    }
}
