// SPDX-FileCopyrightText: 2026 Backvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failed-unlock accounting and lockout with exponential backoff.
//!
//! The state lives in the unencrypted vault header: it must be readable and
//! writable before the vault can be decrypted.

use backvault_config::model::LockoutConfig;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lockout thresholds and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger the first lockout.
    pub threshold: u32,
    /// Lockout length when the threshold is reached.
    pub base_backoff: Duration,
    /// Cap on the lockout length.
    pub max_backoff: Duration,
}

impl LockoutPolicy {
    pub fn from_config(config: &LockoutConfig) -> Self {
        Self {
            threshold: config.threshold,
            base_backoff: secs_to_duration(config.base_backoff_secs),
            max_backoff: secs_to_duration(config.max_backoff_secs),
        }
    }

    /// Lockout length after `failed_attempts` consecutive failures, if any.
    ///
    /// `base * 2^(failed_attempts - threshold)`, capped at `max_backoff`.
    pub fn backoff_for(&self, failed_attempts: u32) -> Option<Duration> {
        let over = failed_attempts.checked_sub(self.threshold)?;
        let factor = 1i32.checked_shl(over.min(30)).unwrap_or(i32::MAX);
        let backoff = self
            .base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff);
        Some(backoff.min(self.max_backoff))
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from_config(&LockoutConfig::default())
    }
}

/// Out-of-range values saturate at roughly a century.
fn secs_to_duration(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(|| Duration::days(36_500))
}

/// Persisted failure counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    /// Consecutive failed unlocks since the last successful one.
    pub failed_attempts: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub locked_until: Option<DateTime<Utc>>,
}

/// What [`LockoutState::record_failure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Below the threshold; unlocking may be retried immediately.
    Counted,
    /// The threshold was reached or exceeded; locked until the given time.
    LockedOut(DateTime<Utc>),
}

impl LockoutState {
    /// The time unlock attempts are blocked until, if that is still in the future.
    pub fn active_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| now < *until)
    }

    /// Count a failed unlock at `now`, locking out once the threshold is crossed.
    pub fn record_failure(&mut self, now: DateTime<Utc>, policy: &LockoutPolicy) -> FailureOutcome {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.last_failure = Some(now);
        match policy.backoff_for(self.failed_attempts) {
            Some(backoff) => {
                let until = now + backoff;
                self.locked_until = Some(until);
                FailureOutcome::LockedOut(until)
            }
            None => FailureOutcome::Counted,
        }
    }

    /// Clear all counters after a successful unlock.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True when there is nothing to clear.
    pub fn is_clear(&self) -> bool {
        self.failed_attempts == 0 && self.locked_until.is_none()
    }
}
