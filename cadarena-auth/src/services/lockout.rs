use chrono::{DateTime, Duration, Utc};

/// The per-account columns the policy transitions over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutState {
    pub login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Open,
    Locked { remaining_minutes: i64 },
}

/// Pure brute-force lockout transitions. `check` never clears an expired
/// lockout: only a successful login (or a password reset) resets the
/// counters, so a failure after the window re-evaluates the threshold and
/// re-locks immediately.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    max_attempts: i32,
    lockout_duration: Duration,
}

impl LockoutPolicy {
    pub fn new(max_attempts: u32, lockout_duration_minutes: i64) -> Self {
        Self {
            max_attempts: max_attempts as i32,
            lockout_duration: Duration::minutes(lockout_duration_minutes),
        }
    }

    pub fn on_failure(&self, state: LockoutState, now: DateTime<Utc>) -> LockoutState {
        let login_attempts = state.login_attempts + 1;
        let locked_until = if login_attempts >= self.max_attempts {
            Some(now + self.lockout_duration)
        } else {
            state.locked_until
        };
        LockoutState { login_attempts, locked_until }
    }

    pub fn on_success(&self, _state: LockoutState) -> LockoutState {
        LockoutState::default()
    }

    pub fn check(&self, state: LockoutState, now: DateTime<Utc>) -> LockStatus {
        match state.locked_until {
            Some(until) if until > now => LockStatus::Locked {
                remaining_minutes: (until - now).num_minutes(),
            },
            _ => LockStatus::Open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, 15)
    }

    #[test]
    fn fifth_failure_locks_the_account() {
        let policy = policy();
        let now = Utc::now();
        let mut state = LockoutState::default();

        for _ in 0..4 {
            state = policy.on_failure(state, now);
            assert_eq!(policy.check(state, now), LockStatus::Open);
        }

        state = policy.on_failure(state, now);
        assert_eq!(state.login_attempts, 5);
        assert!(matches!(policy.check(state, now), LockStatus::Locked { .. }));
    }

    #[test]
    fn remaining_minutes_are_whole_minutes() {
        let policy = policy();
        let now = Utc::now();
        let state = policy.on_failure(
            LockoutState { login_attempts: 4, locked_until: None },
            now,
        );

        let later = now + Duration::seconds(90);
        match policy.check(state, later) {
            LockStatus::Locked { remaining_minutes } => assert_eq!(remaining_minutes, 13),
            LockStatus::Open => panic!("expected lock"),
        }
    }

    #[test]
    fn success_resets_everything() {
        let policy = policy();
        let now = Utc::now();
        let mut state = LockoutState::default();
        for _ in 0..5 {
            state = policy.on_failure(state, now);
        }

        let state = policy.on_success(state);
        assert_eq!(state, LockoutState::default());
        assert_eq!(policy.check(state, now), LockStatus::Open);
    }

    #[test]
    fn expired_window_opens_but_keeps_the_counter() {
        let policy = policy();
        let now = Utc::now();
        let mut state = LockoutState::default();
        for _ in 0..5 {
            state = policy.on_failure(state, now);
        }

        let after_window = now + Duration::minutes(16);
        assert_eq!(policy.check(state, after_window), LockStatus::Open);
        assert_eq!(state.login_attempts, 5);

        // the next failure is over the threshold again and re-locks
        let state = policy.on_failure(state, after_window);
        assert!(matches!(policy.check(state, after_window), LockStatus::Locked { .. }));
    }
}
