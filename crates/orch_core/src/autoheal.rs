//! Runtime Error Autoheal State: decides whether a browser-side runtime
//! error fingerprint should trigger a spontaneous agent run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct RuntimeAutoHealConfig {
    pub cooldown_s: i64,
    pub dedupe_window_s: i64,
    pub max_attempts_per_fingerprint: u32,
}

impl Default for RuntimeAutoHealConfig {
    fn default() -> Self {
        Self {
            cooldown_s: 30,
            dedupe_window_s: 600,
            max_attempts_per_fingerprint: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FingerprintState {
    last_handled_ms: i64,
    attempts: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeErrorAutohealState {
    last_autoheal_ms: Option<i64>,
    by_fingerprint: HashMap<String, FingerprintState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Disabled,
    Dedupe,
    MaxAttempts,
    Cooldown,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Disabled => "disabled",
            DenyReason::Dedupe => "dedupe",
            DenyReason::MaxAttempts => "max_attempts",
            DenyReason::Cooldown => "cooldown",
        }
    }
}

impl RuntimeErrorAutohealState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a new autoheal run is allowed for `fingerprint` at
    /// time `now_ms`, without mutating state — callers call
    /// [`Self::record_run`] only after a run actually starts.
    pub fn decide(&self, enabled: bool, fingerprint: &str, now_ms: i64, config: RuntimeAutoHealConfig) -> Result<(), DenyReason> {
        if !enabled {
            return Err(DenyReason::Disabled);
        }
        if let Some(fp) = self.by_fingerprint.get(fingerprint) {
            if now_ms - fp.last_handled_ms < config.dedupe_window_s * 1000 {
                return Err(DenyReason::Dedupe);
            }
            if fp.attempts >= config.max_attempts_per_fingerprint {
                return Err(DenyReason::MaxAttempts);
            }
        }
        if let Some(last) = self.last_autoheal_ms {
            if now_ms - last < config.cooldown_s * 1000 {
                return Err(DenyReason::Cooldown);
            }
        }
        Ok(())
    }

    pub fn record_run(&mut self, fingerprint: &str, now_ms: i64) {
        self.last_autoheal_ms = Some(now_ms);
        let entry = self.by_fingerprint.entry(fingerprint.to_string()).or_default();
        entry.last_handled_ms = now_ms;
        entry.attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_blocks_identical_fingerprint_within_window() {
        let mut state = RuntimeErrorAutohealState::new();
        let config = RuntimeAutoHealConfig { cooldown_s: 30, dedupe_window_s: 600, max_attempts_per_fingerprint: 2 };
        assert!(state.decide(true, "fp1", 0, config).is_ok());
        state.record_run("fp1", 0);
        assert_eq!(state.decide(true, "fp1", 5_000, config), Err(DenyReason::Dedupe));
    }

    #[test]
    fn cooldown_blocks_distinct_fingerprint_right_after_another() {
        let mut state = RuntimeErrorAutohealState::new();
        let config = RuntimeAutoHealConfig { cooldown_s: 30, dedupe_window_s: 600, max_attempts_per_fingerprint: 2 };
        state.record_run("fp1", 0);
        // a third, distinct fingerprint within 5s of the first run still hits the global cooldown
        assert_eq!(state.decide(true, "fp3", 5_000, config), Err(DenyReason::Cooldown));
    }

    #[test]
    fn disabled_always_denies() {
        let state = RuntimeErrorAutohealState::new();
        let config = RuntimeAutoHealConfig::default();
        assert_eq!(state.decide(false, "fp1", 0, config), Err(DenyReason::Disabled));
    }

    #[test]
    fn max_attempts_eventually_denies_after_cooldown_clears() {
        let mut state = RuntimeErrorAutohealState::new();
        let config = RuntimeAutoHealConfig { cooldown_s: 0, dedupe_window_s: 0, max_attempts_per_fingerprint: 2 };
        state.record_run("fp1", 0);
        state.record_run("fp1", 1);
        assert_eq!(state.decide(true, "fp1", 2, config), Err(DenyReason::MaxAttempts));
    }
}
