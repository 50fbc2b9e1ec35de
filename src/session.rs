//! VaultGuard Core - Access Session Gate
//!
//! Time-boxed "recently authenticated" sessions in front of the storage
//! engine, with rate limiting, exponential backoff and a self-destruct
//! counter. The authentication prompt itself is an external capability
//! behind [`AuthPrompt`]; this module only runs the state machine.
//!
//! State transitions happen inside one critical section; counters are
//! persisted through the injected prefs store so lockouts survive restarts.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{VaultError, VaultResult};
use crate::state::PrefsStore;
use crate::storage::SecureStorage;
use crate::textlog::TextLog;

const KEY_EXPIRES_AT_MS: &str = "expires_at_ms";
const KEY_WINDOW_START_MS: &str = "window_start_ms";
const KEY_WINDOW_COUNT: &str = "window_count";
const KEY_CONSEC_FAILS: &str = "consecutive_failures";
const KEY_LOCKOUT_UNTIL_MS: &str = "lockout_until_ms";

const WINDOW_MS: i64 = 60_000;
const PROMPT_TITLE: &str = "VaultGuard Authentication";

/// Outcome of one authentication prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    /// Recognized interaction, wrong credential (e.g. unrecognized finger)
    Failed,
    /// User dismissed the prompt; no penalty
    Cancelled,
    /// Platform-level error from the prompt machinery
    Error { code: i32, message: String },
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success)
    }
}

/// External authentication capability (biometric/device-credential prompt).
/// Must only be invoked from a foregrounded host UI; the gate enforces the
/// declared precondition and rejects background calls.
pub trait AuthPrompt {
    fn authenticate(&self, title: &str, reason: &str) -> AuthOutcome;
}

/// Gate policy knobs
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Seconds a successful authentication stays valid
    pub session_seconds: u32,
    /// Max prompt attempts inside the sliding one-minute window
    pub max_attempts_per_minute: u32,
    /// Consecutive failures that trigger the self-destruct wipe
    pub self_destruct_fails: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            session_seconds: 30,
            max_attempts_per_minute: 5,
            self_destruct_fails: 10,
        }
    }
}

/// Access Session Gate
pub struct AccessGate {
    prefs: Arc<dyn PrefsStore>,
    storage: Arc<SecureStorage>,
    access_log: TextLog,
    config: GateConfig,
    transition_lock: Mutex<()>,
}

impl AccessGate {
    pub fn new(
        prefs: Arc<dyn PrefsStore>,
        storage: Arc<SecureStorage>,
        access_log: TextLog,
        config: GateConfig,
    ) -> Self {
        Self {
            prefs,
            storage,
            access_log,
            config,
            transition_lock: Mutex::new(()),
        }
    }

    /// Whether a previous success is still inside its session window
    pub fn is_session_valid(&self, now_ms: i64) -> bool {
        self.prefs.get_i64(KEY_EXPIRES_AT_MS).unwrap_or(0) > now_ms
    }

    pub fn clear_session(&self) {
        self.prefs.remove(KEY_EXPIRES_AT_MS);
    }

    /// Authenticate with the wall clock
    pub fn authenticate(
        &self,
        prompt: &dyn AuthPrompt,
        reason: &str,
        foreground: bool,
    ) -> VaultResult<AuthOutcome> {
        self.authenticate_at(crate::storage::now_ms(), prompt, reason, foreground)
    }

    /// Run the full gate state machine at `now_ms`:
    ///
    /// 1. reject background invocations;
    /// 2. reject while a lockout is active ([`VaultError::LockedOut`]);
    /// 3. reject once the sliding window is exhausted, without showing the
    ///    prompt ([`VaultError::RateLimited`]);
    /// 4. otherwise show the prompt and apply its outcome: success opens a
    ///    session and resets penalties, cancellation only counts the
    ///    attempt, failure/error escalates backoff and - at the configured
    ///    threshold - wipes the vault ([`VaultError::SelfDestructTriggered`]).
    pub fn authenticate_at(
        &self,
        now_ms: i64,
        prompt: &dyn AuthPrompt,
        reason: &str,
        foreground: bool,
    ) -> VaultResult<AuthOutcome> {
        let _guard = self.transition_lock.lock();

        self.access_log.append_at(now_ms, "ATTEMPT", &format!("reason={reason}"));

        if !foreground {
            self.access_log.append_at(
                now_ms,
                "BLOCKED_BACKGROUND",
                &format!("reason={reason}"),
            );
            return Err(VaultError::PromptUnavailable(
                "authentication prompt requires foreground UI".into(),
            ));
        }

        let lockout_until = self.prefs.get_i64(KEY_LOCKOUT_UNTIL_MS).unwrap_or(0);
        if lockout_until > now_ms {
            let secs = ((lockout_until - now_ms) / 1000).max(1) as u64;
            self.access_log.append_at(
                now_ms,
                "BLOCKED_RATE_LIMIT",
                &format!("reason={reason} seconds={secs}"),
            );
            return Err(VaultError::LockedOut {
                retry_after_secs: secs,
            });
        }

        // Sliding window: at most N prompt attempts per minute.
        let window_start = self.prefs.get_i64(KEY_WINDOW_START_MS).unwrap_or(0);
        let window_count = self.prefs.get_i64(KEY_WINDOW_COUNT).unwrap_or(0);
        let within_window = window_start != 0 && now_ms - window_start <= WINDOW_MS;
        let new_window_start = if within_window { window_start } else { now_ms };
        let new_count = if within_window { window_count } else { 0 };

        if new_count >= i64::from(self.config.max_attempts_per_minute) {
            let fails = self.prefs.get_i64(KEY_CONSEC_FAILS).unwrap_or(0);
            let backoff_ms = compute_backoff_ms(fails + 1);
            self.prefs.put_i64(KEY_LOCKOUT_UNTIL_MS, now_ms + backoff_ms);
            self.prefs.put_i64(KEY_WINDOW_START_MS, new_window_start);
            self.prefs.put_i64(KEY_WINDOW_COUNT, new_count);
            self.access_log.append_at(
                now_ms,
                "BLOCKED_RATE_LIMIT",
                &format!("reason={reason} backoffMs={backoff_ms}"),
            );
            return Err(VaultError::RateLimited {
                retry_after_secs: (backoff_ms / 1000) as u64,
            });
        }

        let outcome = prompt.authenticate(PROMPT_TITLE, reason);

        // Count only actual prompt interactions in the window.
        let started = if window_start == 0 || now_ms - window_start > WINDOW_MS {
            now_ms
        } else {
            window_start
        };
        let count = if started == now_ms { 1 } else { window_count + 1 };

        match &outcome {
            AuthOutcome::Success => {
                let expires_at = now_ms + i64::from(self.config.session_seconds) * 1000;
                self.prefs.put_i64(KEY_EXPIRES_AT_MS, expires_at);
                self.prefs.put_i64(KEY_CONSEC_FAILS, 0);
                self.prefs.put_i64(KEY_LOCKOUT_UNTIL_MS, 0);
                self.prefs.put_i64(KEY_WINDOW_START_MS, started);
                self.prefs.put_i64(KEY_WINDOW_COUNT, count);
                self.access_log
                    .append_at(now_ms, "SUCCESS", &format!("reason={reason}"));
            }
            AuthOutcome::Cancelled => {
                self.prefs.put_i64(KEY_WINDOW_START_MS, started);
                self.prefs.put_i64(KEY_WINDOW_COUNT, count);
                self.access_log
                    .append_at(now_ms, "CANCELLED", &format!("reason={reason}"));
            }
            AuthOutcome::Failed | AuthOutcome::Error { .. } => {
                let fails = self.prefs.get_i64(KEY_CONSEC_FAILS).unwrap_or(0) + 1;

                if fails >= i64::from(self.config.self_destruct_fails) {
                    let _ = self.storage.wipe_all(true);
                    self.prefs.clear();
                    self.access_log.append_at(
                        now_ms,
                        "SELF_DESTRUCT_WIPE",
                        &format!("reason={reason} fails={fails}"),
                    );
                    return Err(VaultError::SelfDestructTriggered);
                }

                let backoff_ms = compute_backoff_ms(fails);
                self.prefs.put_i64(KEY_CONSEC_FAILS, fails);
                self.prefs.put_i64(KEY_LOCKOUT_UNTIL_MS, now_ms + backoff_ms);
                self.prefs.put_i64(KEY_WINDOW_START_MS, started);
                self.prefs.put_i64(KEY_WINDOW_COUNT, count);
                self.access_log.append_at(
                    now_ms,
                    "FAILED",
                    &format!("reason={reason} fails={fails} backoffMs={backoff_ms}"),
                );
            }
        }

        Ok(outcome)
    }

    /// Run `op` behind the gate: execute directly while a session is
    /// active, otherwise prompt first. Returns the prompt outcome together
    /// with the operation's result (`None` unless authentication succeeded).
    pub fn with_session<T>(
        &self,
        now_ms: i64,
        prompt: &dyn AuthPrompt,
        reason: &str,
        foreground: bool,
        op: impl FnOnce() -> T,
    ) -> VaultResult<(AuthOutcome, Option<T>)> {
        if self.is_session_valid(now_ms) {
            return Ok((AuthOutcome::Success, Some(op())));
        }
        let outcome = self.authenticate_at(now_ms, prompt, reason, foreground)?;
        if outcome.is_success() {
            Ok((outcome, Some(op())))
        } else {
            Ok((outcome, None))
        }
    }
}

/// Exponential backoff: 1s, 2s, 4s ... capped at 60s
fn compute_backoff_ms(consecutive_fails: i64) -> i64 {
    let exp = (1i64 << consecutive_fails.clamp(0, 6)) * 1000;
    exp.min(60_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyvault::SoftwareKeyVault;
    use crate::state::MemoryPrefsStore;
    use std::cell::RefCell;
    use tempfile::{tempdir, TempDir};

    struct ScriptedPrompt {
        outcomes: RefCell<Vec<AuthOutcome>>,
        shown: RefCell<u32>,
    }

    impl ScriptedPrompt {
        fn new(outcomes: Vec<AuthOutcome>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes),
                shown: RefCell::new(0),
            }
        }

        fn always(outcome: AuthOutcome) -> Self {
            Self {
                outcomes: RefCell::new(vec![outcome; 32]),
                shown: RefCell::new(0),
            }
        }

        fn times_shown(&self) -> u32 {
            *self.shown.borrow()
        }
    }

    impl AuthPrompt for ScriptedPrompt {
        fn authenticate(&self, _title: &str, _reason: &str) -> AuthOutcome {
            *self.shown.borrow_mut() += 1;
            self.outcomes
                .borrow_mut()
                .pop()
                .unwrap_or(AuthOutcome::Cancelled)
        }
    }

    fn make_gate(root: &TempDir) -> (AccessGate, Arc<SecureStorage>) {
        let storage = Arc::new(SecureStorage::new(
            root.path().join("storage"),
            Arc::new(SoftwareKeyVault::new(root.path().join("keys"))),
            Arc::new(MemoryPrefsStore::new()),
        ));
        let gate = AccessGate::new(
            Arc::new(MemoryPrefsStore::new()),
            Arc::clone(&storage),
            TextLog::new(root.path().join("biometric_access_log.txt")),
            GateConfig::default(),
        );
        (gate, storage)
    }

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_success_opens_session() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        let prompt = ScriptedPrompt::always(AuthOutcome::Success);

        let outcome = gate.authenticate_at(T0, &prompt, "load", true).unwrap();
        assert!(outcome.is_success());
        assert!(gate.is_session_valid(T0 + 29_000));
        assert!(!gate.is_session_valid(T0 + 31_000));
    }

    #[test]
    fn test_session_bypasses_prompt() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        let prompt = ScriptedPrompt::always(AuthOutcome::Success);

        gate.authenticate_at(T0, &prompt, "open", true).unwrap();
        let (outcome, value) = gate
            .with_session(T0 + 5_000, &prompt, "load", true, || 42)
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(value, Some(42));
        assert_eq!(prompt.times_shown(), 1);
    }

    #[test]
    fn test_background_rejected_without_prompt() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        let prompt = ScriptedPrompt::always(AuthOutcome::Success);

        let result = gate.authenticate_at(T0, &prompt, "load", false);
        assert!(matches!(result, Err(VaultError::PromptUnavailable(_))));
        assert_eq!(prompt.times_shown(), 0);
    }

    #[test]
    fn test_cancel_has_no_penalty() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        let prompt = ScriptedPrompt::always(AuthOutcome::Cancelled);

        let outcome = gate.authenticate_at(T0, &prompt, "load", true).unwrap();
        assert_eq!(outcome, AuthOutcome::Cancelled);

        // No lockout: the next attempt still reaches the prompt.
        let outcome = gate.authenticate_at(T0 + 1_000, &prompt, "load", true).unwrap();
        assert_eq!(outcome, AuthOutcome::Cancelled);
        assert_eq!(prompt.times_shown(), 2);
    }

    #[test]
    fn test_failure_backoff_locks_out() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        let prompt = ScriptedPrompt::always(AuthOutcome::Failed);

        gate.authenticate_at(T0, &prompt, "load", true).unwrap();

        // First failure: 2s backoff (1 << 1). Whole seconds remaining are
        // floored, never rounded up, with a floor of 1.
        let result = gate.authenticate_at(T0 + 500, &prompt, "load", true);
        match result {
            Err(VaultError::LockedOut { retry_after_secs }) => assert_eq!(retry_after_secs, 1),
            other => panic!("expected LockedOut, got {other:?}"),
        }
        let result = gate.authenticate_at(T0 + 1_999, &prompt, "load", true);
        match result {
            Err(VaultError::LockedOut { retry_after_secs }) => assert_eq!(retry_after_secs, 1),
            other => panic!("expected LockedOut, got {other:?}"),
        }

        // After the backoff expires the prompt shows again.
        gate.authenticate_at(T0 + 3_000, &prompt, "load", true).unwrap();
        assert_eq!(prompt.times_shown(), 2);
    }

    #[test]
    fn test_sliding_window_rate_limit() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        // Cancellations carry no backoff, so only the window limits them.
        let prompt = ScriptedPrompt::always(AuthOutcome::Cancelled);

        for i in 0..5 {
            gate.authenticate_at(T0 + i * 1_000, &prompt, "load", true).unwrap();
        }
        assert_eq!(prompt.times_shown(), 5);

        // 6th attempt inside the minute: rejected before any prompt.
        let result = gate.authenticate_at(T0 + 5_500, &prompt, "load", true);
        assert!(matches!(result, Err(VaultError::RateLimited { .. })));
        assert_eq!(prompt.times_shown(), 5);
    }

    #[test]
    fn test_window_resets_after_a_minute() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        let prompt = ScriptedPrompt::always(AuthOutcome::Cancelled);

        for i in 0..5 {
            gate.authenticate_at(T0 + i * 1_000, &prompt, "load", true).unwrap();
        }
        // Past the window: counting starts over.
        gate.authenticate_at(T0 + 70_000, &prompt, "load", true).unwrap();
        assert_eq!(prompt.times_shown(), 6);
    }

    #[test]
    fn test_self_destruct_after_ten_failures() {
        let root = tempdir().unwrap();
        let (gate, storage) = make_gate(&root);
        let prompt = ScriptedPrompt::always(AuthOutcome::Failed);

        let _ = storage.current_alias(T0);
        storage.save("precious", b"document");
        assert_eq!(storage.list().len(), 1);

        // Space the failures out so neither lockout nor the window blocks
        // them; every failure must come from a real prompt interaction.
        let mut now = T0;
        let mut result = Ok(AuthOutcome::Failed);
        for _ in 0..10 {
            now += 70_000;
            result = gate.authenticate_at(now, &prompt, "load", true);
        }

        assert!(matches!(result, Err(VaultError::SelfDestructTriggered)));
        assert!(storage.list().is_empty());
        assert!(!gate.is_session_valid(now));

        let log = TextLog::new(root.path().join("biometric_access_log.txt"));
        assert!(log
            .read_lines()
            .iter()
            .any(|l| l.contains("SELF_DESTRUCT_WIPE")));
    }

    #[test]
    fn test_success_resets_failure_counter() {
        let root = tempdir().unwrap();
        let (gate, _) = make_gate(&root);
        let prompt = ScriptedPrompt::new(vec![
            AuthOutcome::Failed,
            AuthOutcome::Success,
            AuthOutcome::Failed,
        ]);
        // pop() order: Failed, Success, Failed

        let mut now = T0;
        gate.authenticate_at(now, &prompt, "load", true).unwrap(); // Failed
        now += 70_000;
        gate.authenticate_at(now, &prompt, "load", true).unwrap(); // Success
        gate.clear_session();
        now += 70_000;
        gate.authenticate_at(now, &prompt, "load", true).unwrap(); // Failed again

        // Back to a first-failure backoff of 2s, proving the reset.
        let result = gate.authenticate_at(now + 100, &prompt, "load", true);
        match result {
            Err(VaultError::LockedOut { retry_after_secs }) => assert_eq!(retry_after_secs, 1),
            other => panic!("expected LockedOut, got {other:?}"),
        }
    }

    #[test]
    fn test_backoff_curve() {
        assert_eq!(compute_backoff_ms(0), 1_000);
        assert_eq!(compute_backoff_ms(1), 2_000);
        assert_eq!(compute_backoff_ms(3), 8_000);
        assert_eq!(compute_backoff_ms(6), 60_000);
        assert_eq!(compute_backoff_ms(50), 60_000);
    }
}
