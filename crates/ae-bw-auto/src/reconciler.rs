//! Load-and-commit state machine.
//!
//! `Idle -> Loading -> Committing -> {Done, LoadFailed, CommitFailed}`.
//! The fragment is a full replace, so a failed run never leaves a partial
//! community behind: either the commit lands or the candidate is dropped.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::audit::AuditLog;
use crate::community::ConfigFragment;
use crate::device::Device;
use crate::error::HandlerError;

/// What to do when a commit is refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitPolicy {
    /// One load and one commit; any failure ends the run.
    #[default]
    SingleAttempt,
    /// Repeat load+commit after `backoff` while the refusal is lock
    /// contention and attempts remain.
    RetryOnContention { backoff: Duration },
}

/// Where the state machine currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReconcileState {
    Idle,
    Loading,
    Committing,
    Done,
    LoadFailed,
    CommitFailed,
}

/// Terminal result of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Done,
    LoadFailed { message: String },
    CommitFailed { message: String },
}

impl From<&ReconcileOutcome> for ReconcileState {
    fn from(outcome: &ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Done => ReconcileState::Done,
            ReconcileOutcome::LoadFailed { .. } => ReconcileState::LoadFailed,
            ReconcileOutcome::CommitFailed { .. } => ReconcileState::CommitFailed,
        }
    }
}

/// Terminal outcome and the number of load attempts made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub outcome: ReconcileOutcome,
    pub attempts: u32,
}

pub struct Reconciler<'a> {
    audit: AuditLog<'a>,
    policy: CommitPolicy,
    max_attempts: u32,
    state: ReconcileState,
}

impl<'a> Reconciler<'a> {
    pub fn new(audit: AuditLog<'a>, policy: CommitPolicy, max_attempts: u32) -> Self {
        Self {
            audit,
            policy,
            max_attempts: max_attempts.max(1),
            state: ReconcileState::Idle,
        }
    }

    fn transition(&mut self, next: ReconcileState, attempt: u32) {
        debug!(from = ?self.state, to = ?next, attempt, "Reconciler state change");
        self.state = next;
    }

    /// Drives `fragment` to a terminal state.
    ///
    /// On failure the database is unlocked and the device closed before
    /// returning. On success the caller still owns closing the device.
    #[instrument(skip_all, fields(community = %fragment.community_name()))]
    pub async fn reconcile<D: Device + ?Sized>(
        mut self,
        device: &mut D,
        fragment: &ConfigFragment,
    ) -> Reconciliation {
        self.audit
            .debug(
                1,
                &format!(
                    "Entering wait loop. Wait time to commit (if db is locked) is:{}",
                    self.max_attempts
                ),
            )
            .await;

        let mut attempt = 1;
        loop {
            self.transition(ReconcileState::Loading, attempt);
            self.audit.debug(attempt, "Loading configuration changes").await;
            if let Err(e) = device.load_replace(fragment).await {
                let message = e.to_string();
                self.audit
                    .error_always(attempt, &format!("Unable to load configuration: {}", message))
                    .await;
                self.release(device, attempt).await;
                return self.finish(ReconcileOutcome::LoadFailed { message }, attempt);
            }

            self.transition(ReconcileState::Committing, attempt);
            self.audit.debug(attempt, "Committing the configuration").await;
            let err = match device.commit().await {
                Ok(()) => {
                    info!(attempt, "Configuration committed");
                    return self.finish(ReconcileOutcome::Done, attempt);
                }
                Err(e) => e,
            };

            if let Some(backoff) = self.retry_backoff(&err, attempt) {
                self.audit
                    .error(
                        attempt,
                        &format!("Commit refused ({}). Retrying in {}ms", err, backoff.as_millis()),
                    )
                    .await;
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let message = commit_error_text(err);
            self.audit
                .error_always(
                    attempt,
                    &format!(
                        "Unable to commit configuration ({}). Unlocking the configuration",
                        message
                    ),
                )
                .await;
            self.release(device, attempt).await;
            return self.finish(ReconcileOutcome::CommitFailed { message }, attempt);
        }
    }

    fn retry_backoff(&self, err: &HandlerError, attempt: u32) -> Option<Duration> {
        match self.policy {
            CommitPolicy::RetryOnContention { backoff }
                if err.is_contention() && attempt < self.max_attempts =>
            {
                Some(backoff)
            }
            _ => None,
        }
    }

    async fn release<D: Device + ?Sized>(&self, device: &mut D, attempt: u32) {
        if let Err(e) = device.unlock().await {
            warn!(error = %e, "Unlock failed");
            self.audit.error(attempt, "Unable to unlock configuration").await;
        }
        if let Err(e) = device.close().await {
            warn!(error = %e, "Close failed");
        }
    }

    fn finish(mut self, outcome: ReconcileOutcome, attempts: u32) -> Reconciliation {
        self.transition(ReconcileState::from(&outcome), attempts);
        Reconciliation { outcome, attempts }
    }
}

/// The device's own text for a refused commit.
fn commit_error_text(err: HandlerError) -> String {
    match err {
        HandlerError::CommitRejected { message } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::CommunityDescriptor;
    use crate::context::AsNumber;
    use crate::device::InterfaceSnapshot;
    use crate::error::HandlerResult;
    use crate::event::{extract_interface, InterfaceHandle};
    use crate::speed::BandwidthValue;
    use async_trait::async_trait;
    use junos_script_common::{MemorySink, SyslogPriority};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedDevice {
        load_errors: VecDeque<String>,
        commit_errors: VecDeque<String>,
        unlock_fails: bool,
        loads: u32,
        commits: u32,
        unlocks: u32,
        closes: u32,
    }

    #[async_trait]
    impl Device for ScriptedDevice {
        async fn interface_snapshot(
            &mut self,
            _handle: &InterfaceHandle,
        ) -> HandlerResult<InterfaceSnapshot> {
            Ok(InterfaceSnapshot::default())
        }

        async fn autonomous_system(&mut self) -> HandlerResult<Option<String>> {
            Ok(None)
        }

        async fn load_replace(&mut self, _fragment: &ConfigFragment) -> HandlerResult<()> {
            self.loads += 1;
            match self.load_errors.pop_front() {
                Some(message) => Err(HandlerError::LoadRejected { message }),
                None => Ok(()),
            }
        }

        async fn commit(&mut self) -> HandlerResult<()> {
            self.commits += 1;
            match self.commit_errors.pop_front() {
                Some(message) => Err(HandlerError::CommitRejected { message }),
                None => Ok(()),
            }
        }

        async fn unlock(&mut self) -> HandlerResult<()> {
            self.unlocks += 1;
            if self.unlock_fails {
                Err(HandlerError::UnlockFailed {
                    message: "not locked".to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn close(&mut self) -> HandlerResult<()> {
            self.closes += 1;
            Ok(())
        }
    }

    fn fragment() -> ConfigFragment {
        CommunityDescriptor::build(
            "bw_community_",
            &extract_interface("EVENT <Bandwidth> ae1 index 9").unwrap(),
            &AsNumber::parse("10001").unwrap(),
            BandwidthValue::from_speed("20Gbps"),
        )
        .to_fragment()
    }

    fn audit(sink: &MemorySink) -> AuditLog<'_> {
        AuditLog::new(sink, SyslogPriority::LOCAL5_WARNING, "monitor_ae_bw_auto", true)
    }

    #[test]
    fn test_outcome_maps_to_terminal_state() {
        assert_eq!(ReconcileState::from(&ReconcileOutcome::Done), ReconcileState::Done);
        assert_eq!(
            ReconcileState::from(&ReconcileOutcome::LoadFailed {
                message: "x".to_string()
            }),
            ReconcileState::LoadFailed
        );
        assert_eq!(
            ReconcileState::from(&ReconcileOutcome::CommitFailed {
                message: "x".to_string()
            }),
            ReconcileState::CommitFailed
        );
    }

    const LOCKED: &str = "configuration database locked by: admin";

    #[tokio::test]
    async fn test_commit_success() {
        let sink = MemorySink::new();
        let mut device = ScriptedDevice::default();
        let result = Reconciler::new(audit(&sink), CommitPolicy::SingleAttempt, 10)
            .reconcile(&mut device, &fragment())
            .await;

        assert_eq!(result.outcome, ReconcileOutcome::Done);
        assert_eq!(result.attempts, 1);
        assert_eq!((device.loads, device.commits, device.unlocks, device.closes), (1, 1, 0, 0));
        assert!(sink.contains("iteration 1:DEBUG: Entering wait loop. Wait time to commit (if db is locked) is:10"));
        assert!(sink.contains("iteration 1:DEBUG: Committing the configuration"));
    }

    #[tokio::test]
    async fn test_load_failure_releases() {
        let sink = MemorySink::new();
        let mut device = ScriptedDevice {
            load_errors: VecDeque::from(vec!["syntax error".to_string()]),
            ..Default::default()
        };
        let result = Reconciler::new(audit(&sink), CommitPolicy::SingleAttempt, 10)
            .reconcile(&mut device, &fragment())
            .await;

        assert!(matches!(result.outcome, ReconcileOutcome::LoadFailed { .. }));
        assert_eq!((device.loads, device.commits, device.unlocks, device.closes), (1, 0, 1, 1));
    }

    #[tokio::test]
    async fn test_single_attempt_ignores_wait_budget() {
        let sink = MemorySink::new();
        let mut device = ScriptedDevice {
            commit_errors: VecDeque::from(vec![LOCKED.to_string()]),
            ..Default::default()
        };
        let result = Reconciler::new(audit(&sink), CommitPolicy::SingleAttempt, 10)
            .reconcile(&mut device, &fragment())
            .await;

        assert_eq!(
            result.outcome,
            ReconcileOutcome::CommitFailed {
                message: LOCKED.to_string()
            }
        );
        assert_eq!(result.attempts, 1);
        assert_eq!((device.loads, device.commits, device.unlocks, device.closes), (1, 1, 1, 1));
        assert!(sink.contains("ERROR: Unable to commit configuration (configuration database locked by: admin). Unlocking the configuration"));
    }

    #[tokio::test]
    async fn test_retry_on_contention() {
        let sink = MemorySink::new();
        let mut device = ScriptedDevice {
            commit_errors: VecDeque::from(vec![LOCKED.to_string(), LOCKED.to_string()]),
            ..Default::default()
        };
        let policy = CommitPolicy::RetryOnContention {
            backoff: Duration::ZERO,
        };
        let result = Reconciler::new(audit(&sink), policy, 5)
            .reconcile(&mut device, &fragment())
            .await;

        assert_eq!(result.outcome, ReconcileOutcome::Done);
        assert_eq!(result.attempts, 3);
        assert_eq!((device.loads, device.commits, device.unlocks), (3, 3, 0));
        assert!(sink.contains("iteration 3:DEBUG: Loading configuration changes"));
    }

    #[tokio::test]
    async fn test_retry_bounded_by_attempts() {
        let sink = MemorySink::new();
        let mut device = ScriptedDevice {
            commit_errors: VecDeque::from(vec![LOCKED.to_string(); 5]),
            ..Default::default()
        };
        let policy = CommitPolicy::RetryOnContention {
            backoff: Duration::ZERO,
        };
        let result = Reconciler::new(audit(&sink), policy, 2)
            .reconcile(&mut device, &fragment())
            .await;

        assert!(matches!(result.outcome, ReconcileOutcome::CommitFailed { .. }));
        assert_eq!(result.attempts, 2);
        assert_eq!((device.commits, device.unlocks, device.closes), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_no_retry_on_other_commit_errors() {
        let sink = MemorySink::new();
        let mut device = ScriptedDevice {
            commit_errors: VecDeque::from(vec!["invalid community member".to_string()]),
            unlock_fails: true,
            ..Default::default()
        };
        let policy = CommitPolicy::RetryOnContention {
            backoff: Duration::ZERO,
        };
        let result = Reconciler::new(audit(&sink), policy, 5)
            .reconcile(&mut device, &fragment())
            .await;

        assert!(matches!(result.outcome, ReconcileOutcome::CommitFailed { .. }));
        assert_eq!(device.commits, 1);
        assert!(sink.contains("iteration 1:ERROR: Unable to unlock configuration"));
        assert_eq!(device.closes, 1);
    }
}
