//! One run of the handler, from trigger event to committed community.
//!
//! Stages run strictly in order: extract, connect, settle, snapshot,
//! filter, ASN, build, reconcile. Any stage may end the run early; the
//! device session is closed on every path that opened one.

use std::fmt;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::audit::AuditLog;
use crate::community::CommunityDescriptor;
use crate::config::RunConfig;
use crate::context::resolve_asn;
use crate::device::{Connector, Device};
use crate::error::HandlerResult;
use crate::event::{InterfaceHandle, TriggerEvent};
use crate::filter::{self, ScopeDecision, ScopeReason};
use crate::reconciler::{CommitPolicy, ReconcileOutcome, Reconciler};
use crate::speed::resolve_bandwidth;

/// Default pause between connecting and trusting the reported speed.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How a run ended when no fatal error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Committed(CommunityDescriptor),
    /// The interface is not managed by this handler; nothing was written.
    OutOfScope(ScopeReason),
    /// Unit 0 carries several descriptions; nothing was written.
    Ambiguous { count: usize },
    LoadFailed {
        descriptor: CommunityDescriptor,
        message: String,
    },
    CommitFailed {
        descriptor: CommunityDescriptor,
        message: String,
    },
}

impl RunOutcome {
    /// True when the run ended as intended, with or without a write.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Committed(_) | RunOutcome::OutOfScope(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Committed(descriptor) => write!(f, "committed {}", descriptor),
            RunOutcome::OutOfScope(reason) => write!(f, "out of scope: {}", reason),
            RunOutcome::Ambiguous { count } => {
                write!(f, "ambiguous: {} unit 0 descriptions", count)
            }
            RunOutcome::LoadFailed { descriptor, message } => {
                write!(f, "load of {} failed: {}", descriptor.name, message)
            }
            RunOutcome::CommitFailed { descriptor, message } => {
                write!(f, "commit of {} failed: {}", descriptor.name, message)
            }
        }
    }
}

pub struct Pipeline<'a, C: Connector> {
    config: &'a RunConfig,
    connector: &'a C,
    audit: AuditLog<'a>,
    settle_delay: Duration,
    commit_policy: CommitPolicy,
}

impl<'a, C: Connector> Pipeline<'a, C> {
    pub fn new(config: &'a RunConfig, connector: &'a C, audit: AuditLog<'a>) -> Self {
        Self {
            config,
            connector,
            audit,
            settle_delay: DEFAULT_SETTLE_DELAY,
            commit_policy: CommitPolicy::default(),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_commit_policy(mut self, commit_policy: CommitPolicy) -> Self {
        self.commit_policy = commit_policy;
        self
    }

    /// Runs every stage for `event`.
    ///
    /// Fatal conditions are returned as errors after being reported to the
    /// audit sink; expected early exits come back as a [`RunOutcome`].
    #[instrument(skip_all, fields(facility = %event.facility))]
    pub async fn run(&self, event: &TriggerEvent) -> HandlerResult<RunOutcome> {
        if self.config.prefix_defaulted {
            self.audit
                .error(1, "BW Community prefix is not valid. Using default.")
                .await;
        }

        let handle = match event.interface_handle() {
            Ok(handle) => handle,
            Err(e) => {
                self.audit
                    .error_always(1, "COULD NOT RETRIEVE AE NAME FROM EVENT")
                    .await;
                return Err(e);
            }
        };
        self.audit.notify(&format!("Executed for AE {}", handle)).await;
        self.audit
            .debug(
                1,
                &format!("Connecting to device and retrieving speed of {}", handle),
            )
            .await;

        let mut device = match self.connector.connect().await {
            Ok(device) => device,
            Err(e) => {
                self.audit
                    .error_always(1, &format!("Unable to connect to device: {}", e))
                    .await;
                return Err(e);
            }
        };
        self.audit.debug(1, "Connection successful").await;

        let result = self.run_connected(&mut device, &handle).await;
        // Close is idempotent, the reconciler may already have closed it.
        if let Err(e) = device.close().await {
            warn!(error = %e, "Device close failed");
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.audit.error_always(1, &e.to_string()).await;
                return Err(e);
            }
        };

        info!(interface = %handle, %outcome, "Run finished");
        Ok(outcome)
    }

    async fn run_connected(
        &self,
        device: &mut C::Device,
        handle: &InterfaceHandle,
    ) -> HandlerResult<RunOutcome> {
        self.audit
            .debug(
                1,
                &format!("Sleeping {} ms", self.settle_delay.as_millis()),
            )
            .await;
        tokio::time::sleep(self.settle_delay).await;

        self.audit
            .debug(1, &format!("Retrieving aggregate {} information", handle))
            .await;
        let snapshot = device.interface_snapshot(handle).await?;
        let bandwidth = resolve_bandwidth(&snapshot);
        self.audit
            .debug(1, &format!("Interface {} speed is {}", handle, bandwidth))
            .await;

        if snapshot.unit0_descriptions.is_empty() {
            self.audit
                .error(
                    1,
                    &format!(
                        "Interface {} has no description under unit 0. Trying the IFD.",
                        handle
                    ),
                )
                .await;
        }

        let description = match filter::evaluate(&snapshot, self.config) {
            ScopeDecision::Proceed {
                description,
                source,
            } => {
                self.audit
                    .debug(
                        1,
                        &format!("Interface {} {} has description:{}", handle, source, description),
                    )
                    .await;
                description
            }
            ScopeDecision::OutOfScope(reason) => {
                match &reason {
                    ScopeReason::NoDescription => {
                        self.audit
                            .error(
                                1,
                                &format!(
                                    "Interface {} IFD has no description either. Exiting without changes.",
                                    handle
                                ),
                            )
                            .await;
                    }
                    ScopeReason::NoMatch { description } => {
                        self.audit
                            .debug(
                                1,
                                &format!(
                                    "Not interested in AE >{}< Description >{}< Regex>{}<",
                                    handle, description, self.config.description_pattern
                                ),
                            )
                            .await;
                    }
                }
                return Ok(RunOutcome::OutOfScope(reason));
            }
            ScopeDecision::Ambiguous { count } => {
                self.audit
                    .error_always(
                        1,
                        &format!(
                            "Interface {} has {} descriptions under unit 0. Refusing to act.",
                            handle, count
                        ),
                    )
                    .await;
                return Ok(RunOutcome::Ambiguous { count });
            }
        };
        self.audit
            .debug(
                1,
                &format!(
                    "Aggregate Speed:{} and aggregate description:{}. I'm interested in it.",
                    bandwidth, description
                ),
            )
            .await;

        let asn = resolve_asn(device).await?;
        self.audit.debug(1, &format!("Our AS is:{}", asn)).await;
        self.audit
            .debug(1, "All information retrieved. Building configuration.")
            .await;

        let descriptor =
            CommunityDescriptor::build(&self.config.community_prefix, handle, &asn, bandwidth);
        let fragment = descriptor.to_fragment();

        let reconciliation = Reconciler::new(self.audit, self.commit_policy, self.config.max_attempts)
            .reconcile(device, &fragment)
            .await;

        Ok(match reconciliation.outcome {
            ReconcileOutcome::Done => RunOutcome::Committed(descriptor),
            ReconcileOutcome::LoadFailed { message } => RunOutcome::LoadFailed {
                descriptor,
                message,
            },
            ReconcileOutcome::CommitFailed { message } => RunOutcome::CommitFailed {
                descriptor,
                message,
            },
        })
    }
}
