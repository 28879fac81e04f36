//! Junos event handler that keeps a BGP link-bandwidth community in sync
//! with the speed of an aggregate Ethernet (`aeN`) interface.
//!
//! The event daemon runs the handler when the kernel logs a bandwidth
//! change on an AE. One run reads the new speed, decides from the
//! interface description whether the AE is managed, and replaces the
//! community `<prefix><aeN>` in the dynamic database with the single
//! member `bandwidth:<asn>:<value>`.
//!
//! # Stages
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Event extraction | [`event`] | [`InterfaceHandle`] |
//! | Speed resolution | [`speed`] | [`BandwidthValue`] |
//! | Interest filter | [`filter`] | [`ScopeDecision`] |
//! | Context resolution | [`context`] | [`AsNumber`] |
//! | Community build | [`community`] | [`ConfigFragment`] |
//! | Reconciliation | [`reconciler`] | [`ReconcileOutcome`] |
//!
//! # Example
//!
//! ```ignore
//! use ae_bw_auto::{AuditLog, JunosConnector, Pipeline, RunConfig, TriggerEvent, SCRIPT_NAME};
//!
//! let config = RunConfig::new(true, 10, "bw_community_", ".*fa[0-9]{2}.*")?;
//! let audit = AuditLog::new(&sink, priority, SCRIPT_NAME, config.debug);
//! let outcome = Pipeline::new(&config, &JunosConnector::default(), audit)
//!     .run(&TriggerEvent::new(message, "KERNEL"))
//!     .await?;
//! ```

pub mod audit;
pub mod community;
pub mod config;
pub mod config_file;
pub mod context;
pub mod device;
pub mod error;
pub mod event;
pub mod filter;
pub mod pipeline;
pub mod reconciler;
pub mod speed;

pub use audit::{AuditLog, LogKind};
pub use community::{CommunityDescriptor, ConfigFragment};
pub use config::{normalize_junos_args, Args, RunConfig, DEFAULT_COMMUNITY_PREFIX};
pub use config_file::{HandlerSettings, SCRIPT_NAME};
pub use context::{resolve_asn, AsNumber};
pub use device::{Connector, Device, InterfaceSnapshot, JunosConnector, JunosDevice};
pub use error::{HandlerError, HandlerResult};
pub use event::{extract_interface, InterfaceHandle, TriggerEvent};
pub use filter::{evaluate, DescriptionSource, ScopeDecision, ScopeReason};
pub use pipeline::{Pipeline, RunOutcome};
pub use reconciler::{CommitPolicy, ReconcileOutcome, Reconciler, Reconciliation};
pub use speed::{resolve_bandwidth, BandwidthValue};
