//! The clone operation: naming, transforming, secret rekeying, and the
//! orchestrator that sequences them.

pub mod discovery;
mod error;
pub mod naming;
pub mod orchestrator;
pub mod rekey;
pub mod request;
pub mod scratch;
pub mod transform;

pub use discovery::{discover, reference_sites, SecretReferenceSite, SiteKind};
pub use error::{CloneError, FailureKind};
pub use orchestrator::{
	inspect, CloneOptions, CloneReport, Orchestrator, RekeyOutcome, SkipReason, Stage,
};
pub use rekey::{RekeyPlan, SecretLayout};
pub use request::{CloneRequest, OverrideError, SecretOverrides};
