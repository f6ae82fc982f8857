//! Shared Kubernetes manifest utilities.
//!
//! Manifests are kept as owned [`serde_json::Value`] trees wrapped in
//! [`Document`]. Fields are addressed with a small yq-compatible [`Path`]
//! language, so the same path strings work for the in-process editor in
//! [`edit`] and for an external `yq` binary.

pub mod document;
pub mod edit;
pub mod name;
pub mod path;

pub use document::{Document, DocumentError};
pub use edit::{EditError, FieldEquals};
pub use name::{NameError, WorkloadRef};
pub use path::{Path, PathError, Segment};
