use std::fmt;

use k8s::NameError;
use thiserror::Error;

use super::{naming::NamingError, rekey::RekeyError, scratch::ScratchError, transform::TransformError};
use crate::{cluster::ClusterError, editor::EditorError};

/// The category of a failed clone, independent of its cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
	NotFound,
	NameCollision,
	InvalidName,
	Fetch,
	Transform,
	Rekey,
	Apply,
	Scratch,
	Prompt,
}

impl fmt::Display for FailureKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			FailureKind::NotFound => "not found",
			FailureKind::NameCollision => "name collision",
			FailureKind::InvalidName => "invalid name",
			FailureKind::Fetch => "fetch failed",
			FailureKind::Transform => "transform failed",
			FailureKind::Rekey => "secret rekeying failed",
			FailureKind::Apply => "apply failed",
			FailureKind::Scratch => "scratch file error",
			FailureKind::Prompt => "prompt failed",
		})
	}
}

#[derive(Debug, Error)]
pub enum CloneError {
	#[error("invalid name")]
	InvalidName(#[from] NameError),

	#[error("namespace `{0}` not found")]
	NamespaceNotFound(String),

	#[error("deployment `{name}` not found in namespace `{namespace}`")]
	DeploymentNotFound { name: String, namespace: String },

	#[error("looking up `{name}`")]
	Lookup {
		name: String,
		#[source]
		source: ClusterError,
	},

	#[error("choosing a name for the copy")]
	Naming(#[from] NamingError),

	#[error("fetching deployment `{name}`")]
	Fetch {
		name: String,
		#[source]
		source: ClusterError,
	},

	#[error("preparing the scratch file")]
	Scratch(#[from] ScratchError),

	#[error("transforming the deployment")]
	Transform(#[from] TransformError),

	#[error("discovering referenced secrets")]
	Discovery(#[source] EditorError),

	#[error("rekeying secrets")]
	Rekey(#[from] RekeyError),

	#[error("applying deployment `{name}`")]
	Apply {
		name: String,
		#[source]
		source: ClusterError,
	},
}

impl CloneError {
	pub fn kind(&self) -> FailureKind {
		match self {
			CloneError::InvalidName(_) => FailureKind::InvalidName,
			CloneError::NamespaceNotFound(_) | CloneError::DeploymentNotFound { .. } => {
				FailureKind::NotFound
			}
			CloneError::Lookup { .. } | CloneError::Fetch { .. } => FailureKind::Fetch,
			CloneError::Naming(err) => match err {
				NamingError::EmptyAnswer | NamingError::InvalidName { .. } => {
					FailureKind::InvalidName
				}
				NamingError::Collision { .. } => FailureKind::NameCollision,
				NamingError::Prompt(_) => FailureKind::Prompt,
				NamingError::Cluster(_) => FailureKind::Fetch,
			},
			CloneError::Scratch(_) => FailureKind::Scratch,
			CloneError::Transform(_) => FailureKind::Transform,
			CloneError::Discovery(_) | CloneError::Rekey(_) => FailureKind::Rekey,
			CloneError::Apply { .. } => FailureKind::Apply,
		}
	}
}
