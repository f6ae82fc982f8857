//! Cluster access.
//!
//! The clone pipeline only talks to the cluster through [`ClusterClient`].
//! [`api::KubeCluster`] implements it on top of kube-rs.

use std::fmt;

use k8s::Document;
use thiserror::Error;

pub mod api;
pub mod apply;
pub mod client;

/// Resource kinds the tool reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
	Deployment,
	Secret,
}

impl ResourceKind {
	pub fn as_str(self) -> &'static str {
		match self {
			ResourceKind::Deployment => "Deployment",
			ResourceKind::Secret => "Secret",
		}
	}

	pub fn api_version(self) -> &'static str {
		match self {
			ResourceKind::Deployment => "apps/v1",
			ResourceKind::Secret => "v1",
		}
	}
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
pub enum ClusterError {
	#[error("{kind} `{name}` not found in namespace `{namespace}`")]
	NotFound {
		kind: ResourceKind,
		name: String,
		namespace: String,
	},

	#[error("the API server rejected the request for `{name}` ({code}): {message}")]
	Rejected {
		name: String,
		code: u16,
		message: String,
	},

	#[error("requesting `{name}` from the API server")]
	Transport {
		name: String,
		#[source]
		source: Box<kube::Error>,
	},

	#[error("decoding `{name}`")]
	Decode {
		name: String,
		#[source]
		source: serde_json::Error,
	},

	#[error(transparent)]
	Apply(#[from] apply::ApplyError),
}

impl ClusterError {
	/// Map a kube error for the object `name`.
	pub fn from_kube(name: &str, error: kube::Error) -> Self {
		match error {
			kube::Error::Api(ref status) => ClusterError::Rejected {
				name: name.to_string(),
				code: status.code,
				message: status.message.clone(),
			},
			other => ClusterError::Transport {
				name: name.to_string(),
				source: Box::new(other),
			},
		}
	}
}

/// Operations the clone pipeline needs from a cluster.
///
/// A missing object is never an error for the existence checks.
#[allow(async_fn_in_trait)]
pub trait ClusterClient {
	async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError>;

	async fn resource_exists(
		&self,
		kind: ResourceKind,
		name: &str,
		namespace: &str,
	) -> Result<bool, ClusterError>;

	/// Fetch an object as a manifest document.
	async fn get_document(
		&self,
		kind: ResourceKind,
		name: &str,
		namespace: &str,
	) -> Result<Document, ClusterError>;

	/// Create the object, or update it if it already exists.
	async fn apply(
		&self,
		kind: ResourceKind,
		document: &Document,
		namespace: &str,
	) -> Result<(), ClusterError>;
}
