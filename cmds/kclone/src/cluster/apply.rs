//! Create-or-update of manifests.
//!
//! Client-side apply patches with a strategic merge and creates the object
//! when it does not exist yet. Server-side apply sends the whole manifest with
//! our field manager.

use std::fmt;

use clap::ValueEnum;
use kube::{
	api::{Api, DynamicObject, Patch, PatchParams, PostParams},
	discovery::ApiResource,
	Client,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use super::ResourceKind;

/// Apply strategy for resource updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStrategy {
	/// Client-side apply using PATCH with strategic merge.
	#[default]
	Client,

	/// Server-side apply using PATCH with Apply.
	Server,
}

impl fmt::Display for ApplyStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ApplyStrategy::Client => write!(f, "client"),
			ApplyStrategy::Server => write!(f, "server"),
		}
	}
}

/// Errors that can occur during apply operations.
#[derive(Debug, Error)]
pub enum ApplyError {
	#[error("manifest missing metadata.name")]
	MissingName,

	#[error("applying {kind}/{name}")]
	ApplyFailed {
		kind: ResourceKind,
		name: String,
		#[source]
		source: Box<kube::Error>,
	},

	#[error("converting manifest to DynamicObject")]
	ManifestConversion(#[source] serde_json::Error),
}

/// The kube `ApiResource` for a kind, without a discovery round-trip.
pub fn api_resource(kind: ResourceKind) -> ApiResource {
	use k8s_openapi::api::{apps::v1::Deployment, core::v1::Secret};

	match kind {
		ResourceKind::Deployment => ApiResource::erase::<Deployment>(&()),
		ResourceKind::Secret => ApiResource::erase::<Secret>(&()),
	}
}

/// Engine for applying resources to a Kubernetes cluster.
pub struct ApplyEngine {
	client: Client,
	strategy: ApplyStrategy,
	field_manager: String,
}

impl ApplyEngine {
	pub fn new(client: Client, strategy: ApplyStrategy, field_manager: impl Into<String>) -> Self {
		Self {
			client,
			strategy,
			field_manager: field_manager.into(),
		}
	}

	/// Apply a single manifest to the cluster.
	#[instrument(skip(self, manifest), fields(
		name = manifest.pointer("/metadata/name").and_then(|v| v.as_str()).unwrap_or("unknown"),
		strategy = %self.strategy,
	))]
	pub async fn apply_manifest(
		&self,
		kind: ResourceKind,
		manifest: &serde_json::Value,
		namespace: &str,
	) -> Result<(), ApplyError> {
		let name = manifest
			.pointer("/metadata/name")
			.and_then(|v| v.as_str())
			.ok_or(ApplyError::MissingName)?
			.to_string();

		let api: Api<DynamicObject> =
			Api::namespaced_with(self.client.clone(), namespace, &api_resource(kind));
		let failed = |source: kube::Error| ApplyError::ApplyFailed {
			kind,
			name: name.clone(),
			source: Box::new(source),
		};

		if self.strategy == ApplyStrategy::Server {
			let params = PatchParams::apply(&self.field_manager).force();
			api.patch(&name, &params, &Patch::Apply(manifest))
				.await
				.map_err(failed)?;
			return Ok(());
		}

		let params = PatchParams {
			field_manager: Some(self.field_manager.clone()),
			..Default::default()
		};

		match api.patch(&name, &params, &Patch::Strategic(manifest)).await {
			Ok(_) => {}
			Err(kube::Error::Api(ref err)) if err.code == 415 => {
				// UnsupportedMediaType: fall back to a JSON merge patch
				api.patch(&name, &params, &Patch::Merge(manifest))
					.await
					.map_err(failed)?;
			}
			Err(kube::Error::Api(ref err)) if err.code == 404 => {
				tracing::debug!("object does not exist yet, creating it");
				let obj: DynamicObject = serde_json::from_value(manifest.clone())
					.map_err(ApplyError::ManifestConversion)?;
				let post = PostParams {
					field_manager: Some(self.field_manager.clone()),
					..Default::default()
				};
				api.create(&post, &obj).await.map_err(failed)?;
			}
			Err(e) => return Err(failed(e)),
		}

		Ok(())
	}
}
