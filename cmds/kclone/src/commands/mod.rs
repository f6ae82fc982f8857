use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use k8s::WorkloadRef;

use crate::{
	cluster::{api::KubeCluster, apply::ApplyStrategy, client::ClusterConnection},
	config::KcloneConfig,
	editor::{bootstrap::YqBootstrap, EditorBackend, EditorKind},
};

pub mod clone;
pub mod secrets;
pub mod util;

/// The Deployment a command works on.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
	/// Namespace of the source deployment
	#[arg(short = 'n', long, default_value = "namespace-test")]
	pub namespace: String,

	/// Name of the source deployment
	#[arg(short = 'd', long, default_value = "deployment-test")]
	pub deployment: String,
}

impl TargetArgs {
	pub fn workload(&self) -> Result<WorkloadRef> {
		WorkloadRef::new(&self.namespace, &self.deployment).with_context(|| {
			format!(
				"invalid deployment reference `{}/{}`",
				self.namespace, self.deployment
			)
		})
	}
}

/// Options for reaching the cluster and editing documents.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
	/// Kubeconfig context to use. Defaults to the current context
	#[arg(long)]
	pub context: Option<String>,

	/// Document editor backend
	#[arg(long, value_enum)]
	pub editor: Option<EditorKind>,

	/// Config file to use instead of searching for .kclone.yaml
	#[arg(long)]
	pub config: Option<PathBuf>,
}

/// Load the explicit config file, or search upward from the working directory.
pub fn load_config(explicit: Option<&Path>) -> Result<KcloneConfig> {
	if let Some(path) = explicit {
		return KcloneConfig::load_from_file(path);
	}
	let cwd = std::env::current_dir().context("getting current directory")?;
	Ok(KcloneConfig::load_from_directory(&cwd)?.unwrap_or_default())
}

/// Resolve the editor backend, installing yq when it is selected.
pub async fn editor_backend(
	kind: Option<EditorKind>,
	config: &KcloneConfig,
) -> Result<EditorBackend> {
	match kind.or(config.editor).unwrap_or_default() {
		EditorKind::Native => Ok(EditorBackend::Native),
		EditorKind::Yq => {
			let bootstrap = YqBootstrap::new(
				config.yq.path.clone(),
				config.yq.install_dir.clone(),
				config.yq.download_base.clone(),
			);
			let binary = bootstrap.resolve().await.context("locating yq")?;
			tracing::debug!(binary = %binary.display(), "using yq editor");
			Ok(EditorBackend::Yq { binary })
		}
	}
}

/// Connect to the cluster named by the flags or the config file.
pub async fn connect(
	common: &CommonArgs,
	config: &KcloneConfig,
	strategy: Option<ApplyStrategy>,
) -> Result<KubeCluster> {
	let context = common.context.as_deref().or(config.context.as_deref());
	let connection = ClusterConnection::connect(context)
		.await
		.context("connecting to cluster")?;
	tracing::info!(cluster = connection.cluster_identifier(), "connected");

	let strategy = strategy.or(config.apply_strategy).unwrap_or_default();
	Ok(KubeCluster::new(connection, strategy, config.field_manager()))
}

/// Current-thread runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
	tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")
}
