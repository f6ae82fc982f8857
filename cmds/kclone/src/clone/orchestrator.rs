//! Sequencing of a clone operation.

use std::{fmt, path::PathBuf};

use k8s::{Document, WorkloadRef};
use tracing::instrument;

use super::{
	discovery::{self, SecretReferenceSite},
	error::{CloneError, FailureKind},
	naming,
	rekey::{self, RekeyPlan, SecretLayout},
	request::CloneRequest,
	scratch::ScratchFile,
	transform::{self, TransformOptions, DEFAULT_LABEL_KEY},
};
use crate::{
	cluster::{ClusterClient, ClusterError, ResourceKind},
	editor::{DocumentEditor, EditorBackend},
	prompt::Prompt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Validating,
	Naming,
	Extracting,
	Transforming,
	RekeyingSecrets,
	Applying,
	CleaningUp,
	Done,
	Failed(FailureKind),
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Stage::Validating => write!(f, "validating"),
			Stage::Naming => write!(f, "naming"),
			Stage::Extracting => write!(f, "extracting"),
			Stage::Transforming => write!(f, "transforming"),
			Stage::RekeyingSecrets => write!(f, "rekeying-secrets"),
			Stage::Applying => write!(f, "applying"),
			Stage::CleaningUp => write!(f, "cleaning-up"),
			Stage::Done => write!(f, "done"),
			Stage::Failed(kind) => write!(f, "failed ({kind})"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	/// No secret overrides were given.
	NotRequested,
	/// The Deployment references no Secrets.
	NoSecretsFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RekeyOutcome {
	Rekeyed,
	Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneReport {
	pub target: WorkloadRef,
	pub secrets: Vec<RekeyPlan>,
	pub rekey: RekeyOutcome,
}

/// Policy that does not vary per request.
#[derive(Debug, Clone)]
pub struct CloneOptions {
	pub label_key: String,
	pub strip_probes: bool,
	pub secret_layout: SecretLayout,
	pub scratch_dir: Option<PathBuf>,
	pub editor: EditorBackend,
}

impl Default for CloneOptions {
	fn default() -> Self {
		Self {
			label_key: DEFAULT_LABEL_KEY.to_string(),
			strip_probes: false,
			secret_layout: SecretLayout::default(),
			scratch_dir: None,
			editor: EditorBackend::Native,
		}
	}
}

pub struct Orchestrator<'a, C> {
	cluster: &'a C,
	options: &'a CloneOptions,
	stage: Stage,
}

impl<'a, C: ClusterClient> Orchestrator<'a, C> {
	pub fn new(cluster: &'a C, options: &'a CloneOptions) -> Self {
		Self {
			cluster,
			options,
			stage: Stage::Validating,
		}
	}

	pub fn stage(&self) -> Stage {
		self.stage
	}

	fn enter(&mut self, stage: Stage) {
		tracing::info!(stage = %stage, "entering stage");
		self.stage = stage;
	}

	/// Run the whole operation. The scratch file is gone when this returns.
	#[instrument(skip_all, fields(source = %request.source))]
	pub async fn run(
		&mut self,
		request: &CloneRequest,
		prompt: &mut dyn Prompt,
	) -> Result<CloneReport, CloneError> {
		match self.execute(request, prompt).await {
			Ok(report) => {
				self.enter(Stage::Done);
				Ok(report)
			}
			Err(err) => {
				let kind = err.kind();
				tracing::error!(stage = %self.stage, %kind, "clone failed");
				self.stage = Stage::Failed(kind);
				Err(err)
			}
		}
	}

	async fn execute(
		&mut self,
		request: &CloneRequest,
		prompt: &mut dyn Prompt,
	) -> Result<CloneReport, CloneError> {
		let source = &request.source;

		self.enter(Stage::Validating);
		self.validate(source).await?;

		self.enter(Stage::Naming);
		let target = naming::resolve(self.cluster, prompt, source, &request.suffix).await?;
		tracing::info!(target = %target, "chose name for the copy");

		self.enter(Stage::Extracting);
		let scratch = ScratchFile::create(self.options.scratch_dir.as_deref())?;
		let doc = self
			.cluster
			.get_document(ResourceKind::Deployment, source.name(), source.namespace())
			.await
			.map_err(|source_err| CloneError::Fetch {
				name: source.name().to_string(),
				source: source_err,
			})?;
		scratch.write_document(&doc)?;
		let editor = self.options.editor.build(scratch.path());
		let editor = editor.as_dyn();

		self.enter(Stage::Transforming);
		let doc = transform::transform(
			editor,
			doc,
			&TransformOptions {
				new_name: target.name(),
				label_key: &self.options.label_key,
				image_tag: request.image_tag.as_deref(),
				strip_probes: self.options.strip_probes,
			},
		)?;

		let (doc, secrets, outcome) = if request.secret_overrides.is_empty() {
			tracing::info!("no secret overrides given, keeping the original secrets");
			(doc, Vec::new(), RekeyOutcome::Skipped(SkipReason::NotRequested))
		} else {
			self.enter(Stage::RekeyingSecrets);
			self.rekey_secrets(editor, doc, request, &target).await?
		};

		self.enter(Stage::Applying);
		self.cluster
			.apply(ResourceKind::Deployment, &doc, target.namespace())
			.await
			.map_err(|source| CloneError::Apply {
				name: target.name().to_string(),
				source,
			})?;

		self.enter(Stage::CleaningUp);
		if let Err(err) = scratch.close() {
			tracing::warn!(error = %err, "failed to remove the scratch file");
		}

		Ok(CloneReport {
			target,
			secrets,
			rekey: outcome,
		})
	}

	async fn validate(&self, source: &WorkloadRef) -> Result<(), CloneError> {
		let lookup = |name: &str, source: ClusterError| CloneError::Lookup {
			name: name.to_string(),
			source,
		};

		if !self
			.cluster
			.namespace_exists(source.namespace())
			.await
			.map_err(|e| lookup(source.namespace(), e))?
		{
			return Err(CloneError::NamespaceNotFound(source.namespace().to_string()));
		}
		if !self
			.cluster
			.resource_exists(ResourceKind::Deployment, source.name(), source.namespace())
			.await
			.map_err(|e| lookup(source.name(), e))?
		{
			return Err(CloneError::DeploymentNotFound {
				name: source.name().to_string(),
				namespace: source.namespace().to_string(),
			});
		}
		Ok(())
	}

	/// Clone every referenced Secret, then rewrite the references.
	///
	/// The Deployment is only rewritten once every Secret copy exists.
	async fn rekey_secrets(
		&self,
		editor: &dyn DocumentEditor,
		doc: Document,
		request: &CloneRequest,
		target: &WorkloadRef,
	) -> Result<(Document, Vec<RekeyPlan>, RekeyOutcome), CloneError> {
		let names = discovery::discover(editor, &doc).map_err(CloneError::Discovery)?;
		if names.is_empty() {
			tracing::warn!("secret overrides given but the deployment references no secrets");
			return Ok((
				doc,
				Vec::new(),
				RekeyOutcome::Skipped(SkipReason::NoSecretsFound),
			));
		}

		let plans = rekey::plan_all(&names, target.name())?;
		for plan in &plans {
			rekey::rekey(
				self.cluster,
				editor,
				target.namespace(),
				plan,
				&request.secret_overrides,
				&self.options.secret_layout,
			)
			.await?;
		}

		let doc = rekey::rewrite_references(editor, doc, &plans)?;
		Ok((doc, plans, RekeyOutcome::Rekeyed))
	}
}

/// Fetch `workload` and list its Secret references.
#[instrument(skip(cluster, options), fields(workload = %workload))]
pub async fn inspect<C: ClusterClient>(
	cluster: &C,
	options: &CloneOptions,
	workload: &WorkloadRef,
) -> Result<Vec<SecretReferenceSite>, CloneError> {
	let doc = cluster
		.get_document(ResourceKind::Deployment, workload.name(), workload.namespace())
		.await
		.map_err(|source| CloneError::Fetch {
			name: workload.name().to_string(),
			source,
		})?;

	let scratch = ScratchFile::create(options.scratch_dir.as_deref())?;
	scratch.write_document(&doc)?;
	let editor = options.editor.build(scratch.path());
	discovery::reference_sites(editor.as_dyn(), &doc).map_err(CloneError::Discovery)
}
