//! Choosing the name of the copy.

use k8s::{name::validate_label_value, NameError, WorkloadRef};
use thiserror::Error;
use tracing::instrument;

use crate::{
	cluster::{ClusterClient, ClusterError, ResourceKind},
	prompt::{Prompt, PromptError},
};

#[derive(Debug, Error)]
pub enum NamingError {
	#[error("no disambiguator was given")]
	EmptyAnswer,

	#[error("`{name}` is not a valid deployment name")]
	InvalidName {
		name: String,
		#[source]
		source: NameError,
	},

	#[error("deployment `{name}` already exists in namespace `{namespace}`")]
	Collision { name: String, namespace: String },

	#[error("asking for a disambiguator")]
	Prompt(#[from] PromptError),

	#[error("checking whether the name is taken")]
	Cluster(#[from] ClusterError),
}

pub fn candidate_name(source: &str, suffix: &str) -> String {
	format!("{source}{suffix}")
}

pub fn disambiguated_name(source: &str, suffix: &str, extra: &str) -> String {
	format!("{source}{suffix}-{extra}")
}

/// The copy's name is also written as a selector label value, so it must
/// satisfy both rules.
fn target(source: &WorkloadRef, name: String) -> Result<WorkloadRef, NamingError> {
	validate_label_value(&name)
		.and_then(|()| source.with_name(name.clone()))
		.map_err(|source| NamingError::InvalidName { name, source })
}

/// Pick a free name for the copy of `source`.
///
/// The candidate is `<source><suffix>`. When it is taken the user is asked
/// once for an extra disambiguator. No cluster writes happen here.
#[instrument(skip(cluster, prompt), fields(source = %source))]
pub async fn resolve<C: ClusterClient>(
	cluster: &C,
	prompt: &mut dyn Prompt,
	source: &WorkloadRef,
	suffix: &str,
) -> Result<WorkloadRef, NamingError> {
	let candidate = target(source, candidate_name(source.name(), suffix))?;
	if !cluster
		.resource_exists(ResourceKind::Deployment, candidate.name(), candidate.namespace())
		.await?
	{
		return Ok(candidate);
	}

	tracing::info!(name = candidate.name(), "candidate name is taken");
	let answer = prompt.ask(&format!(
		"Deployment '{}' already exists in namespace '{}'. Enter a suffix to disambiguate:",
		candidate.name(),
		candidate.namespace()
	))?;
	let answer = answer.trim();
	if answer.is_empty() {
		return Err(NamingError::EmptyAnswer);
	}

	let retry = target(source, disambiguated_name(source.name(), suffix, answer))?;
	if cluster
		.resource_exists(ResourceKind::Deployment, retry.name(), retry.namespace())
		.await?
	{
		return Err(NamingError::Collision {
			name: retry.name().to_string(),
			namespace: retry.namespace().to_string(),
		});
	}
	Ok(retry)
}
