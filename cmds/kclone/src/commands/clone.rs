//! Clone command handler.
//!
//! Duplicates a Deployment as a single-replica debug copy in the same
//! namespace, cloning the Secrets it references when overrides are given.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use super::{CommonArgs, TargetArgs};
use crate::{
	clone::{
		request::{DEFAULT_SEPARATOR, DEFAULT_SUFFIX},
		transform::DEFAULT_LABEL_KEY,
		CloneOptions, CloneReport, CloneRequest, Orchestrator, RekeyOutcome, SecretOverrides,
		SkipReason,
	},
	cluster::apply::ApplyStrategy,
	config::{KcloneConfig, SecretLayoutKind},
	prompt::{Prompt, ScriptedPrompt, StdinPrompt},
};

#[derive(Args, Debug)]
pub struct CloneArgs {
	#[command(flatten)]
	pub target: TargetArgs,

	/// Image tag for the first container of the copy
	#[arg(short = 't', long)]
	pub tag: Option<String>,

	/// Secret overrides as key=value pairs joined by ';'. May be repeated
	#[arg(short = 's', long = "secret")]
	pub secrets: Vec<String>,

	/// Remove liveness and readiness probes from the copy
	#[arg(long)]
	pub strip_probes: bool,

	/// Suffix appended to the deployment name [default: -test-debug]
	#[arg(long)]
	pub suffix: Option<String>,

	/// Label kept equal to the deployment name [default: app]
	#[arg(long)]
	pub label_key: Option<String>,

	/// How the referenced Secrets store their values
	#[arg(long, value_enum)]
	pub secret_layout: Option<SecretLayoutKind>,

	/// Answer for the name collision prompt, for non-interactive use
	#[arg(long)]
	pub disambiguator: Option<String>,

	/// Force the apply strategy to use
	#[arg(long, value_enum)]
	pub apply_strategy: Option<ApplyStrategy>,

	#[command(flatten)]
	pub common: CommonArgs,
}

/// Run the clone command.
pub fn run<W: Write>(args: CloneArgs, writer: W) -> Result<()> {
	super::runtime()?.block_on(run_async(args, writer))
}

async fn run_async<W: Write>(args: CloneArgs, mut writer: W) -> Result<()> {
	let config = super::load_config(args.common.config.as_deref())?;
	let request = build_request(&args, &config)?;
	let options = CloneOptions {
		editor: super::editor_backend(args.common.editor, &config).await?,
		..clone_options(&args, &config)
	};
	let cluster = super::connect(&args.common, &config, args.apply_strategy).await?;

	let mut prompt: Box<dyn Prompt> = match &args.disambiguator {
		Some(answer) => Box::new(ScriptedPrompt::new([answer.clone()])),
		None => Box::new(StdinPrompt),
	};

	let report = Orchestrator::new(&cluster, &options)
		.run(&request, prompt.as_mut())
		.await
		.with_context(|| format!("cloning deployment {}", request.source))?;

	write_report(&mut writer, &report)?;
	writer.flush()?;
	Ok(())
}

/// Combine flags and config into the request. Flags win.
pub fn build_request(args: &CloneArgs, config: &KcloneConfig) -> Result<CloneRequest> {
	let separator = config
		.override_separator
		.as_deref()
		.unwrap_or(DEFAULT_SEPARATOR);
	let overrides = SecretOverrides::parse(args.secrets.iter().map(String::as_str), separator)
		.context("parsing --secret")?;
	let suffix = args
		.suffix
		.as_deref()
		.or(config.suffix.as_deref())
		.unwrap_or(DEFAULT_SUFFIX);

	Ok(CloneRequest::new(args.target.workload()?)
		.with_suffix(suffix)
		.with_image_tag(args.tag.clone())
		.with_overrides(overrides))
}

/// Policy from flags and config, with the native editor.
pub fn clone_options(args: &CloneArgs, config: &KcloneConfig) -> CloneOptions {
	CloneOptions {
		label_key: args
			.label_key
			.clone()
			.or_else(|| config.label_key.clone())
			.unwrap_or_else(|| DEFAULT_LABEL_KEY.to_string()),
		strip_probes: args.strip_probes || config.strip_probes,
		secret_layout: config.secret_layout(args.secret_layout),
		scratch_dir: config.scratch_dir.clone(),
		..CloneOptions::default()
	}
}

pub fn write_report<W: Write>(writer: &mut W, report: &CloneReport) -> std::io::Result<()> {
	writeln!(
		writer,
		"Deployment successfully duplicated as '{}' in namespace '{}'.",
		report.target.name(),
		report.target.namespace()
	)?;
	for plan in &report.secrets {
		writeln!(
			writer,
			"Secret '{}' cloned as '{}'.",
			plan.old_secret_name, plan.new_secret_name
		)?;
	}
	if report.rekey == RekeyOutcome::Skipped(SkipReason::NoSecretsFound) {
		writeln!(
			writer,
			"No secrets are referenced by the deployment, secret overrides were not applied."
		)?;
	}
	Ok(())
}
