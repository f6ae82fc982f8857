//! Secrets command handler.
//!
//! Lists the Secrets a Deployment references, without changing anything.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use super::{CommonArgs, TargetArgs};
use crate::clone::{inspect, CloneOptions, SecretReferenceSite};

#[derive(Args, Debug)]
pub struct SecretsArgs {
	#[command(flatten)]
	pub target: TargetArgs,

	#[command(flatten)]
	pub common: CommonArgs,
}

/// Run the secrets command.
pub fn run<W: Write>(args: SecretsArgs, writer: W) -> Result<()> {
	super::runtime()?.block_on(run_async(args, writer))
}

async fn run_async<W: Write>(args: SecretsArgs, mut writer: W) -> Result<()> {
	let workload = args.target.workload()?;
	let config = super::load_config(args.common.config.as_deref())?;
	let options = CloneOptions {
		editor: super::editor_backend(args.common.editor, &config).await?,
		scratch_dir: config.scratch_dir.clone(),
		..CloneOptions::default()
	};
	let cluster = super::connect(&args.common, &config, None).await?;

	let sites = inspect(&cluster, &options, &workload)
		.await
		.with_context(|| format!("listing secrets of {workload}"))?;

	write_sites(&mut writer, &sites)?;
	writer.flush()?;
	Ok(())
}

/// One `<secret>\t<site>` line per reference.
pub fn write_sites<W: Write>(writer: &mut W, sites: &[SecretReferenceSite]) -> std::io::Result<()> {
	for site in sites {
		writeln!(writer, "{}\t{}", site.secret_name, site.kind)?;
	}
	Ok(())
}
