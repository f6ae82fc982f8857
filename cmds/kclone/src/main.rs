use anyhow::Result;
use clap::{Parser, Subcommand};
use kclone::{
	commands::{self, util::BrokenPipeGuard},
	telemetry::{self, LogFormat},
};

#[derive(Parser)]
#[command(name = "kclone")]
#[command(about = "Duplicate a Deployment for debugging", long_about = None)]
#[command(version = env!("KCLONE_VERSION"))]
struct Cli {
	/// Log level. Defaults to RUST_LOG, then info
	#[arg(long, global = true)]
	log_level: Option<tracing::Level>,

	/// Log line format on stderr
	#[arg(long, global = true, value_enum, default_value_t = LogFormat::Auto)]
	log_format: LogFormat,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Clone a deployment as a single-replica debug copy
	Clone(commands::clone::CloneArgs),

	/// List the secrets a deployment references
	Secrets(commands::secrets::SecretsArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let _telemetry = telemetry::init(cli.log_level, cli.log_format)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::Clone(args) => commands::clone::run(args, stdout),
		Commands::Secrets(args) => commands::secrets::run(args, stdout),
	}
}
