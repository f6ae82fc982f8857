//! Locating or installing the `yq` binary.
//!
//! Resolution order: configured path, `PATH` lookup, previously downloaded
//! copy in the install directory, fresh download from the release page.

use std::{
	env, fs,
	path::{Path, PathBuf},
};

use phf::phf_map;
use thiserror::Error;
use tracing::instrument;

pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com/mikefarah/yq/releases/latest/download";

/// Rust `target_arch` to the architecture suffix of yq release assets.
static ARCHITECTURES: phf::Map<&'static str, &'static str> = phf_map! {
	"x86_64" => "amd64",
	"x86" => "386",
	"aarch64" => "arm64",
	"arm" => "arm",
	"powerpc64" => "ppc64",
	"s390x" => "s390x",
	"riscv64" => "riscv64",
	"mips" => "mips",
	"mips64" => "mips64",
};

/// Rust `target_os` to the OS part of yq release assets.
static OPERATING_SYSTEMS: phf::Map<&'static str, &'static str> = phf_map! {
	"linux" => "linux",
	"macos" => "darwin",
	"windows" => "windows",
	"freebsd" => "freebsd",
	"openbsd" => "openbsd",
	"netbsd" => "netbsd",
};

#[derive(Debug, Error)]
pub enum BootstrapError {
	#[error("yq has no release for {os}/{arch}")]
	UnsupportedPlatform { os: String, arch: String },

	#[error("configured yq binary {} does not exist", .0.display())]
	MissingConfigured(PathBuf),

	#[error("downloading {url}")]
	Download {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("installing yq into {}", path.display())]
	Install {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Name of the release asset for a platform, e.g. `yq_linux_amd64`.
pub fn asset_name(os: &str, arch: &str) -> Result<String, BootstrapError> {
	let unsupported = || BootstrapError::UnsupportedPlatform {
		os: os.to_string(),
		arch: arch.to_string(),
	};
	let os_part = OPERATING_SYSTEMS.get(os).ok_or_else(unsupported)?;
	let arch_part = ARCHITECTURES.get(arch).ok_or_else(unsupported)?;
	let extension = if os == "windows" { ".exe" } else { "" };
	Ok(format!("yq_{os_part}_{arch_part}{extension}"))
}

fn binary_name() -> &'static str {
	if cfg!(windows) {
		"yq.exe"
	} else {
		"yq"
	}
}

fn find_in_path(name: &str) -> Option<PathBuf> {
	let path = env::var_os("PATH")?;
	env::split_paths(&path)
		.map(|dir| dir.join(name))
		.find(|candidate| candidate.is_file())
}

#[derive(Debug, Clone)]
pub struct YqBootstrap {
	configured: Option<PathBuf>,
	install_dir: PathBuf,
	download_base: String,
	search_path: bool,
}

impl YqBootstrap {
	pub fn new(
		configured: Option<PathBuf>,
		install_dir: Option<PathBuf>,
		download_base: Option<String>,
	) -> Self {
		Self {
			configured,
			install_dir: install_dir.unwrap_or_else(env::temp_dir),
			download_base: download_base.unwrap_or_else(|| DEFAULT_DOWNLOAD_BASE.to_string()),
			search_path: true,
		}
	}

	/// Skip the `PATH` lookup.
	#[must_use]
	pub fn without_path_search(mut self) -> Self {
		self.search_path = false;
		self
	}

	fn installed_path(&self) -> PathBuf {
		self.install_dir.join(binary_name())
	}

	/// Path of a usable `yq`, downloading it if needed.
	#[instrument(skip(self))]
	pub async fn resolve(&self) -> Result<PathBuf, BootstrapError> {
		if let Some(configured) = &self.configured {
			if !configured.is_file() {
				return Err(BootstrapError::MissingConfigured(configured.clone()));
			}
			return Ok(configured.clone());
		}
		if self.search_path {
			if let Some(found) = find_in_path(binary_name()) {
				tracing::debug!(path = %found.display(), "using yq from PATH");
				return Ok(found);
			}
		}
		let installed = self.installed_path();
		if installed.is_file() {
			tracing::debug!(path = %installed.display(), "using previously installed yq");
			return Ok(installed);
		}
		self.download(env::consts::OS, env::consts::ARCH).await
	}

	/// Download the release asset for `os`/`arch` into the install directory.
	#[instrument(skip(self))]
	pub async fn download(&self, os: &str, arch: &str) -> Result<PathBuf, BootstrapError> {
		let url = format!(
			"{}/{}",
			self.download_base.trim_end_matches('/'),
			asset_name(os, arch)?
		);
		tracing::info!(%url, "downloading yq");

		let download_error = |source| BootstrapError::Download {
			url: url.clone(),
			source,
		};
		let bytes = reqwest::get(&url)
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(download_error)?
			.bytes()
			.await
			.map_err(download_error)?;

		let target = self.installed_path();
		install(&target, &bytes).map_err(|source| BootstrapError::Install {
			path: target.clone(),
			source,
		})?;
		Ok(target)
	}
}

/// Write through a temporary name so a partial download is never picked up.
fn install(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
	if let Some(dir) = target.parent() {
		fs::create_dir_all(dir)?;
	}
	let partial = target.with_extension("partial");
	fs::write(&partial, bytes)?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		fs::set_permissions(&partial, fs::Permissions::from_mode(0o755))?;
	}
	fs::rename(&partial, target)
}
