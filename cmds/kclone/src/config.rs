//! Configuration file support for kclone
//!
//! Supports `.kclone.yaml` files anywhere in the directory hierarchy. kclone
//! searches from the current directory upward to the filesystem root.
//! Command-line flags take precedence over file values.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;

use crate::{
	clone::{rekey::DEFAULT_ENV_BLOB_KEY, SecretLayout},
	cluster::apply::ApplyStrategy,
	editor::EditorKind,
};

/// The name of the config file kclone looks for
pub const CONFIG_FILE_NAME: &str = ".kclone.yaml";

/// Field manager recorded on every write.
pub const DEFAULT_FIELD_MANAGER: &str = "kclone";

/// Root configuration structure for .kclone.yaml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KcloneConfig {
	/// Appended to the source name to build the name of the copy.
	pub suffix: Option<String>,

	/// Label kept equal to the deployment name in the selector and pod template.
	pub label_key: Option<String>,

	/// Remove liveness and readiness probes from the copy.
	#[serde(default)]
	pub strip_probes: bool,

	/// Separator between `key=value` pairs of `--secret`.
	pub override_separator: Option<String>,

	pub secret_layout: Option<SecretLayoutKind>,

	/// Data key holding the env file when `secretLayout` is `envBlob`.
	pub env_blob_key: Option<String>,

	/// Directory for the scratch file. Defaults to the system temp directory.
	pub scratch_dir: Option<PathBuf>,

	pub editor: Option<EditorKind>,

	#[serde(default)]
	pub yq: YqConfig,

	pub apply_strategy: Option<ApplyStrategy>,

	pub field_manager: Option<String>,

	/// Kubeconfig context to use.
	pub context: Option<String>,
}

/// Where the `yq` binary comes from when the yq editor is selected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YqConfig {
	/// Use this binary instead of searching for one.
	pub path: Option<PathBuf>,

	/// Download target. Defaults to the system temp directory.
	pub install_dir: Option<PathBuf>,

	/// Base URL of the release assets.
	pub download_base: Option<String>,
}

/// How Secrets store their values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecretLayoutKind {
	/// One data entry per key.
	#[default]
	Keys,
	/// A single env file entry.
	EnvBlob,
}

impl KcloneConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: KcloneConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		tracing::debug!(path = %path.display(), "loaded config file");
		Ok(config)
	}

	/// Secret layout, `layout` overriding the file value.
	pub fn secret_layout(&self, layout: Option<SecretLayoutKind>) -> SecretLayout {
		match layout.or(self.secret_layout).unwrap_or_default() {
			SecretLayoutKind::Keys => SecretLayout::Keys,
			SecretLayoutKind::EnvBlob => SecretLayout::EnvBlob {
				key: self
					.env_blob_key
					.clone()
					.unwrap_or_else(|| DEFAULT_ENV_BLOB_KEY.to_string()),
			},
		}
	}

	pub fn field_manager(&self) -> &str {
		self.field_manager.as_deref().unwrap_or(DEFAULT_FIELD_MANAGER)
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	// Canonicalize if possible to handle relative paths
	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.is_file() {
			return Some(config_path);
		}
		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => return None,
		}
	}
}
