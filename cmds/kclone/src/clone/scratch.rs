//! The temporary file holding the document being edited.
//!
//! The file is deleted when the [`ScratchFile`] is dropped, whichever way
//! the clone operation ends.

use std::path::{Path, PathBuf};

use k8s::{Document, DocumentError};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchError {
	#[error("creating scratch file in {}", dir.display())]
	Create {
		dir: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("writing scratch file {}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Serialize(#[from] DocumentError),
}

pub struct ScratchFile {
	file: NamedTempFile,
}

impl ScratchFile {
	/// Create an empty scratch file in `dir`, or in the system temp directory.
	pub fn create(dir: Option<&Path>) -> Result<Self, ScratchError> {
		let dir = dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
		let file = tempfile::Builder::new()
			.prefix("kclone-")
			.suffix(".yaml")
			.tempfile_in(&dir)
			.map_err(|source| ScratchError::Create { dir, source })?;
		tracing::debug!(path = %file.path().display(), "created scratch file");
		Ok(Self { file })
	}

	pub fn path(&self) -> &Path {
		self.file.path()
	}

	pub fn write_document(&self, doc: &Document) -> Result<(), ScratchError> {
		std::fs::write(self.path(), doc.to_yaml()?).map_err(|source| ScratchError::Write {
			path: self.path().to_path_buf(),
			source,
		})
	}

	/// Delete the file now, reporting failures instead of ignoring them.
	pub fn close(self) -> std::io::Result<()> {
		self.file.close()
	}
}
