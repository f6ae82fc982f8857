//! Structured-document editing.
//!
//! The clone pipeline reads and mutates manifests through [`DocumentEditor`].
//! Paths use the syntax of [`k8s::Path`] regardless of the backend.

use std::path::{Path as FsPath, PathBuf};

use clap::ValueEnum;
use k8s::{Document, DocumentError, EditError, FieldEquals, PathError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub mod bootstrap;
pub mod native;
pub mod yq;

pub use native::NativeEditor;
pub use yq::YqEditor;

#[derive(Debug, Error)]
pub enum EditorError {
	#[error(transparent)]
	Path(#[from] PathError),

	#[error(transparent)]
	Edit(#[from] EditError),

	#[error(transparent)]
	Document(#[from] DocumentError),

	#[error("starting `{binary}`")]
	Spawn {
		binary: String,
		#[source]
		source: std::io::Error,
	},

	#[error("yq `{expression}` exited with {status}: {stderr}")]
	Failed {
		expression: String,
		status: std::process::ExitStatus,
		stderr: String,
	},

	#[error("accessing scratch file {}", path.display())]
	Scratch {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("decoding yq output")]
	Output(#[source] serde_json::Error),
}

/// Query and mutation operations on a manifest.
///
/// Mutating operations take the document by value and return the edited one.
pub trait DocumentEditor {
	/// Every non-null value at `path`.
	fn get_field(&self, doc: &Document, path: &str) -> Result<Vec<Value>, EditorError>;

	/// Delete every path in `paths`. Missing fields are ignored.
	fn delete_fields(&self, doc: Document, paths: &[&str]) -> Result<Document, EditorError>;

	/// Set `path` to `value`, creating intermediate mappings.
	fn set_field(&self, doc: Document, path: &str, value: Value)
		-> Result<Document, EditorError>;

	/// Set `field` on every element of `collection` matching `predicate`.
	fn set_field_where(
		&self,
		doc: Document,
		collection: &str,
		predicate: &FieldEquals,
		field: &str,
		value: Value,
	) -> Result<Document, EditorError>;

	/// First string at `path`, if any.
	fn get_str(&self, doc: &Document, path: &str) -> Result<Option<String>, EditorError> {
		Ok(self
			.get_field(doc, path)?
			.into_iter()
			.find_map(|v| v.as_str().map(str::to_string)))
	}
}

/// Editor backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
	/// In-process editing.
	#[default]
	Native,
	/// Shell out to the `yq` binary.
	Yq,
}

/// A resolved backend, ready to be bound to a scratch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorBackend {
	Native,
	Yq { binary: PathBuf },
}

impl EditorBackend {
	/// Build the editor. The yq backend exchanges documents through `scratch`.
	pub fn build(&self, scratch: &FsPath) -> Editor {
		match self {
			EditorBackend::Native => Editor::Native(NativeEditor),
			EditorBackend::Yq { binary } => {
				Editor::Yq(YqEditor::new(binary.clone(), scratch.to_path_buf()))
			}
		}
	}
}

pub enum Editor {
	Native(NativeEditor),
	Yq(YqEditor),
}

impl Editor {
	pub fn as_dyn(&self) -> &dyn DocumentEditor {
		match self {
			Editor::Native(editor) => editor,
			Editor::Yq(editor) => editor,
		}
	}
}
