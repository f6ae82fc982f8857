//! Kubernetes object names.

use std::fmt;

use thiserror::Error;

/// Maximum length of a DNS-1123 subdomain (most object names).
pub const MAX_SUBDOMAIN_LEN: usize = 253;

/// Maximum length of a DNS-1123 label (namespace names).
pub const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameError {
	#[error("name must not be empty")]
	Empty,

	#[error("name `{name}` is {len} characters long, at most {max} are allowed")]
	TooLong { name: String, len: usize, max: usize },

	#[error("name `{name}` contains invalid character `{ch}`")]
	InvalidCharacter { name: String, ch: char },

	#[error("name `{name}` must start and end with a lowercase letter or digit")]
	InvalidBoundary { name: String },
}

fn validate(name: &str, max: usize, allow_dots: bool) -> Result<(), NameError> {
	if name.is_empty() {
		return Err(NameError::Empty);
	}
	if name.len() > max {
		return Err(NameError::TooLong {
			name: name.to_string(),
			len: name.len(),
			max,
		});
	}
	if let Some(ch) = name.chars().find(|&c| {
		!(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || (allow_dots && c == '.'))
	}) {
		return Err(NameError::InvalidCharacter {
			name: name.to_string(),
			ch,
		});
	}
	let boundary_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
	if !boundary_ok(name.chars().next()) || !boundary_ok(name.chars().last()) {
		return Err(NameError::InvalidBoundary {
			name: name.to_string(),
		});
	}
	Ok(())
}

/// Validate a DNS-1123 subdomain, as used by Deployment and Secret names.
pub fn validate_subdomain(name: &str) -> Result<(), NameError> {
	validate(name, MAX_SUBDOMAIN_LEN, true)
}

/// Validate a DNS-1123 label, as used by namespace names.
pub fn validate_label(name: &str) -> Result<(), NameError> {
	validate(name, MAX_LABEL_LEN, false)
}

/// Validate a label value. Values may be empty, otherwise they hold at most
/// 63 alphanumerics, `-`, `_` or `.`, starting and ending with an alphanumeric.
pub fn validate_label_value(value: &str) -> Result<(), NameError> {
	if value.is_empty() {
		return Ok(());
	}
	if value.len() > MAX_LABEL_LEN {
		return Err(NameError::TooLong {
			name: value.to_string(),
			len: value.len(),
			max: MAX_LABEL_LEN,
		});
	}
	if let Some(ch) = value
		.chars()
		.find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
	{
		return Err(NameError::InvalidCharacter {
			name: value.to_string(),
			ch,
		});
	}
	let boundary_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
	if !boundary_ok(value.chars().next()) || !boundary_ok(value.chars().last()) {
		return Err(NameError::InvalidBoundary {
			name: value.to_string(),
		});
	}
	Ok(())
}

/// A namespaced object reference with validated parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadRef {
	namespace: String,
	name: String,
}

impl WorkloadRef {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, NameError> {
		let namespace = namespace.into();
		let name = name.into();
		validate_label(&namespace)?;
		validate_subdomain(&name)?;
		Ok(Self { namespace, name })
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Same namespace, different name.
	pub fn with_name(&self, name: impl Into<String>) -> Result<Self, NameError> {
		Self::new(self.namespace.clone(), name)
	}
}

impl fmt::Display for WorkloadRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}
