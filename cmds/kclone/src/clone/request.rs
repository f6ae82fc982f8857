use k8s::WorkloadRef;
use thiserror::Error;

pub const DEFAULT_SUFFIX: &str = "-test-debug";
pub const DEFAULT_SEPARATOR: &str = ";";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverrideError {
	#[error("secret override `{0}` is missing `=`")]
	MissingEquals(String),

	#[error("secret override `{0}` has an empty key")]
	EmptyKey(String),

	#[error("secret override key `{0}` is given more than once")]
	DuplicateKey(String),

	#[error("override separator must not be empty")]
	EmptySeparator,
}

/// Key/value pairs merged into every cloned Secret, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretOverrides {
	entries: Vec<(String, String)>,
}

impl SecretOverrides {
	/// Parse every input as `k=v` pairs joined by `separator`.
	pub fn parse<'a>(
		inputs: impl IntoIterator<Item = &'a str>,
		separator: &str,
	) -> Result<Self, OverrideError> {
		if separator.is_empty() {
			return Err(OverrideError::EmptySeparator);
		}
		let mut overrides = Self::default();
		for segment in inputs.into_iter().flat_map(|input| input.split(separator)) {
			if segment.is_empty() {
				continue;
			}
			let (key, value) = segment
				.split_once('=')
				.ok_or_else(|| OverrideError::MissingEquals(segment.to_string()))?;
			if key.is_empty() {
				return Err(OverrideError::EmptyKey(segment.to_string()));
			}
			overrides.insert(key, value)?;
		}
		Ok(overrides)
	}

	pub fn insert(&mut self, key: &str, value: &str) -> Result<(), OverrideError> {
		if self.get(key).is_some() {
			return Err(OverrideError::DuplicateKey(key.to_string()));
		}
		self.entries.push((key.to_string(), value.to_string()));
		Ok(())
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// Everything one clone operation needs to know, fixed before it starts.
#[derive(Debug, Clone)]
pub struct CloneRequest {
	pub source: WorkloadRef,
	pub suffix: String,
	pub image_tag: Option<String>,
	pub secret_overrides: SecretOverrides,
}

impl CloneRequest {
	pub fn new(source: WorkloadRef) -> Self {
		Self {
			source,
			suffix: DEFAULT_SUFFIX.to_string(),
			image_tag: None,
			secret_overrides: SecretOverrides::default(),
		}
	}

	#[must_use]
	pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.suffix = suffix.into();
		self
	}

	#[must_use]
	pub fn with_image_tag(mut self, tag: Option<String>) -> Self {
		self.image_tag = tag;
		self
	}

	#[must_use]
	pub fn with_overrides(mut self, overrides: SecretOverrides) -> Self {
		self.secret_overrides = overrides;
		self
	}
}
