//! Field paths inside a manifest.
//!
//! The accepted syntax is the subset of yq path expressions needed to address
//! fields of a Kubernetes object:
//!
//! - `.` is the document root
//! - `.metadata.name` descends into mapping keys
//! - `.data["secrets.env"]` addresses keys that are not plain identifiers
//! - `.spec.containers[0]` selects a sequence element
//! - `.spec.containers[]` selects every element of a sequence
//!
//! [`Path`] implements [`std::fmt::Display`] producing the canonical form,
//! which is a valid yq expression.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// A single step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
	/// Mapping key.
	Key(String),
	/// Sequence element at the given position.
	Index(usize),
	/// Every element of a sequence (or every value of a mapping).
	Each,
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
	segments: Vec<Segment>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid path `{path}` at offset {offset}: {reason}")]
pub struct PathError {
	pub path: String,
	pub offset: usize,
	pub reason: &'static str,
}

impl Path {
	/// The document root.
	pub fn root() -> Self {
		Self::default()
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	/// Append a mapping key.
	#[must_use]
	pub fn key(mut self, key: impl Into<String>) -> Self {
		self.segments.push(Segment::Key(key.into()));
		self
	}

	/// Parse a path, panicking on invalid input.
	///
	/// Meant for compile-time constant paths.
	pub fn must(path: &str) -> Self {
		match path.parse() {
			Ok(path) => path,
			Err(e) => panic!("{e}"),
		}
	}
}

fn is_plain_key(key: &str) -> bool {
	!key.is_empty()
		&& key
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for Path {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.segments.is_empty() {
			return f.write_str(".");
		}
		for segment in &self.segments {
			match segment {
				Segment::Key(key) if is_plain_key(key) => write!(f, ".{key}")?,
				Segment::Key(key) => {
					let escaped = key.replace('\\', "\\\\").replace('"', "\\\"");
					write!(f, "[\"{escaped}\"]")?;
				}
				Segment::Index(index) => write!(f, "[{index}]")?,
				Segment::Each => f.write_str("[]")?,
			}
		}
		Ok(())
	}
}

struct Parser<'a> {
	input: &'a str,
	chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
	fn new(input: &'a str) -> Self {
		Self {
			input,
			chars: input.char_indices().peekable(),
		}
	}

	fn error(&self, offset: usize, reason: &'static str) -> PathError {
		PathError {
			path: self.input.to_string(),
			offset,
			reason,
		}
	}

	fn offset(&mut self) -> usize {
		self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
	}

	fn parse(mut self) -> Result<Path, PathError> {
		let mut segments = Vec::new();

		match self.chars.next() {
			Some((_, '.')) => {}
			Some((i, _)) => return Err(self.error(i, "path must start with `.`")),
			None => return Err(self.error(0, "path is empty")),
		}

		// `.` alone, or `.[...]` directly after the root
		if self.chars.peek().is_none() {
			return Ok(Path { segments });
		}
		if matches!(self.chars.peek(), Some((_, '['))) {
			self.chars.next();
			segments.push(self.bracket()?);
		} else {
			segments.push(self.identifier()?);
		}

		while let Some(&(i, c)) = self.chars.peek() {
			match c {
				'.' => {
					self.chars.next();
					if matches!(self.chars.peek(), Some((_, '['))) {
						self.chars.next();
						segments.push(self.bracket()?);
					} else {
						segments.push(self.identifier()?);
					}
				}
				'[' => {
					self.chars.next();
					segments.push(self.bracket()?);
				}
				_ => return Err(self.error(i, "expected `.` or `[`")),
			}
		}

		Ok(Path { segments })
	}

	fn identifier(&mut self) -> Result<Segment, PathError> {
		let start = self.offset();
		let mut key = String::new();
		while let Some(&(_, c)) = self.chars.peek() {
			if c == '.' || c == '[' {
				break;
			}
			if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
				let offset = self.offset();
				return Err(self.error(offset, "unexpected character in key"));
			}
			key.push(c);
			self.chars.next();
		}
		if key.is_empty() {
			return Err(self.error(start, "empty key"));
		}
		Ok(Segment::Key(key))
	}

	/// Parse the inside of `[...]`, the opening bracket already consumed.
	fn bracket(&mut self) -> Result<Segment, PathError> {
		let start = self.offset();
		let segment = match self.chars.peek().map(|(_, c)| *c) {
			Some(']') => Segment::Each,
			Some('"') => {
				self.chars.next();
				Segment::Key(self.quoted()?)
			}
			Some(c) if c.is_ascii_digit() => {
				let mut digits = String::new();
				while let Some(&(_, c)) = self.chars.peek() {
					if !c.is_ascii_digit() {
						break;
					}
					digits.push(c);
					self.chars.next();
				}
				let index = digits
					.parse()
					.map_err(|_| self.error(start, "index out of range"))?;
				Segment::Index(index)
			}
			Some(_) => return Err(self.error(start, "expected index, `\"` or `]`")),
			None => return Err(self.error(start, "unterminated `[`")),
		};
		match self.chars.next() {
			Some((_, ']')) => Ok(segment),
			Some((i, _)) => Err(self.error(i, "expected `]`")),
			None => Err(self.error(self.input.len(), "unterminated `[`")),
		}
	}

	/// Parse a quoted key, the opening quote already consumed.
	fn quoted(&mut self) -> Result<String, PathError> {
		let start = self.offset();
		let mut key = String::new();
		loop {
			match self.chars.next() {
				Some((_, '"')) => return Ok(key),
				Some((i, '\\')) => match self.chars.next() {
					Some((_, c @ ('"' | '\\'))) => key.push(c),
					_ => return Err(self.error(i, "invalid escape")),
				},
				Some((_, c)) => key.push(c),
				None => return Err(self.error(start, "unterminated string")),
			}
		}
	}
}

impl FromStr for Path {
	type Err = PathError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Parser::new(s).parse()
	}
}
