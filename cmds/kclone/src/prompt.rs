//! Interactive questions.

use std::{
	collections::VecDeque,
	io::{self, BufRead, Write},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
	#[error("reading the answer")]
	Io(#[from] io::Error),

	#[error("input closed before an answer was given")]
	Closed,

	#[error("no answer left for `{0}`")]
	Exhausted(String),
}

pub trait Prompt {
	/// Ask `question`, returning the answer without the trailing newline.
	fn ask(&mut self, question: &str) -> Result<String, PromptError>;
}

/// Asks on stderr, reads the answer from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
	fn ask(&mut self, question: &str) -> Result<String, PromptError> {
		let mut stderr = io::stderr().lock();
		write!(stderr, "{question} ")?;
		stderr.flush()?;

		let mut line = String::new();
		if io::stdin().lock().read_line(&mut line)? == 0 {
			return Err(PromptError::Closed);
		}
		Ok(line.trim_end_matches(['\r', '\n']).to_string())
	}
}

/// Answers from a fixed list, recording every question asked.
///
/// Used for `--disambiguator` and in tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
	answers: VecDeque<String>,
	asked: Vec<String>,
}

impl ScriptedPrompt {
	pub fn new<I, S>(answers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			answers: answers.into_iter().map(Into::into).collect(),
			asked: Vec::new(),
		}
	}

	pub fn asked(&self) -> &[String] {
		&self.asked
	}
}

impl Prompt for ScriptedPrompt {
	fn ask(&mut self, question: &str) -> Result<String, PromptError> {
		self.asked.push(question.to_string());
		self.answers
			.pop_front()
			.ok_or_else(|| PromptError::Exhausted(question.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;

	use super::*;

	#[test]
	fn test_scripted_prompt_records_questions() {
		let mut prompt = ScriptedPrompt::new(["one"]);
		assert_eq!(prompt.ask("first?").unwrap(), "one");
		assert_matches!(prompt.ask("second?"), Err(PromptError::Exhausted(q)) if q == "second?");
		assert_eq!(prompt.asked(), ["first?", "second?"]);
	}
}
