//! Utilities for command handlers.

use std::io::{self, ErrorKind, Write};

/// Writer that treats a closed reader as a successful write.
///
/// `kclone secrets | head -1` exits cleanly instead of failing with EPIPE.
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

fn ignore_broken_pipe<T>(result: io::Result<T>, fallback: T) -> io::Result<T> {
	match result {
		Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(fallback),
		other => other,
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		ignore_broken_pipe(self.inner.write(buf), buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		ignore_broken_pipe(self.inner.flush(), ())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct ClosedPipe;

	impl Write for ClosedPipe {
		fn write(&mut self, _: &[u8]) -> io::Result<usize> {
			Err(io::Error::from(ErrorKind::BrokenPipe))
		}

		fn flush(&mut self) -> io::Result<()> {
			Err(io::Error::from(ErrorKind::BrokenPipe))
		}
	}

	struct Full;

	impl Write for Full {
		fn write(&mut self, _: &[u8]) -> io::Result<usize> {
			Err(io::Error::from(ErrorKind::WriteZero))
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn test_broken_pipe_is_swallowed() {
		let mut guard = BrokenPipeGuard::new(ClosedPipe);
		writeln!(guard, "hello").unwrap();
		guard.flush().unwrap();
	}

	#[test]
	fn test_other_errors_propagate() {
		let mut guard = BrokenPipeGuard::new(Full);
		assert!(writeln!(guard, "hello").is_err());
	}
}
