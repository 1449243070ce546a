use std::io::{self,BufRead,IsTerminal};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::Result;

/// Source of command lines. `Ok(None)` means end of input.
pub trait LineReader {
	fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

	/// Offers a line for in-editor recall.
	fn remember(&mut self, _line: &str) {}

	fn is_interactive(&self) -> bool;
}

pub struct Interactive {
	editor: DefaultEditor,
}

impl Interactive {
	pub fn new() -> Result<Interactive> {
		let editor = DefaultEditor::new().map_err(io::Error::other)?;
		Ok(Interactive { editor: editor })
	}
}

impl LineReader for Interactive {
	fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
		match self.editor.readline(prompt) {
			Ok(line) => Ok(Some(line)),
			// ^C drops the current line and prompts again
			Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
			Err(ReadlineError::Eof) => Ok(None),
			Err(ReadlineError::Io(e)) => Err(e),
			Err(e) => Err(io::Error::other(e)),
		}
	}

	fn remember(&mut self, line: &str) {
		let _ = self.editor.add_history_entry(line);
	}

	fn is_interactive(&self) -> bool {
		true
	}
}

/// Reads lines from a pipe or file, without a prompt.
pub struct Piped<R: BufRead> {
	input: R,
}

impl<R: BufRead> Piped<R> {
	pub fn new(input: R) -> Piped<R> {
		Piped { input: input }
	}
}

impl<R: BufRead> LineReader for Piped<R> {
	fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
		let mut line = String::new();
		match self.input.read_line(&mut line)? {
			0 => Ok(None),
			_ => Ok(Some(line)),
		}
	}

	fn is_interactive(&self) -> bool {
		false
	}
}

pub fn open() -> Result<Box<dyn LineReader>> {
	let stdin = io::stdin();
	if stdin.is_terminal() {
		Ok(Box::new(Interactive::new()?))
	} else {
		Ok(Box::new(Piped::new(stdin.lock())))
	}
}
