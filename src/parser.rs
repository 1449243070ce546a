use crate::error::ParseError;
use crate::types::*;

type ParseResult<T> = Result<T, ParseError>;

pub const MAX_STAGES: usize = 10;
pub const MAX_ARGS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
	pub max_stages: usize,
	pub max_args: usize,
}

impl Default for Limits {
	fn default() -> Limits {
		Limits { max_stages: MAX_STAGES, max_args: MAX_ARGS }
	}
}

struct Parser<'a> {
	text: &'a str,
	line: &'a [u8],
	i: usize,
	limits: Limits,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn peek(&self) -> Option<u8> {
		self.line.get(self.i).cloned()
	}

	// Operators are ASCII, so every slice boundary lands on a char boundary.
	fn read_word(&mut self) -> &'a str {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.text[orig .. self.i]
	}

	fn current_char(&self) -> char {
		self.text[self.i ..].chars().next().unwrap_or('?')
	}

	fn parse_redirect(&mut self) -> ParseResult<Redirect> {
		let (typ, op) = match self.peek() {
			Some(b'<') => (RedirectType::Input, '<'),
			_ => (RedirectType::Output, '>'),
		};
		self.i += 1;
		match (op, self.peek()) {
			('>', Some(b'>')) => { return Err(ParseError::Unsupported(">>")); },
			('<', Some(b'<')) => { return Err(ParseError::Unsupported("<<")); },
			_ => {},
		}

		self.skip_whitespaces();
		let target = self.read_word();
		if target.is_empty() {
			return Err(ParseError::MissingTarget(op));
		}

		Ok(Redirect { target: target.to_string(), typ: typ })
	}

	fn parse_stage(&mut self, index: usize) -> ParseResult<Stage> {
		let mut words: Vec<Word> = vec![];
		let mut plain = 0;

		loop {
			self.skip_whitespaces();
			match self.peek() {
				Some(b'<') | Some(b'>') => {
					let redirect = self.parse_redirect()?;
					words.push(Word::Redirect(redirect));
				},
				Some(b'|') | Some(b'&') | None => { break; },
				Some(_) => {
					let word = self.read_word();
					plain += 1;
					if plain > self.limits.max_args {
						return Err(ParseError::TooManyArguments { stage: index + 1, max: self.limits.max_args });
					}
					words.push(Word::Plain(word.to_string()));
				},
			}
		}

		if plain == 0 {
			return Err(ParseError::EmptyCommand);
		}
		Ok(Stage { words: words })
	}

	fn parse_pipeline(&mut self) -> ParseResult<Option<Pipeline>> {
		let mut stages: Vec<Stage> = vec![];
		let mut is_background = false;

		self.skip_whitespaces();
		if self.peek().is_none() {
			return Ok(None);
		}

		loop {
			if stages.len() == self.limits.max_stages {
				return Err(ParseError::TooManyStages { max: self.limits.max_stages });
			}
			let stage = self.parse_stage(stages.len())?;
			stages.push(stage);
			match self.peek() {
				Some(b'|') => { self.i += 1; },
				Some(b'&') => {
					self.i += 1;
					is_background = true;
					self.skip_whitespaces();
					if self.peek().is_some() {
						return Err(ParseError::TrailingGarbage(self.current_char()));
					}
					break;
				},
				_ => { break; },
			}
		}
		Ok(Some(Pipeline { stages: stages, is_background: is_background }))
	}
}

/// Parses one command line. A blank line yields `None`; any malformed line is
/// rejected as a whole.
pub fn parse(line: &str, limits: Limits) -> ParseResult<Option<Pipeline>> {
	let mut parser = Parser { text: line, line: line.as_bytes(), i: 0, limits: limits };
	parser.parse_pipeline()
}
