#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output }

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub target: String,
	pub typ: RedirectType,
}

/// One word of a stage as the tokenizer saw it. Redirections stay in place
/// until the resolver strips them.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Word {
	Plain(String),
	Redirect(Redirect),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stage {
	pub words: Vec<Word>,
}

impl Stage {
	pub fn name(&self) -> Option<&str> {
		self.plain_words().next()
	}

	pub fn plain_words(&self) -> impl Iterator<Item = &str> {
		self.words.iter().filter_map(|w| match *w {
			Word::Plain(ref s) => Some(s.as_str()),
			Word::Redirect(..) => None,
		})
	}

	pub fn has_redirects(&self) -> bool {
		self.words.iter().any(|w| matches!(*w, Word::Redirect(..)))
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub is_background: bool,
}
