use std::collections::VecDeque;

pub const HISTORY_SIZE: usize = 10;

/// Bounded list of entered lines; the oldest line falls out first.
#[derive(Debug)]
pub struct History {
	lines: VecDeque<String>,
	capacity: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Expansion {
	/// Not a history reference; run the line as typed.
	Literal(String),
	/// A `!N` or `!!` reference to a stored line.
	Recalled(String),
	Missing,
}

impl History {
	pub fn new(capacity: usize) -> History {
		History { lines: VecDeque::with_capacity(capacity), capacity: capacity }
	}

	pub fn push(&mut self, line: &str) {
		if self.capacity == 0 {
			return;
		}
		if self.lines.len() == self.capacity {
			self.lines.pop_front();
		}
		self.lines.push_back(line.to_string());
	}

	/// 1-based, counted from the oldest line still kept.
	pub fn get(&self, n: usize) -> Option<&str> {
		n.checked_sub(1).and_then(|i| self.lines.get(i)).map(|s| s.as_str())
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.lines.len()
	}

	#[cfg(test)]
	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
		self.lines.iter().enumerate().map(|(i, s)| (i + 1, s.as_str()))
	}

	/// Resolves `!N` / `!!`. Other lines are recorded when non-blank and
	/// returned as they are; recalled lines are not recorded again.
	pub fn expand(&mut self, line: &str) -> Expansion {
		let trimmed = line.trim();
		if let Some(reference) = trimmed.strip_prefix('!') {
			let found = if reference == "!" {
				self.lines.back().map(|s| s.as_str())
			} else {
				reference.parse::<usize>().ok().and_then(|n| self.get(n))
			};
			return match found {
				Some(s) => Expansion::Recalled(s.to_string()),
				None => Expansion::Missing,
			};
		}
		if !trimmed.is_empty() {
			self.push(trimmed);
		}
		Expansion::Literal(line.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn evicts_oldest() {
		let mut h = History::new(3);
		for line in &["a", "b", "c", "d"] {
			h.push(line);
		}
		assert_eq!(h.iter().collect::<Vec<_>>(), vec![(1, "b"), (2, "c"), (3, "d")]);
		assert_eq!(h.get(0), None);
		assert_eq!(h.get(1), Some("b"));
		assert_eq!(h.get(4), None);
	}

	#[test]
	fn expands_numbered_and_last() {
		let mut h = History::new(10);
		assert_eq!(h.expand("ls -l"), Expansion::Literal("ls -l".to_string()));
		assert_eq!(h.expand("echo hi | cat"), Expansion::Literal("echo hi | cat".to_string()));
		assert_eq!(h.expand("!1"), Expansion::Recalled("ls -l".to_string()));
		assert_eq!(h.expand("!!"), Expansion::Recalled("echo hi | cat".to_string()));
		assert_eq!(h.len(), 2);
	}

	#[test]
	fn unknown_reference() {
		let mut h = History::new(10);
		assert_eq!(h.expand("!1"), Expansion::Missing);
		assert_eq!(h.expand("!!"), Expansion::Missing);
		h.push("ls");
		assert_eq!(h.expand("!x"), Expansion::Missing);
		assert_eq!(h.expand("!0"), Expansion::Missing);
	}

	#[test]
	fn blank_lines_are_not_recorded() {
		let mut h = History::new(10);
		h.expand("   ");
		assert!(h.is_empty());
	}

	#[test]
	fn zero_capacity_keeps_nothing() {
		let mut h = History::new(0);
		h.push("ls");
		assert!(h.is_empty());
	}
}
