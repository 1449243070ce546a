use std::ffi::CString;
use std::fs;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;

use log::warn;

use crate::error::{ParseError,Result,ShellError};
use crate::types::*;

const OUTPUT_MODE: u32 = 0o644;

/// A stage with its redirection words stripped and their files opened.
#[derive(Debug)]
pub struct Resolved {
	pub argv: Vec<CString>,
	pub input: Option<OwnedFd>,
	pub output: Option<OwnedFd>,
}

// std opens everything with O_CLOEXEC, so a file that is not installed on
// 0/1 disappears from the child at exec.
fn open(redirect: &Redirect) -> Result<OwnedFd> {
	let mut oopt = fs::OpenOptions::new();
	let _ = match redirect.typ {
		RedirectType::Input => oopt.read(true),
		RedirectType::Output => oopt.write(true).create(true).truncate(true).mode(OUTPUT_MODE),
	};
	let file = oopt.open(&redirect.target).map_err(|e| ShellError::Redirect {
		path: redirect.target.clone(),
		source: e,
	})?;
	Ok(OwnedFd::from(file))
}

pub fn resolve(stage: &Stage) -> Result<Resolved> {
	let mut argv: Vec<CString> = Vec::with_capacity(stage.words.len());
	let mut input: Option<OwnedFd> = None;
	let mut output: Option<OwnedFd> = None;

	for word in &stage.words {
		match *word {
			Word::Plain(ref s) => argv.push(CString::new(s.as_bytes())?),
			Word::Redirect(ref redirect) => {
				let slot = match redirect.typ {
					RedirectType::Input => &mut input,
					RedirectType::Output => &mut output,
				};
				if slot.is_some() {
					warn!("ignoring extra redirection to {}", redirect.target);
					continue;
				}
				*slot = Some(open(redirect)?);
			},
		}
	}

	if argv.is_empty() {
		return Err(ParseError::EmptyCommand.into());
	}
	Ok(Resolved { argv: argv, input: input, output: output })
}

/// Resolves every stage up front. On failure the descriptors opened for
/// earlier stages are dropped, so nothing is left open and nothing spawns.
pub fn resolve_all(pipeline: &Pipeline) -> Result<Vec<Resolved>> {
	pipeline.stages.iter().map(resolve).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser::{self,Limits};
	use pretty_assertions::assert_eq;
	use std::fs::File;
	use std::io::Read;
	use std::os::unix::fs::PermissionsExt;

	fn pipeline(line: &str) -> Pipeline {
		parser::parse(line, Limits::default()).unwrap().unwrap()
	}

	fn args(r: &Resolved) -> Vec<&str> {
		r.argv.iter().map(|a| a.to_str().unwrap()).collect()
	}

	#[test]
	fn plain_stage_has_no_descriptors() {
		let r = resolve(&pipeline("ls -l /tmp").stages[0]).unwrap();
		assert_eq!(args(&r), vec!["ls", "-l", "/tmp"]);
		assert!(r.input.is_none());
		assert!(r.output.is_none());
	}

	#[test]
	fn output_redirection_is_stripped_and_truncates() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.txt");
		fs::write(&path, "stale content").unwrap();

		let line = format!("printf foo > {} bar", path.display());
		let r = resolve(&pipeline(&line).stages[0]).unwrap();
		assert_eq!(args(&r), vec!["printf", "foo", "bar"]);
		assert!(r.output.is_some());
		assert_eq!(fs::read(&path).unwrap(), b"");
	}

	#[test]
	fn new_output_file_uses_0644() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("fresh.txt");
		let line = format!("true >{}", path.display());
		resolve(&pipeline(&line).stages[0]).unwrap();
		// umask can only remove bits
		let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
		assert_eq!(mode & !0o644, 0);
		assert_eq!(mode & 0o600, 0o600);
	}

	#[test]
	fn input_redirection_opens_for_reading() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("in.txt");
		fs::write(&path, "foo").unwrap();

		let line = format!("cat < {}", path.display());
		let r = resolve(&pipeline(&line).stages[0]).unwrap();
		assert_eq!(args(&r), vec!["cat"]);

		let mut content = String::new();
		File::from(r.input.unwrap()).read_to_string(&mut content).unwrap();
		assert_eq!(content, "foo");
	}

	#[test]
	fn first_redirection_wins() {
		let dir = tempfile::tempdir().unwrap();
		let first = dir.path().join("first.txt");
		let second = dir.path().join("second.txt");
		let line = format!("echo hi > {} > {}", first.display(), second.display());
		let r = resolve(&pipeline(&line).stages[0]).unwrap();
		assert_eq!(args(&r), vec!["echo", "hi"]);
		assert!(first.exists());
		assert!(!second.exists());
	}

	#[test]
	fn missing_input_file_is_reported() {
		let err = resolve(&pipeline("cat < /no/such/file").stages[0]).unwrap_err();
		match err {
			ShellError::Redirect { ref path, .. } => assert_eq!(path, "/no/such/file"),
			e => panic!("unexpected error {}", e),
		}
	}

	#[test]
	fn unopenable_output_aborts_whole_pipeline() {
		let dir = tempfile::tempdir().unwrap();
		let good = dir.path().join("good.txt");
		let line = format!("echo a > {} | cat > /no/such/dir/out.txt", good.display());
		assert!(resolve_all(&pipeline(&line)).is_err());
	}

	#[test]
	fn interior_nul_is_rejected() {
		let stage = Stage { words: vec![Word::Plain("ec\0ho".to_string())] };
		assert!(matches!(resolve(&stage), Err(ShellError::Nul(..))));
	}
}
