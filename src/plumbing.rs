use std::os::fd::{AsRawFd,FromRawFd,OwnedFd,RawFd};

use nix::fcntl::{self,FcntlArg,OFlag};
use nix::unistd;

#[derive(Debug)]
pub enum Endpoint {
	/// Use whatever the shell itself has on this descriptor.
	Inherit,
	Fd(OwnedFd),
}

impl Endpoint {
	#[cfg(test)]
	pub fn is_inherit(&self) -> bool {
		matches!(*self, Endpoint::Inherit)
	}

	// A descriptor can only sit on 0 or 1 when the shell was started with
	// that stream closed. Move it up so neither install overwrites the other.
	fn lift(self) -> nix::Result<Endpoint> {
		match self {
			Endpoint::Fd(fd) if fd.as_raw_fd() <= libc::STDOUT_FILENO => {
				let raw = fcntl::fcntl(fd.as_raw_fd(), FcntlArg::F_DUPFD_CLOEXEC(libc::STDERR_FILENO + 1))?;
				Ok(Endpoint::Fd(unsafe { OwnedFd::from_raw_fd(raw) }))
			},
			other => Ok(other),
		}
	}

	// Runs in the forked child. The original descriptor is closed when `self`
	// drops; the dup2 copy has no close-on-exec flag.
	fn install(self, target: RawFd) -> nix::Result<()> {
		if let Endpoint::Fd(fd) = self {
			unistd::dup2(fd.as_raw_fd(), target)?;
		}
		Ok(())
	}
}

/// The effective standard streams of one stage.
#[derive(Debug)]
pub struct StageIo {
	pub stdin: Endpoint,
	pub stdout: Endpoint,
}

impl StageIo {
	pub fn install(self) -> nix::Result<()> {
		let stdin = self.stdin.lift()?;
		let stdout = self.stdout.lift()?;
		stdin.install(libc::STDIN_FILENO)?;
		stdout.install(libc::STDOUT_FILENO)
	}
}

/// Hands out the wiring for each stage of an N-stage pipeline in order. The
/// pipe between stage i and i+1 is created when stage i is wired; its read end
/// is held here until stage i+1 asks for its wiring.
#[derive(Debug)]
pub struct Plumber {
	len: usize,
	next: usize,
	pending_read: Option<OwnedFd>,
}

impl Plumber {
	pub fn new(len: usize) -> Plumber {
		Plumber { len: len, next: 0, pending_read: None }
	}

	/// Wires the next stage. A redirection overrides the pipe end on its side;
	/// the overridden end is closed right away so the neighbour sees EOF or
	/// EPIPE instead of hanging.
	pub fn connect(&mut self, input: Option<OwnedFd>, output: Option<OwnedFd>) -> nix::Result<StageIo> {
		assert!(self.next < self.len, "more stages wired than planned");
		let is_last = self.next + 1 == self.len;
		self.next += 1;

		let previous_read = self.pending_read.take();
		let stdin = match (input, previous_read) {
			(Some(fd), _) => Endpoint::Fd(fd),
			(None, Some(fd)) => Endpoint::Fd(fd),
			(None, None) => Endpoint::Inherit,
		};

		let pipe_write = if is_last {
			None
		} else {
			let (pipe_read, pipe_write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
			self.pending_read = Some(pipe_read);
			Some(pipe_write)
		};
		let stdout = match (output, pipe_write) {
			(Some(fd), _) => Endpoint::Fd(fd),
			(None, Some(fd)) => Endpoint::Fd(fd),
			(None, None) => Endpoint::Inherit,
		};

		Ok(StageIo { stdin: stdin, stdout: stdout })
	}

	/// Closes the read end waiting for the next stage. Called in a child, which
	/// never needs it.
	pub fn close_pending(&mut self) {
		self.pending_read = None;
	}

	#[cfg(test)]
	pub fn open_descriptors(&self) -> usize {
		self.pending_read.iter().count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::File;
	use std::io::{Read,Write};

	fn pipe_pair() -> (OwnedFd, OwnedFd) {
		unistd::pipe2(OFlag::O_CLOEXEC).unwrap()
	}

	#[test]
	fn single_stage_inherits_both_streams() {
		let mut plumber = Plumber::new(1);
		let io = plumber.connect(None, None).unwrap();
		assert!(io.stdin.is_inherit());
		assert!(io.stdout.is_inherit());
		assert_eq!(plumber.open_descriptors(), 0);
	}

	#[test]
	fn adjacent_stages_share_a_pipe() {
		let mut plumber = Plumber::new(3);

		let first = plumber.connect(None, None).unwrap();
		assert!(first.stdin.is_inherit());
		assert_eq!(plumber.open_descriptors(), 1);

		let second = plumber.connect(None, None).unwrap();
		let third = plumber.connect(None, None).unwrap();
		assert!(third.stdout.is_inherit());
		assert_eq!(plumber.open_descriptors(), 0);

		let mut writer = match first.stdout {
			Endpoint::Fd(fd) => File::from(fd),
			Endpoint::Inherit => panic!("first stage should write into a pipe"),
		};
		writer.write_all(b"hello\n").unwrap();
		drop(writer);

		let mut reader = match second.stdin {
			Endpoint::Fd(fd) => File::from(fd),
			Endpoint::Inherit => panic!("second stage should read from a pipe"),
		};
		let mut got = String::new();
		reader.read_to_string(&mut got).unwrap();
		assert_eq!(got, "hello\n");

		assert!(!second.stdout.is_inherit());
		assert!(!third.stdin.is_inherit());
	}

	#[test]
	fn redirection_overrides_pipe_end() {
		let (file_read, _file_write) = pipe_pair();
		let (_out_read, out_write) = pipe_pair();
		let file_raw = file_read.as_raw_fd();
		let out_raw = out_write.as_raw_fd();

		let mut plumber = Plumber::new(2);
		let first = plumber.connect(None, Some(out_write)).unwrap();
		match first.stdout {
			Endpoint::Fd(ref fd) => assert_eq!(fd.as_raw_fd(), out_raw),
			Endpoint::Inherit => panic!("expected the redirection target"),
		}

		// the pipe's write end was dropped, so the second stage sees EOF
		let second = plumber.connect(Some(file_read), None).unwrap();
		match second.stdin {
			Endpoint::Fd(ref fd) => assert_eq!(fd.as_raw_fd(), file_raw),
			Endpoint::Inherit => panic!("expected the redirection source"),
		}
	}

	#[test]
	fn overridden_pipe_reads_eof() {
		let (_out_read, out_write) = pipe_pair();
		let mut plumber = Plumber::new(2);
		let first = plumber.connect(None, Some(out_write)).unwrap();
		let second = plumber.connect(None, None).unwrap();
		drop(first);

		let mut reader = match second.stdin {
			Endpoint::Fd(fd) => File::from(fd),
			Endpoint::Inherit => panic!("second stage should read from a pipe"),
		};
		let mut got = Vec::new();
		assert_eq!(reader.read_to_end(&mut got).unwrap(), 0);
	}

	#[test]
	fn close_pending_drops_read_end() {
		let mut plumber = Plumber::new(2);
		let _first = plumber.connect(None, None).unwrap();
		assert_eq!(plumber.open_descriptors(), 1);
		plumber.close_pending();
		assert_eq!(plumber.open_descriptors(), 0);
	}

	#[test]
	fn install_survives_endpoints_on_standard_descriptors() {
		// with 0 and 1 closed the new pipe lands on exactly those two; wire
		// them crossed so each install's source is the other's target
		assert!(crate::job::in_child(|| {
			if unistd::close(0).is_err() || unistd::close(1).is_err() {
				return false;
			}
			let (read, write) = pipe_pair();
			if read.as_raw_fd() != 0 || write.as_raw_fd() != 1 {
				return false;
			}
			let io = StageIo { stdin: Endpoint::Fd(write), stdout: Endpoint::Fd(read) };
			if io.install().is_err() {
				return false;
			}
			let mut byte = [0u8; 1];
			let written = unsafe { libc::write(0, b"x".as_ptr() as *const libc::c_void, 1) };
			let got = unsafe { libc::read(1, byte.as_mut_ptr() as *mut libc::c_void, 1) };
			written == 1 && got == 1 && byte[0] == b'x'
		}));
	}
}
