use log::{debug,trace};
use nix::errno::Errno;
use nix::sys::wait::{self,WaitPidFlag,WaitStatus};
use nix::unistd::{self,Pid};

use crate::error::{Result,ShellError};

pub const JOB_CAPACITY: usize = 512;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum State { Active, Terminated }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn code(self) -> u8;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) => State::Terminated,
			WaitStatus::Signaled(..) => State::Terminated,
			_ => State::Active,
		}
	}
	fn code(self) -> u8 {
		match self {
			WaitStatus::Exited(_, code) => code as u8,
			WaitStatus::Signaled(_, sig, _) => 128u8.wrapping_add(sig as u8),
			_ => 0,
		}
	}
}

/// Result of trying to claim one child's termination.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Claim {
	Running,
	/// `None` when somebody else (the reaper) got to the status first.
	Finished(Option<WaitStatus>),
}

/// Claims `pid` if it has terminated. A pid that is no longer our child has
/// already been reaped elsewhere and counts as finished, never as an error.
pub fn claim(pid: Pid, block: bool) -> Claim {
	let flags = if block { None } else { Some(WaitPidFlag::WNOHANG) };
	loop {
		match wait::waitpid(pid, flags) {
			Ok(WaitStatus::StillAlive) => return Claim::Running,
			Ok(status) => match status.state() {
				State::Terminated => {
					trace!("claimed {} with {:?}", pid, status);
					return Claim::Finished(Some(status));
				},
				State::Active if block => continue,
				State::Active => return Claim::Running,
			},
			Err(Errno::EINTR) => continue,
			Err(Errno::ECHILD) => {
				trace!("{} was already reaped", pid);
				return Claim::Finished(None);
			},
			Err(e) => {
				debug!("waitpid({}) failed: {}", pid, e);
				return Claim::Finished(None);
			},
		}
	}
}

/// Blocks until every pid has terminated and returns the status of the last
/// one, if it was still ours to claim.
pub fn wait_all(pids: &[Pid]) -> Option<WaitStatus> {
	let mut last = None;
	for &pid in pids {
		if let Claim::Finished(status) = claim(pid, true) {
			last = status;
		}
	}
	last
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Job {
	pub slot: usize,
	pub pid: Pid,
	pub state: State,
}

/// Collects the pids of one pipeline as its stages are forked.
#[derive(Debug)]
pub struct JobBuilder {
	pids: Vec<Pid>,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder { pids: Vec::with_capacity(size_hint) }
	}

	pub fn push_fork(&mut self) -> nix::Result<unistd::ForkResult> {
		let r = unsafe { unistd::fork() }?;
		if let unistd::ForkResult::Parent { child } = r {
			self.pids.push(child);
		}
		Ok(r)
	}

	pub fn build(self) -> Vec<Pid> {
		self.pids
	}
}

/// Runs `f` in a forked copy of the test process and reports whether it
/// returned true. The copy has a single thread and its own children.
#[cfg(test)]
pub fn in_child<F: FnOnce() -> bool>(f: F) -> bool {
	let mut builder = JobBuilder::new(1);
	match builder.push_fork().expect("fork") {
		unistd::ForkResult::Parent { child } => {
			claim(child, true) == Claim::Finished(Some(WaitStatus::Exited(child, 0)))
		},
		unistd::ForkResult::Child => {
			let ok = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).unwrap_or(false);
			unsafe { libc::_exit(if ok { 0 } else { 1 }) }
		},
	}
}

/// Background jobs in spawn order. Finished jobs stay until they have been
/// reported once, then get evicted; a full table refuses new jobs.
#[derive(Debug)]
pub struct JobTable {
	jobs: Vec<Job>,
	capacity: usize,
	next_slot: usize,
}

impl JobTable {
	pub fn new(capacity: usize) -> JobTable {
		JobTable { jobs: vec![], capacity: capacity, next_slot: 1 }
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	#[cfg(test)]
	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	pub fn available(&self) -> usize {
		self.capacity - self.jobs.len()
	}

	/// Makes room for `n` more jobs, or fails. Finished jobs that `jobs` has
	/// not reported yet are dropped only when the room is actually needed.
	pub fn reserve(&mut self, n: usize) -> Result<()> {
		if self.available() >= n {
			return Ok(());
		}
		self.refresh();
		let dropped = self.evict_finished();
		if !dropped.is_empty() {
			debug!("dropped {} unreported finished job(s) to make room", dropped.len());
		}
		if self.available() < n {
			return Err(ShellError::JobTableFull { capacity: self.capacity });
		}
		Ok(())
	}

	pub fn insert(&mut self, pid: Pid) -> Result<Job> {
		if self.available() == 0 {
			return Err(ShellError::JobTableFull { capacity: self.capacity });
		}
		if self.jobs.is_empty() {
			self.next_slot = 1;
		}
		let job = Job { slot: self.next_slot, pid: pid, state: State::Active };
		self.next_slot += 1;
		self.jobs.push(job);
		debug!("job [{}] is pid {}", job.slot, pid);
		Ok(job)
	}

	/// Polls every active job without blocking.
	pub fn refresh(&mut self) {
		for job in self.jobs.iter_mut().filter(|j| j.state == State::Active) {
			if let Claim::Finished(_) = claim(job.pid, false) {
				job.state = State::Terminated;
			}
		}
	}

	pub fn evict_finished(&mut self) -> Vec<Job> {
		let (done, active): (Vec<Job>, Vec<Job>) = self.jobs.drain(..).partition(|j| j.state == State::Terminated);
		self.jobs = active;
		done
	}

	pub fn iter(&self) -> impl Iterator<Item = &Job> {
		self.jobs.iter()
	}

	pub fn lookup(&self, slot: usize) -> Option<Pid> {
		self.jobs.iter().find(|j| j.slot == slot).map(|j| j.pid)
	}
}
