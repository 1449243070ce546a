//! Asynchronous reaping of terminated children.
//!
//! The SIGCHLD handler does exactly one thing: claim every child that can be
//! claimed without blocking. It never touches the job table; the table
//! notices a reaped child on its next non-blocking claim, which then reports
//! `ECHILD`. Foreground pipelines run under a [`Hold`], so their statuses
//! always go to the explicit wait; the handler catches up when it is dropped.

use std::io;
use std::sync::atomic::{AtomicBool,AtomicUsize,Ordering};

use log::debug;
use nix::sys::signal::{SigSet,SigmaskHow,Signal};
use nix::sys::wait::{self,WaitPidFlag,WaitStatus};
use nix::unistd::Pid;
use signal_hook::consts::SIGCHLD;

static ARMED: AtomicBool = AtomicBool::new(false);
static REAPED: AtomicUsize = AtomicUsize::new(0);

/// Claims every child that has already terminated and discards the statuses.
/// Only async-signal-safe calls are made here.
pub fn reap_all() -> usize {
	let mut n = 0;
	loop {
		match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
			Ok(WaitStatus::StillAlive) => break,
			Ok(..) => { n += 1; },
			Err(nix::errno::Errno::EINTR) => continue,
			Err(..) => break,
		}
	}
	REAPED.fetch_add(n, Ordering::Relaxed);
	n
}

/// Total number of children claimed by `reap_all` in this process.
pub fn reaped() -> usize {
	REAPED.load(Ordering::Relaxed)
}

/// Installs the SIGCHLD handler. Only the first call installs anything;
/// later calls return `Ok(false)`.
pub fn arm() -> io::Result<bool> {
	if ARMED.swap(true, Ordering::SeqCst) {
		return Ok(false);
	}
	// Safety: the handler only calls waitpid and touches an atomic.
	let registered = unsafe {
		signal_hook::low_level::register(SIGCHLD, || {
			reap_all();
		})
	};
	if let Err(e) = registered {
		ARMED.store(false, Ordering::SeqCst);
		return Err(e);
	}
	debug!("SIGCHLD reaper armed");
	// children that died before the handler existed
	reap_all();
	Ok(true)
}

fn chld_set() -> SigSet {
	let mut set = SigSet::empty();
	set.add(Signal::SIGCHLD);
	set
}

/// Keeps SIGCHLD blocked while alive and restores the previous mask on drop.
#[derive(Debug)]
pub struct Hold {
	previous: Option<SigSet>,
}

pub fn hold() -> Hold {
	match chld_set().thread_swap_mask(SigmaskHow::SIG_BLOCK) {
		Ok(previous) => Hold { previous: Some(previous) },
		Err(e) => {
			debug!("cannot block SIGCHLD: {}", e);
			Hold { previous: None }
		},
	}
}

impl Drop for Hold {
	fn drop(&mut self) {
		if let Some(previous) = self.previous.take() {
			let _ = previous.thread_set_mask();
		}
	}
}

/// Called in a forked child before exec; the blocked mask would be inherited.
pub fn release_in_child() {
	let _ = chld_set().thread_unblock();
}
