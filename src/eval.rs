use std::ffi::CString;
use std::io::{self,Write};

use log::{debug,warn};
use nix::errno::Errno;
use nix::sys::signal::{self,SigHandler,Signal};
use nix::unistd;

use crate::builtin::{self,Outcome};
use crate::error::{Result,ShellError};
use crate::global;
use crate::job::{self,Job,JobBuilder,WaitStatusExt};
use crate::logger;
use crate::plumbing::{Plumber,StageIo};
use crate::reaper;
use crate::redirect::{self,Resolved};
use crate::types::Pipeline;

const STATUS_NOT_FOUND: i32 = 127;
const STATUS_CANNOT_EXEC: i32 = 126;

// The shell ignores these (Rust itself ignores SIGPIPE); an ignored
// disposition would survive exec.
const RESTORED_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE];

// A forked child may not take locks another thread held at fork time, so it
// bypasses the logger and writes one buffer straight to descriptor 2.
fn report_in_child(message: std::fmt::Arguments) {
	let line = format!("{}{}\n", logger::PREFIX, message);
	let _ = unistd::write(io::stderr(), line.as_bytes());
}

fn exec_stage(argv: &[CString], io: StageIo) -> i32 {
	let name = argv[0].to_string_lossy();
	if let Err(e) = io.install() {
		report_in_child(format_args!("{}: cannot set up standard streams: {}", name, e));
		return STATUS_CANNOT_EXEC;
	}
	for &sig in &RESTORED_SIGNALS {
		let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
	}
	reaper::release_in_child();
	match unistd::execvp(&argv[0], argv) {
		Err(Errno::ENOENT) => {
			report_in_child(format_args!("{}: command not found", name));
			STATUS_NOT_FOUND
		},
		Err(e) => {
			report_in_child(format_args!("{}: {}", name, e));
			STATUS_CANNOT_EXEC
		},
		Ok(never) => match never {},
	}
}

/// Forks one child per stage, in order, recording each pid in `job_builder`.
/// On failure the stages already started keep running; the descriptors held
/// for the rest are closed as the plumber and the remaining stages drop.
fn spawn_stages(stages: Vec<Resolved>, job_builder: &mut JobBuilder) -> Result<()> {
	let _ = io::stdout().flush();
	let mut plumber = Plumber::new(stages.len());
	for (i, stage) in stages.into_iter().enumerate() {
		let Resolved { argv, input, output } = stage;
		let stage_io = plumber.connect(input, output).map_err(ShellError::Pipe)?;
		let forked = job_builder.push_fork().map_err(|e| ShellError::Spawn { stage: i + 1, source: e })?;
		match forked {
			unistd::ForkResult::Parent { child } => {
				debug!("stage {} ({}) is pid {}", i + 1, argv[0].to_string_lossy(), child);
				drop(stage_io);
			},
			unistd::ForkResult::Child => {
				plumber.close_pending();
				let code = exec_stage(&argv, stage_io);
				unsafe { libc::_exit(code) }
			},
		}
	}
	Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum EvalResult {
	Done(u8),
	Background(Vec<Job>),
	Exit(i32),
}

fn eval_builtin(state: &mut global::State, pipeline: &Pipeline) -> Option<EvalResult> {
	let stages = &pipeline.stages;
	if stages.len() != 1 || stages[0].has_redirects() {
		return None;
	}
	let func = stages[0].name().and_then(builtin::match_builtin)?;
	let args: Vec<&str> = stages[0].plain_words().skip(1).collect();
	let outcome = func(state, &args, &mut io::stdout());
	let _ = io::stdout().flush();
	Some(match outcome {
		Outcome::Status(s) => EvalResult::Done(s),
		Outcome::Exit(code) => EvalResult::Exit(code),
	})
}

/// Runs one parsed line. Foreground pipelines return once every stage has
/// terminated; background ones return as soon as all stages are spawned and
/// registered. Errors leave nothing registered and nothing waited on.
pub fn eval(state: &mut global::State, pipeline: &Pipeline) -> Result<EvalResult> {
	assert!(!pipeline.stages.is_empty());

	if let Some(r) = eval_builtin(state, pipeline) {
		return Ok(r);
	}

	if pipeline.is_background {
		state.job_table.reserve(pipeline.stages.len())?;
	}
	let resolved = redirect::resolve_all(pipeline)?;

	// foreground children are claimed by the wait below, never by the reaper
	let _hold = if pipeline.is_background { None } else { Some(reaper::hold()) };
	let mut job_builder = JobBuilder::new(resolved.len());
	let spawned = spawn_stages(resolved, &mut job_builder);
	let pids = job_builder.build();
	if let Err(e) = spawned {
		if !pids.is_empty() {
			warn!("abandoning pipeline, {} stage(s) left running", pids.len());
		}
		return Err(e);
	}

	if pipeline.is_background {
		let jobs: Result<Vec<Job>> = pids.into_iter().map(|pid| state.job_table.insert(pid)).collect();
		Ok(EvalResult::Background(jobs?))
	} else {
		let status = job::wait_all(&pids);
		Ok(EvalResult::Done(status.map_or(0, |s| s.code())))
	}
}
