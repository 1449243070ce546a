use std::env;
use std::io::Write;

use log::error;
use nix::sys::signal::{self,Signal};
use nix::unistd::Pid;

use crate::global;
use crate::job::State;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
	Status(u8),
	Exit(i32),
}

pub type Builtin = fn(&mut global::State, &[&str], &mut dyn Write) -> Outcome;

const HELP: &str = "\
Available commands:
cd <dir>          - Change the working directory to <dir>
exit [code]       - Exit the shell
jobs              - List background jobs
kill <pid|%job>   - Terminate a process or background job
history           - List recent commands (!N or !! repeats one)
help              - Display this help message
";

pub fn builtin_cd(_: &mut global::State, args: &[&str], _: &mut dyn Write) -> Outcome {
	let dir = match args.first() {
		Some(dir) => dir.to_string(),
		None => match env::var("HOME") {
			Ok(home) => home,
			Err(_) => {
				error!("cd: missing argument");
				return Outcome::Status(1);
			},
		},
	};
	match env::set_current_dir(&dir) {
		Ok(()) => Outcome::Status(0),
		Err(e) => {
			error!("cd: {}: {}", dir, e);
			Outcome::Status(1)
		},
	}
}

pub fn builtin_exit(_: &mut global::State, args: &[&str], _: &mut dyn Write) -> Outcome {
	match args.first() {
		None => Outcome::Exit(0),
		Some(code) => match code.parse::<i32>() {
			Ok(n) => Outcome::Exit(n),
			Err(_) => {
				error!("exit: {}: numeric argument required", code);
				Outcome::Status(2)
			},
		},
	}
}

pub fn builtin_jobs(state: &mut global::State, _: &[&str], out: &mut dyn Write) -> Outcome {
	state.job_table.refresh();
	for job in state.job_table.iter() {
		let label = match job.state {
			State::Active => "Running",
			State::Terminated => "Done",
		};
		let _ = writeln!(out, "[{}] {} {}", job.slot, job.pid, label);
	}
	state.job_table.evict_finished();
	Outcome::Status(0)
}

fn kill_target(state: &global::State, arg: &str) -> Result<Pid, String> {
	if let Some(slot) = arg.strip_prefix('%') {
		let slot: usize = slot.parse().map_err(|_| format!("{}: invalid job number", arg))?;
		state.job_table.lookup(slot).ok_or_else(|| format!("{}: no such job", arg))
	} else {
		match arg.parse::<i32>() {
			Ok(pid) if pid > 0 => Ok(Pid::from_raw(pid)),
			_ => Err(format!("{}: invalid process id", arg)),
		}
	}
}

pub fn builtin_kill(state: &mut global::State, args: &[&str], _: &mut dyn Write) -> Outcome {
	let arg = match args.first() {
		Some(arg) => *arg,
		None => {
			error!("kill: missing argument");
			return Outcome::Status(1);
		},
	};
	let pid = match kill_target(state, arg) {
		Ok(pid) => pid,
		Err(msg) => {
			error!("kill: {}", msg);
			return Outcome::Status(1);
		},
	};
	match signal::kill(pid, Signal::SIGKILL) {
		Ok(()) => Outcome::Status(0),
		Err(e) => {
			error!("kill: {}: {}", pid, e);
			Outcome::Status(1)
		},
	}
}

pub fn builtin_history(state: &mut global::State, _: &[&str], out: &mut dyn Write) -> Outcome {
	for (n, line) in state.history.iter() {
		let _ = writeln!(out, "{:5}  {}", n, line);
	}
	Outcome::Status(0)
}

pub fn builtin_help(_: &mut global::State, _: &[&str], out: &mut dyn Write) -> Outcome {
	let _ = out.write_all(HELP.as_bytes());
	Outcome::Status(0)
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd),
		"exit" => Some(builtin_exit),
		"jobs" => Some(builtin_jobs),
		"kill" => Some(builtin_kill),
		"history" => Some(builtin_history),
		"help" => Some(builtin_help),
		_ => None,
	}
}
