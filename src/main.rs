mod builtin;
mod config;
mod error;
mod eval;
mod global;
mod history;
mod job;
mod logger;
mod parser;
mod plumbing;
mod reader;
mod reaper;
mod redirect;
mod types;

use std::env;
use std::io::{self,Write};
use std::process;

use log::{debug,error,warn,LevelFilter};
use nix::sys::signal::{self,SigHandler,Signal};

use config::Config;
use eval::EvalResult;
use history::Expansion;
use reader::LineReader;

const USAGE: &str = "\
usage: psh              read commands from stdin (interactive on a terminal)
       psh -c <line>    run one command line and exit with its status
       psh -h | --help  show this message
";

enum Flow {
	Continue(u8),
	Exit(i32),
}

fn run_line(state: &mut global::State, line: &str) -> Flow {
	let pipeline = match parser::parse(line, state.config.limits) {
		Ok(Some(pipeline)) => pipeline,
		Ok(None) => { return Flow::Continue(0); },
		Err(e) => {
			error!("{}", e);
			return Flow::Continue(2);
		},
	};
	match eval::eval(state, &pipeline) {
		Ok(EvalResult::Done(s)) => Flow::Continue(s),
		Ok(EvalResult::Background(jobs)) => {
			for job in &jobs {
				println!("[{}] {}", job.slot, job.pid);
			}
			Flow::Continue(0)
		},
		Ok(EvalResult::Exit(code)) => Flow::Exit(code),
		Err(e) => {
			error!("{}", e);
			Flow::Continue(1)
		},
	}
}

fn repl(state: &mut global::State, reader: &mut dyn LineReader) -> i32 {
	let mut last = 0;
	loop {
		let line = match reader.read_line(&state.config.prompt) {
			Ok(Some(line)) => line,
			Ok(None) => { break; },
			Err(e) => {
				error!("cannot read input: {}", e);
				last = 1;
				break;
			},
		};
		let line = match state.history.expand(&line) {
			Expansion::Literal(line) => {
				if !line.trim().is_empty() {
					reader.remember(line.trim());
				}
				line
			},
			Expansion::Recalled(line) => {
				println!("Repeating command: {}", line);
				line
			},
			Expansion::Missing => {
				println!("No such command in history");
				continue;
			},
		};
		match run_line(state, &line) {
			Flow::Continue(s) => { last = s as i32; },
			Flow::Exit(code) => { return code; },
		}
	}
	if reader.is_interactive() {
		println!();
	}
	last
}

fn ignore_interrupts() {
	for &sig in &[Signal::SIGINT, Signal::SIGQUIT] {
		if let Err(e) = unsafe { signal::signal(sig, SigHandler::SigIgn) } {
			warn!("cannot ignore {}: {}", sig, e);
		}
	}
}

fn main() {
	logger::init(LevelFilter::Warn);
	let config = match Config::from_env() {
		Ok(config) => config,
		Err(e) => {
			warn!("{}; using defaults", e);
			Config::default()
		},
	};
	log::set_max_level(config.log_level);

	let args: Vec<String> = env::args().collect();
	let mut state = global::State::new(config);
	if let Err(e) = reaper::arm() {
		error!("cannot install SIGCHLD handler: {}", e);
		process::exit(1);
	}

	let code = match args.get(1).map(|s| s.as_str()) {
		None => match reader::open() {
			Ok(mut reader) => {
				if reader.is_interactive() {
					ignore_interrupts();
				}
				repl(&mut state, &mut *reader)
			},
			Err(e) => {
				error!("cannot open input: {}", e);
				1
			},
		},
		Some("-h") | Some("--help") => {
			print!("{}", USAGE);
			0
		},
		Some("-c") => match args.get(2) {
			Some(line) => match run_line(&mut state, line) {
				Flow::Continue(s) => s as i32,
				Flow::Exit(code) => code,
			},
			None => {
				error!("-c requires a command argument");
				2
			},
		},
		Some(other) => {
			error!("unknown option: {}", other);
			eprint!("{}", USAGE);
			2
		},
	};

	debug!("exiting with {}; reaper claimed {} children", code, reaper::reaped());
	let _ = io::stdout().flush();
	process::exit(code);
}
