use std::{ffi,io};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("missing redirection target after '{0}'")]
	MissingTarget(char),
	#[error("unsupported redirection '{0}'")]
	Unsupported(&'static str),
	#[error("character after '&': '{0}'")]
	TrailingGarbage(char),
	#[error("too many pipeline stages (max {max})")]
	TooManyStages { max: usize },
	#[error("too many arguments in stage {stage} (max {max})")]
	TooManyArguments { stage: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum ShellError {
	#[error("{0}")]
	Parse(#[from] ParseError),
	#[error("{path}: {source}")]
	Redirect { path: String, source: io::Error },
	#[error("Nul char error: {0}")]
	Nul(#[from] ffi::NulError),
	#[error("cannot spawn stage {stage}: {source}")]
	Spawn { stage: usize, source: nix::Error },
	#[error("cannot create pipe: {0}")]
	Pipe(nix::Error),
	#[error("background job table full ({capacity} jobs)")]
	JobTableFull { capacity: usize },
	#[error("invalid configuration: {0}")]
	Config(String),
	#[error("IO error: {0}")]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
