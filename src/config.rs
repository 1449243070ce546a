use std::env;
use std::str::FromStr;

use log::LevelFilter;

use crate::error::{Result,ShellError};
use crate::history::HISTORY_SIZE;
use crate::job::JOB_CAPACITY;
use crate::parser::{self,Limits};

pub const PROMPT: &str = "psh> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub prompt: String,
	pub history_size: usize,
	pub limits: Limits,
	pub job_capacity: usize,
	pub log_level: LevelFilter,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			prompt: PROMPT.to_string(),
			history_size: HISTORY_SIZE,
			limits: Limits::default(),
			job_capacity: JOB_CAPACITY,
			log_level: LevelFilter::Warn,
		}
	}
}

fn parse_var<T: FromStr>(key: &str, value: String) -> Result<T> {
	value.trim().parse().map_err(|_| ShellError::Config(format!("{}: invalid value '{}'", key, value)))
}

impl Config {
	/// Builds a config from `lookup`, which maps variable names to values.
	pub fn from_lookup<F>(lookup: F) -> Result<Config> where F: Fn(&str) -> Option<String> {
		let mut config = Config::default();
		if let Some(prompt) = lookup("PSH_PROMPT") {
			config.prompt = prompt;
		}
		if let Some(v) = lookup("PSH_HISTSIZE") {
			config.history_size = parse_var("PSH_HISTSIZE", v)?;
		}
		if let Some(v) = lookup("PSH_MAX_STAGES") {
			let max: usize = parse_var("PSH_MAX_STAGES", v)?;
			if max == 0 {
				return Err(ShellError::Config("PSH_MAX_STAGES must be at least 1".to_string()));
			}
			config.limits = Limits { max_stages: max, max_args: parser::MAX_ARGS };
		}
		if let Some(v) = lookup("PSH_LOG") {
			config.log_level = parse_var("PSH_LOG", v)?;
		}
		Ok(config)
	}

	pub fn from_env() -> Result<Config> {
		Config::from_lookup(|key| env::var(key).ok())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> Result<Config> {
		let map: HashMap<String, String> = vars.iter().map(|&(k, v)| (k.to_string(), v.to_string())).collect();
		Config::from_lookup(|key| map.get(key).cloned())
	}

	#[test]
	fn defaults() {
		let config = lookup(&[]).unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.prompt, "psh> ");
		assert_eq!(config.history_size, 10);
		assert_eq!(config.limits.max_stages, 10);
		assert_eq!(config.job_capacity, 512);
	}

	#[test]
	fn overrides() {
		let config = lookup(&[
			("PSH_PROMPT", "$ "),
			("PSH_HISTSIZE", "50"),
			("PSH_MAX_STAGES", " 4 "),
			("PSH_LOG", "debug"),
		]).unwrap();
		assert_eq!(config.prompt, "$ ");
		assert_eq!(config.history_size, 50);
		assert_eq!(config.limits.max_stages, 4);
		assert_eq!(config.log_level, LevelFilter::Debug);
	}

	#[test]
	fn invalid_values_are_errors() {
		assert!(matches!(lookup(&[("PSH_HISTSIZE", "many")]), Err(ShellError::Config(..))));
		assert!(matches!(lookup(&[("PSH_MAX_STAGES", "0")]), Err(ShellError::Config(..))));
		assert!(matches!(lookup(&[("PSH_LOG", "loud")]), Err(ShellError::Config(..))));
	}
}
