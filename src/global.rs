use crate::config::Config;
use crate::history::History;
use crate::job::JobTable;

pub struct State {
	pub config: Config,
	pub job_table: JobTable,
	pub history: History,
}

impl State {
	pub fn new(config: Config) -> State {
		let job_table = JobTable::new(config.job_capacity);
		let history = History::new(config.history_size);
		State { config: config, job_table: job_table, history: history }
	}
}
