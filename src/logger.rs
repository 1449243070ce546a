use std::io::{self,Write};

use log::{LevelFilter,Log,Metadata,Record};

/// Writes `psh: <message>` lines to stderr. User-facing errors go through
/// here as well, so the prefix doubles as the shell's diagnostic style.
pub struct SimpleLogger<W: Send + Sync>
where
	for<'a> &'a W: Write,
{
	target: W,
	prefix: &'static str,
}

impl<W: Send + Sync> Log for SimpleLogger<W>
where
	for<'a> &'a W: Write,
{
	fn enabled(&self, metadata: &Metadata) -> bool {
		metadata.level() <= log::max_level() && metadata.level() <= log::STATIC_MAX_LEVEL
	}

	fn log(&self, record: &Record) {
		if self.enabled(record.metadata()) {
			let _ = writeln!(&self.target, "{}{}", self.prefix, record.args());
		}
	}

	fn flush(&self) {
		let _ = (&self.target).flush();
	}
}

impl SimpleLogger<io::Stderr> {
	pub fn to_stderr(prefix: &'static str) -> SimpleLogger<io::Stderr> {
		SimpleLogger { target: io::stderr(), prefix: prefix }
	}
}

pub const PREFIX: &str = "psh: ";

/// Installs the stderr logger. Safe to call more than once; only the first
/// call installs, every call updates the level.
pub fn init(level: LevelFilter) {
	let _ = log::set_boxed_logger(Box::new(SimpleLogger::to_stderr(PREFIX)));
	log::set_max_level(level);
}

#[cfg(test)]
mod tests {
	use super::SimpleLogger;
	use log::Log;
	use std::io;
	use std::sync::{Arc,RwLock};

	struct Buffer(Arc<RwLock<Vec<u8>>>);

	impl io::Write for &Buffer {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.write().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}
		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn prefixes_every_line() {
		let shared = Arc::new(RwLock::new(vec![]));
		let logger = SimpleLogger { target: Buffer(shared.clone()), prefix: "psh: " };
		log::set_max_level(log::LevelFilter::Trace);

		logger.log(&log::Record::builder()
			.args(format_args!("cat: command not found"))
			.level(log::Level::Error)
			.build());

		assert_eq!(&*shared.read().unwrap(), b"psh: cat: command not found\n");
	}
}
