// 📝 Logging for the amr-reconcile binary
// Warn by default, Info with --verbose; RUST_LOG overrides both.
// Lines carry the time since startup, not wall-clock time, so a run's log can
// be read next to its RunReport without caring about time zones.

use env_logger::{Builder, Env, Target};
use log::SetLoggerError;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static STARTED: OnceLock<Instant> = OnceLock::new();

/// `HH:MM:SS` since startup; hours keep counting past 99
pub fn elapsed_stamp(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Install the stderr logger. Fails only if a logger is already set.
pub fn init_logger(verbose: bool) -> Result<(), SetLoggerError> {
    let started = *STARTED.get_or_init(Instant::now);

    Builder::from_env(Env::default().default_filter_or(default_filter(verbose)))
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                elapsed_stamp(started.elapsed()),
                record.level(),
                record.args()
            )
        })
        .target(Target::Stderr)
        .try_init()
}
