//! Stderr logging for the binaries.
//!
//! Library code only uses the `log` macros. Records from `ledger_omr*`
//! targets pass at the requested level; everything else is capped at
//! `Warn` so dependency chatter stays out of scan logs.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

const OWN_TARGET_PREFIX: &str = "ledger_omr";

struct ScanLog {
    own: LevelFilter,
    foreign: LevelFilter,
    epoch: Instant,
}

impl ScanLog {
    fn limit_for(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_TARGET_PREFIX) {
            self.own
        } else {
            self.foreign
        }
    }
}

impl Log for ScanLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.limit_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "E",
            Level::Warn => "W",
            Level::Info => "I",
            Level::Debug => "D",
            Level::Trace => "T",
        };
        let ms = self.epoch.elapsed().as_millis();
        let _ = writeln!(
            std::io::stderr().lock(),
            "{tag} {ms:>6}ms {}: {}",
            record.module_path().unwrap_or(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static SINK: OnceLock<ScanLog> = OnceLock::new();

/// Install the stderr logger. Only the first call configures it; later
/// calls return `Ok(())` without changing the level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if SINK.get().is_some() {
        return Ok(());
    }
    let sink = SINK.get_or_init(|| ScanLog {
        own: level,
        foreign: level.min(LevelFilter::Warn),
        epoch: Instant::now(),
    });
    log::set_logger(sink)?;
    log::set_max_level(sink.own.max(sink.foreign));
    Ok(())
}

/// Output shape for [`init_tracing`].
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global `tracing` subscriber. `RUST_LOG` wins over
/// `default_directive` when set. Returns `false` when a subscriber was
/// already installed.
#[cfg(feature = "tracing")]
pub fn init_tracing(format: LogFormat, default_directive: &str) -> bool {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    match format {
        LogFormat::Text => builder.compact().finish().try_init().is_ok(),
        LogFormat::Json => builder.json().flatten_event(true).finish().try_init().is_ok(),
    }
}
