//! Log output for both hosting modes.
//!
//! Inside the automation runtime, events are rendered as workflow commands on
//! stdout (`::warning::`, `::error::`, `::debug::`) so the runner can
//! annotate them; debug events only show up when the runner has step debug
//! logging on. Everywhere else a plain `fmt` subscriber writes to stderr and
//! honors `RUST_LOG`.

use std::fmt;
use std::io::IsTerminal;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub fn init(actions: bool) {
    if actions {
        let level = if runner_debug() {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        tracing_subscriber::registry()
            .with(level)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(WorkflowCommands)
                    .with_writer(std::io::stdout),
            )
            .init();
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn runner_debug() -> bool {
    std::env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1")
}

struct WorkflowCommands;

impl<S, N> FormatEvent<S, N> for WorkflowCommands
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.format_fields(Writer::new(&mut message), event)?;
        writeln!(writer, "{}", render(*event.metadata().level(), &message))
    }
}

fn render(level: Level, message: &str) -> String {
    if level == Level::ERROR {
        format!("::error::{}", escape_data(message))
    } else if level == Level::WARN {
        format!("::warning::{}", escape_data(message))
    } else if level == Level::INFO {
        message.to_string()
    } else {
        format!("::debug::{}", escape_data(message))
    }
}

/// Escape a workflow command payload so it stays on one line.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
