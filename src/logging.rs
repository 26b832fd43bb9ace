use std::{env, fmt::Display};

use colored::Colorize;
use log::{Level, LevelFilter};

/// Dependencies only get to report warnings and errors
const EXTERNAL_LEVEL: Level = Level::Warn;

/// Sets up logging for every lockstep crate.
///
/// `LOCKSTEP_LOG` may be set to `debug` or `trace` to see bus traffic and timers.
pub fn init_logger() {
    let local_level = env::var("LOCKSTEP_LOG")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::Info);

    let result = fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_module(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_badge(record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .level(LevelFilter::Trace)
        .filter(move |meta| match Target::from_module(meta.target()) {
            Target::External(_) => meta.level() <= EXTERNAL_LEVEL,
            _ => meta.level() <= local_level,
        })
        .chain(std::io::stdout())
        .apply();

    if let Err(e) = result {
        eprintln!("Logging could not be set up: {}", e);
    }
}

/// Which part of lockstep a log line came from
enum Target {
    External(String),
    Main,
    Server,
    Collab,
    Core,
}

impl Target {
    fn from_module(module_path: &str) -> Self {
        let root = module_path.split("::").next().unwrap_or_default();

        match root {
            "lockstep" => Self::Main,
            "lockstep_core" => Self::Core,
            "lockstep_collab" => Self::Collab,
            "lockstep_server" => Self::Server,
            other => Self::External(other.to_string()),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Main => "MAIN".bright_white(),
            Target::Server => "SERVER".bright_green(),
            Target::Collab => "COLLAB".bright_purple(),
            Target::Core => "CORE".blue(),
        };

        Display::fmt(&label, f)
    }
}

fn level_badge(level: Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::Target;

    #[test]
    fn targets_are_resolved_by_crate() {
        assert!(matches!(Target::from_module("lockstep_collab::stations"), Target::Collab));
        assert!(matches!(Target::from_module("lockstep"), Target::Main));
        assert!(matches!(Target::from_module("sqlx::query"), Target::External(name) if name == "sqlx"));
    }
}
