//! heatwave - operator CLI for the temperature log.
//!
//! Drives `domain::TemperatureRepository` against the configured store and
//! prints results as JSON on stdout. Logs go to stderr.
//!
//! Run:
//! ```bash
//! heatwave add 2021-05-10T08:38 11 12
//! heatwave list
//! RUST_LOG=debug STORAGE_PROVIDER=memory heatwave list
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::process;

use chrono::NaiveDateTime;
use domain::adapters::memory_context::InMemoryContext;
use domain::{CoreError, MeasurementContext, MeasurementId, TemperatureMeasurement, TemperatureRepository};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, PartialEq)]
enum Command {
    List,
    Get(MeasurementId),
    Add(TemperatureMeasurement),
    Update(MeasurementId, TemperatureMeasurement),
    Delete(MeasurementId),
    Clear,
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    NotFound(MeasurementId),
    Core(CoreError),
}

impl From<CoreError> for CliError {
    fn from(e: CoreError) -> Self {
        CliError::Core(e)
    }
}

#[derive(Serialize)]
struct ClearedOut {
    removed: usize,
}

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  heatwave list\n  heatwave get <id>\n  heatwave add <date> <indoor> <outdoor>\n  heatwave update <id> <date> <indoor> <outdoor>\n  heatwave delete <id>\n  heatwave clear\n\nDates: YYYY-MM-DDTHH:MM[:SS] (a space works instead of T).",
        domain::about()
    );
}

fn parse_id(s: &str) -> Result<MeasurementId, CliError> {
    match s.parse::<MeasurementId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CliError::Usage(format!("invalid id: {}", s))),
    }
}

fn parse_date(s: &str) -> Result<NaiveDateTime, CliError> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .ok_or_else(|| CliError::Usage(format!("invalid date: {}", s)))
}

fn parse_temp(s: &str) -> Result<f64, CliError> {
    s.parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| CliError::Usage(format!("invalid temperature: {}", s)))
}

fn parse_values(rest: &[String]) -> Result<TemperatureMeasurement, CliError> {
    let [date, in_door, out_door] = rest else {
        return Err(CliError::Usage("expected <date> <indoor> <outdoor>".into()));
    };
    Ok(TemperatureMeasurement::new(
        parse_date(date)?,
        parse_temp(in_door)?,
        parse_temp(out_door)?,
    ))
}

fn parse_command(args: &[String]) -> Result<Command, CliError> {
    let Some((cmd, rest)) = args.split_first() else {
        return Err(CliError::Usage("missing command".into()));
    };
    match (cmd.as_str(), rest) {
        ("list", []) => Ok(Command::List),
        ("clear", []) => Ok(Command::Clear),
        ("get", [id]) => Ok(Command::Get(parse_id(id)?)),
        ("delete", [id]) => Ok(Command::Delete(parse_id(id)?)),
        ("add", values) => Ok(Command::Add(parse_values(values)?)),
        ("update", [id, values @ ..]) => Ok(Command::Update(parse_id(id)?, parse_values(values)?)),
        (other, _) => Err(CliError::Usage(format!("unknown or malformed command: {}", other))),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Core(CoreError::Repository(format!("encode output: {e}"))))
}

/// Run one command and return the JSON to print.
fn execute<C: MeasurementContext>(
    repo: &TemperatureRepository<C>,
    cmd: Command,
) -> Result<String, CliError> {
    match cmd {
        Command::List => to_json(&repo.get_temp_list()?),
        Command::Get(id) => match repo.get_id(id)? {
            Some(m) => to_json(&m),
            None => Err(CliError::NotFound(id)),
        },
        Command::Add(m) => {
            let added = repo.add(m)?;
            info!(id = added.id, "measurement stored");
            to_json(&added)
        }
        Command::Update(id, values) => match repo.update(id, &values)? {
            Some(m) => to_json(&m),
            None => Err(CliError::NotFound(id)),
        },
        Command::Delete(id) => match repo.delete(id)? {
            Some(m) => to_json(&m),
            None => Err(CliError::NotFound(id)),
        },
        Command::Clear => {
            let removed = repo.clear()?;
            info!(removed, "measurements cleared");
            to_json(&ClearedOut { removed })
        }
    }
}

fn run(cfg: &config::Config, cmd: Command) -> Result<String, CliError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            let ctx = sqlite_adapter::SqliteContext::open_creating_dirs(&cfg.db_path)?;
            execute(&TemperatureRepository::new(ctx), cmd)
        }
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => Err(CliError::Usage(
            "built without the `sqlite` feature; use STORAGE_PROVIDER=memory".into(),
        )),
        config::StorageProvider::Memory => {
            execute(&TemperatureRepository::new(InMemoryContext::new()), cmd)
        }
    }
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_volatile();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = match parse_command(&args) {
        Ok(c) => c,
        Err(e) => {
            if let CliError::Usage(msg) = e {
                eprintln!("error: {}", msg);
            }
            print_usage();
            process::exit(2);
        }
    };

    match run(&cfg, cmd) {
        Ok(out) => println!("{}", out),
        Err(CliError::NotFound(id)) => {
            eprintln!("measurement {} not found", id);
            process::exit(1);
        }
        Err(CliError::Usage(msg)) => {
            eprintln!("error: {}", msg);
            process::exit(2);
        }
        Err(CliError::Core(e)) => {
            error!(err = %e, "command failed");
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn may_10() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 5, 10)
            .unwrap()
            .and_hms_opt(8, 38, 0)
            .unwrap()
    }

    fn repo() -> TemperatureRepository<InMemoryContext> {
        let repo = TemperatureRepository::new(InMemoryContext::new());
        repo.clear().unwrap();
        repo
    }

    #[test]
    fn parses_dates_with_and_without_seconds() {
        assert_eq!(parse_date("2021-05-10T08:38").unwrap(), may_10());
        assert_eq!(parse_date("2021-05-10T08:38:00").unwrap(), may_10());
        assert_eq!(parse_date("2021-05-10 08:38").unwrap(), may_10());
        assert!(parse_date("10/05/2021").is_err());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command(&args(&["list"])).unwrap(), Command::List);
        assert_eq!(parse_command(&args(&["get", "3"])).unwrap(), Command::Get(3));
        assert_eq!(
            parse_command(&args(&["add", "2021-05-10T08:38", "-17", "-17"])).unwrap(),
            Command::Add(TemperatureMeasurement::new(may_10(), -17.0, -17.0))
        );
        assert_eq!(
            parse_command(&args(&["update", "4", "2021-05-10T08:38", "13", "14.5"])).unwrap(),
            Command::Update(4, TemperatureMeasurement::new(may_10(), 13.0, 14.5))
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(matches!(parse_command(&[]), Err(CliError::Usage(_))));
        assert!(matches!(parse_command(&args(&["get", "0"])), Err(CliError::Usage(_))));
        assert!(matches!(parse_command(&args(&["get"])), Err(CliError::Usage(_))));
        assert!(matches!(
            parse_command(&args(&["add", "2021-05-10T08:38", "NaN", "1"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(parse_command(&args(&["list", "extra"])), Err(CliError::Usage(_))));
    }

    #[test]
    fn execute_add_then_list() {
        let repo = repo();
        let out = execute(&repo, Command::Add(TemperatureMeasurement::new(may_10(), 11.0, 12.0)))
            .unwrap();
        let added: TemperatureMeasurement = serde_json::from_str(&out).unwrap();
        assert!(added.id > 0);

        let out = execute(&repo, Command::List).unwrap();
        let all: Vec<TemperatureMeasurement> = serde_json::from_str(&out).unwrap();
        assert_eq!(all, vec![added]);
    }

    #[test]
    fn execute_reports_missing_ids() {
        let repo = repo();
        assert!(matches!(execute(&repo, Command::Get(9)), Err(CliError::NotFound(9))));
        assert!(matches!(execute(&repo, Command::Delete(9)), Err(CliError::NotFound(9))));
        let values = TemperatureMeasurement::new(may_10(), 1.0, 2.0);
        assert!(matches!(
            execute(&repo, Command::Update(9, values)),
            Err(CliError::NotFound(9))
        ));
    }

    #[test]
    fn execute_clear_reports_removed_count() {
        let repo = repo();
        for _ in 0..2 {
            execute(&repo, Command::Add(TemperatureMeasurement::new(may_10(), 1.0, 2.0))).unwrap();
        }
        let out = execute(&repo, Command::Clear).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["removed"], 2);
        assert!(repo.get_temp_list().unwrap().is_empty());
    }

    /// Listing lags behind the table; only the unit of work sees real rows.
    struct LaggingList(InMemoryContext);

    impl MeasurementContext for LaggingList {
        fn measurements(&self) -> Result<Vec<TemperatureMeasurement>, CoreError> {
            Ok(Vec::new())
        }

        fn find(&self, id: MeasurementId) -> Result<Option<TemperatureMeasurement>, CoreError> {
            self.0.find(id)
        }

        fn transaction<T, F>(&self, work: F) -> Result<T, CoreError>
        where
            F: FnOnce(&mut dyn domain::MeasurementTx) -> Result<T, CoreError>,
        {
            self.0.transaction(work)
        }
    }

    #[test]
    fn clear_count_comes_from_the_truncate() {
        let repo = TemperatureRepository::new(LaggingList(InMemoryContext::new()));
        for _ in 0..3 {
            execute(&repo, Command::Add(TemperatureMeasurement::new(may_10(), 1.0, 2.0))).unwrap();
        }
        let out = execute(&repo, Command::Clear).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["removed"], 3);
        assert!(repo.get_id(1).unwrap().is_none());
    }
}
