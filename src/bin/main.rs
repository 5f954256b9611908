//! Lookout CLI - compile and run widget definitions
//!
//! Usage:
//!   lookout compile <widget.json> [--dialect <dialect>] [--start <ts>] [--end <ts>]
//!   lookout run <widget.json> --db <file> [--unrestricted | --customer <id>... --case <id>...]
//!   lookout validate <widget.json>
//!
//! Examples:
//!   lookout compile widgets/alerts_per_day.json --start 2024-01-01 --end 2024-01-31
//!   lookout run widgets/by_severity.json --db incidents.db --customer 7

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use lookout::access::AccessScope;
use lookout::bucket::{parse_end_bound, parse_timestamp};
use lookout::config::Settings;
use lookout::executor::SqliteStore;
use lookout::sql::{Dialect, SqlDialect};
use lookout::{logging, Timeframe, WidgetDefinition, WidgetEngine};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lookout")]
#[command(about = "Lookout - compile dashboard widgets to scoped aggregate SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a widget definition to SQL and print its bound parameters
    Compile {
        /// Path to the widget JSON file
        file: PathBuf,

        /// SQL dialect to generate (defaults to the configured dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Run a widget against a SQLite database and print its payload
    Run {
        /// Path to the widget JSON file
        file: PathBuf,

        /// SQLite database file (defaults to the configured store path)
        #[arg(long)]
        db: Option<PathBuf>,

        #[command(flatten)]
        window: WindowArgs,

        /// Run without a row-level scope
        #[arg(long, conflicts_with_all = ["customer", "case"])]
        unrestricted: bool,

        /// Visible customer id (repeatable)
        #[arg(long)]
        customer: Vec<i64>,

        /// Visible case id (repeatable)
        #[arg(long)]
        case: Vec<i64>,
    },

    /// Validate a widget definition without running it
    Validate {
        /// Path to the widget JSON file
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Inclusive window start (e.g. 2024-01-01 or 2024-01-01T08:00:00)
    #[arg(long)]
    start: Option<String>,

    /// Inclusive window end; a bare date includes the whole day
    #[arg(long)]
    end: Option<String>,
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Sqlite,
    Postgres,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgres => Dialect::Postgres,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(&settings.logging) {
        eprintln!("Error initialising logging: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Commands::Compile {
            file,
            dialect,
            window,
        } => cmd_compile(&settings, &file, dialect, &window),
        Commands::Run {
            file,
            db,
            window,
            unrestricted,
            customer,
            case,
        } => {
            let scope = if unrestricted {
                AccessScope::Unrestricted
            } else {
                AccessScope::scoped(customer, case)
            };
            cmd_run(&settings, &file, db, &window, &scope)
        }
        Commands::Validate { file } => cmd_validate(&settings, &file),
    }
}

fn cmd_compile(
    settings: &Settings,
    file: &Path,
    dialect: Option<DialectArg>,
    window: &WindowArgs,
) -> ExitCode {
    let Some(definition) = read_definition(file) else {
        return ExitCode::FAILURE;
    };
    let Some(timeframe) = parse_window(window) else {
        return ExitCode::FAILURE;
    };
    let dialect = dialect.map(Dialect::from).unwrap_or(settings.store.dialect);

    let engine = match compile_only_engine(settings) {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    match engine.compile(&definition, &timeframe) {
        Ok(plan) => {
            println!("{}", plan.to_sql(dialect));
            for (i, value) in plan.params.values().iter().enumerate() {
                println!("-- {} = {}", dialect.placeholder(i + 1), value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(
    settings: &Settings,
    file: &Path,
    db: Option<PathBuf>,
    window: &WindowArgs,
    scope: &AccessScope,
) -> ExitCode {
    let Some(definition) = read_definition(file) else {
        return ExitCode::FAILURE;
    };
    let Some(timeframe) = parse_window(window) else {
        return ExitCode::FAILURE;
    };

    let engine = match open_store(settings, db) {
        Ok(store) => WidgetEngine::new(store).with_limits(settings.limits.clone()),
        Err(code) => return code,
    };

    let result = match engine.execute_widget(&definition, &timeframe, scope) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e.client_message());
            return ExitCode::FAILURE;
        }
    };

    let payload = engine.format_widget_payload(&result, &definition, &timeframe);
    match serde_json::to_string_pretty(&payload) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serialising payload: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_validate(settings: &Settings, file: &Path) -> ExitCode {
    let Some(definition) = read_definition(file) else {
        return ExitCode::FAILURE;
    };

    let engine = match compile_only_engine(settings) {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    match engine.compile(&definition, &Timeframe::unbounded()) {
        Ok(plan) => {
            println!("✓ Widget is valid");
            println!("  Chart: {}", plan.chart_type);
            println!("  Columns: {}", plan.select_labels().join(", "));
            if !plan.joins.is_empty() {
                println!("  Joins: {}", plan.joins.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_definition(file: &Path) -> Option<WidgetDefinition> {
    let source = match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return None;
        }
    };

    match WidgetDefinition::from_json(&source) {
        Ok(definition) => Some(definition),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn parse_window(window: &WindowArgs) -> Option<Timeframe> {
    let start = parse_bound("--start", window.start.as_deref(), parse_timestamp)?;
    let end = parse_bound("--end", window.end.as_deref(), parse_end_bound)?;
    Some(Timeframe::new(start, end))
}

/// `Some(None)` for an absent bound, `None` after reporting a bad one.
fn parse_bound(
    flag: &str,
    raw: Option<&str>,
    parse: fn(&str) -> Option<NaiveDateTime>,
) -> Option<Option<NaiveDateTime>> {
    match raw {
        None => Some(None),
        Some(raw) => match parse(raw) {
            Some(ts) => Some(Some(ts)),
            None => {
                eprintln!("Error: {} is not a timestamp: {}", flag, raw);
                None
            }
        },
    }
}

/// Engine over an in-memory store that is never queried.
fn compile_only_engine(settings: &Settings) -> Result<WidgetEngine<SqliteStore>, ExitCode> {
    SqliteStore::open_in_memory()
        .map(|store| WidgetEngine::new(store).with_limits(settings.limits.clone()))
        .map_err(|e| {
            eprintln!("Error opening store: {}", e);
            ExitCode::FAILURE
        })
}

fn open_store(settings: &Settings, db: Option<PathBuf>) -> Result<SqliteStore, ExitCode> {
    let path = match db {
        Some(path) => Some(path),
        None => match settings.store.resolved_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Err(ExitCode::FAILURE);
            }
        },
    };

    let opened = match path {
        Some(path) => SqliteStore::open(path),
        None => SqliteStore::open_in_memory(),
    };
    opened.map_err(|e| {
        eprintln!("Error opening store: {}", e);
        ExitCode::FAILURE
    })
}
