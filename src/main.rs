//! rowset - inspect tables, records and filtered record sets from the shell

mod export;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use export::Format;
use rowset::{Database, DatabaseConfig, Direction, MemoryCache, Record, RecordSet, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rowset", version, about = "Lazy record access over SQL Server and SQLite")]
struct Cli {
    /// Configuration file (TOML or JSON); DB_* environment variables otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the backend, database name and server version
    Info,
    /// List the tables of the database
    Tables,
    /// Show the mapped columns of a table
    Schema { table: String },
    /// Show one record by id
    Get { table: String, id: i64 },
    /// Filter, sort and page through a table
    Query {
        table: String,
        /// Filter as KEY=VALUE; KEY may carry a comparator prefix (`>qty=2`)
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Filter KEY against NULL
        #[arg(long = "null", value_name = "KEY")]
        nulls: Vec<String>,
        /// Sort key, optionally suffixed with `:desc`
        #[arg(long = "sort", value_name = "KEY[:desc]")]
        sorts: Vec<String>,
        #[arg(long, default_value_t = rowset::record_set::DEFAULT_PAGE_SIZE)]
        page_size: usize,
        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => DatabaseConfig::load_from(path)?,
        None => DatabaseConfig::load()?,
    };
    let db = Database::open(config, Rc::new(MemoryCache::new()))?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Info => {
            let read = db.read()?;
            writeln!(out, "backend:  {}", db.backend()?)?;
            writeln!(out, "database: {}", read.database_name())?;
            writeln!(out, "version:  {}", read.server_version()?)?;
        }
        Command::Tables => {
            let mut tables = db.read()?.list_tables()?;
            tables.sort();
            for table in tables {
                writeln!(out, "{}", table)?;
            }
        }
        Command::Schema { table } => {
            if !db.table_exists(&table)? {
                bail!("no such table: {}", table);
            }
            writeln!(out, "{}", db.columns_for(&table)?.to_text(0)?)?;
        }
        Command::Get { table, id } => {
            let mut record = Record::new(&db, &table, id);
            if !record.is_found()? {
                bail!("{} {} not found", table, id);
            }
            writeln!(out, "{}", record.to_text(0)?)?;
        }
        Command::Query {
            table,
            filters,
            nulls,
            sorts,
            page_size,
            limit,
            format,
        } => {
            let mut set = RecordSet::new(&db, &table).page_size(page_size);
            for filter in &filters {
                let (key, value) = parse_filter(filter)
                    .with_context(|| format!("filter must be KEY=VALUE: {}", filter))?;
                set.add_filter(key, parse_value(value));
            }
            for key in nulls {
                set.add_filter(key, Value::Null);
            }
            for sort in &sorts {
                let (key, direction) = parse_sort(sort)?;
                set = set.sort_by(key, direction);
            }

            let mut rows = Vec::new();
            for record in set.iter().take(limit.unwrap_or(usize::MAX)) {
                rows.push(record?.row()?);
            }
            match format {
                Format::Text => {
                    #[derive(serde::Serialize)]
                    struct Dump<'a> {
                        table: &'a str,
                        filter: &'a rowset::Filters,
                        rows: &'a [rowset::Row],
                    }
                    let dump = Dump {
                        table: set.table(),
                        filter: set.filter_spec(),
                        rows: &rows,
                    };
                    writeln!(out, "{}", rowset::text::to_text(&dump, 0)?)?;
                }
                Format::Json => export::write_json(&mut out, &rows)?,
                Format::Csv => export::write_csv(&mut out, &rows)?,
            }
        }
    }
    Ok(())
}

/// Split `KEY=VALUE` at the first `=` after the comparator prefix.
fn parse_filter(raw: &str) -> Option<(&str, &str)> {
    let prefix = raw.len() - raw.trim_start_matches(['=', '!', '<', '>']).len();
    let split = prefix + raw[prefix..].find('=')?;
    let (key, value) = (&raw[..split], &raw[split + 1..]);
    (split > prefix).then_some((key, value))
}

/// Integers stay integers so numeric comparisons are not made on text.
fn parse_value(raw: &str) -> Value {
    raw.parse::<i64>().map(Value::Int).unwrap_or_else(|_| Value::from(raw))
}

fn parse_sort(raw: &str) -> Result<(&str, Direction)> {
    let (key, direction) = match raw.rsplit_once(':') {
        Some((key, dir)) => match dir.to_lowercase().as_str() {
            "asc" => (key, Direction::Asc),
            "desc" => (key, Direction::Desc),
            other => bail!("unknown sort direction: {}", other),
        },
        None => (raw, Direction::Asc),
    };
    if key.is_empty() {
        bail!("empty sort key");
    }
    Ok((key, direction))
}
