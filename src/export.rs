//! Result output for the command line: text, JSON or CSV on stdout

use anyhow::Result;
use clap::ValueEnum;
use rowset::Row;
use std::io::Write;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Tab-indented JSON, as `to_text` produces it
    #[default]
    Text,
    /// Compact JSON, one document
    Json,
    Csv,
}

/// Write rows as CSV. The header is the column list of the first row.
pub fn write_csv(out: impl Write, rows: &[Row]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    let Some(first) = rows.first() else {
        wtr.flush()?;
        return Ok(());
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|name| match row.get(*name) {
                Some(value) if !value.is_null() => value.to_sql_text(),
                _ => String::new(),
            })
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json(mut out: impl Write, rows: &[Row]) -> Result<()> {
    serde_json::to_writer(&mut out, rows)?;
    writeln!(out)?;
    Ok(())
}
