//! Whitespace-separated numeric tables, one row per line.
//!
//! Lines starting with `#` are comments. Values are written with Rust's
//! shortest round-trip float formatting, so reading a table back yields the
//! exact values that were written.

use std::io::{BufRead, Write};

use crate::error::{Result, TransitError};

/// Write a table with an optional `#` header line.
pub fn write_table<W, I>(w: &mut W, header: Option<&str>, rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = Vec<f64>>,
{
    if let Some(header) = header {
        writeln!(w, "# {header}")?;
    }
    for row in rows {
        let line = row
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(w, "{line}")?;
    }
    Ok(())
}

/// Read a table, checking that every row has `columns` values.
pub fn read_table(r: impl BufRead, columns: usize) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for (line_no, line) in r.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row = trimmed
            .split_whitespace()
            .map(|tok| tok.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                TransitError::InvalidArtifact(format!("line {}: {e}", line_no + 1))
            })?;
        if row.len() != columns {
            return Err(TransitError::InvalidArtifact(format!(
                "line {}: expected {columns} columns, found {}",
                line_no + 1,
                row.len()
            )));
        }
        rows.push(row);
    }
    Ok(rows)
}
