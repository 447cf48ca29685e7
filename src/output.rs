// bcctl - CLI for the BigCommerce catalog REST API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use std::{fs, path::PathBuf};

pub const EMPTY_MESSAGE: &str = "No resources found.";

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Tsv,
}

#[derive(Clone, Debug, Default)]
pub struct RenderOpts {
    pub sort_by: Option<String>,
    pub filter: Option<String>,
    pub file: Option<PathBuf>,
}

/// Header plus string cells, shared by the table, CSV and TSV renderers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Keeps rows with a cell containing `filter` (case-insensitive) and
    /// sorts by the `sort_by` column when it exists.
    pub fn refine(mut self, opts: &RenderOpts) -> Self {
        if let Some(needle) = opts.filter.as_ref().map(|f| f.to_lowercase()) {
            self.rows
                .retain(|row| row.iter().any(|cell| cell.to_lowercase().contains(&needle)));
        }
        if let Some(sort) = &opts.sort_by {
            match self.headers.iter().position(|h| h == sort) {
                Some(idx) => self.rows.sort_by(|a, b| a[idx].cmp(&b[idx])),
                None => tracing::warn!(column = sort.as_str(), "unknown --sort-by column"),
            }
        }
        self
    }
}

/// Renders results in the selected format and writes them to stdout or
/// `--file`.
#[derive(Clone, Debug, Default)]
pub struct Output {
    pub format: OutputFormat,
    pub opts: RenderOpts,
}

impl Output {
    /// `json` is rendered as-is for `-o json`; every other format uses
    /// `table`.
    pub fn render<T: Serialize + ?Sized>(&self, table: Table, json: &T) -> Result<()> {
        let text = match self.format {
            OutputFormat::Json => render_json(json)?,
            OutputFormat::Table => render_table(&table.refine(&self.opts)),
            OutputFormat::Csv => render_delimited(&table.refine(&self.opts), b',')?,
            OutputFormat::Tsv => render_delimited(&table.refine(&self.opts), b'\t')?,
        };
        self.emit(&text)
    }

    /// Field/value layout for a single entity.
    pub fn render_record<T: Serialize + ?Sized>(&self, table: Table, json: &T) -> Result<()> {
        match self.format {
            OutputFormat::Table => self.emit(&render_vertical(&table)),
            _ => self.render(table, json),
        }
    }

    pub fn emit(&self, text: &str) -> Result<()> {
        match &self.opts.file {
            Some(path) => {
                fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
                tracing::info!(path = %path.display(), "wrote output");
            }
            None => {
                print!("{text}");
                if !text.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}

pub fn render_table(table: &Table) -> String {
    if table.rows.is_empty() {
        return format!("{EMPTY_MESSAGE}\n");
    }

    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    push_line(&mut out, &table.headers, &widths);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &separator, &widths);
    for row in &table.rows {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Two columns: header name, then the first row's value.
pub fn render_vertical(table: &Table) -> String {
    let Some(row) = table.rows.first() else {
        return format!("{EMPTY_MESSAGE}\n");
    };
    let width = table
        .headers
        .iter()
        .map(|h| h.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (header, value) in table.headers.iter().zip(row) {
        let line = format!("{:width$}  {}", header, value, width = width);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// CSV quotes every field; TSV (`\t`) only quotes where needed.
pub fn render_delimited(table: &Table, delimiter: u8) -> Result<String> {
    let quote_style = if delimiter == b',' {
        csv::QuoteStyle::Always
    } else {
        csv::QuoteStyle::Necessary
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(quote_style)
        .from_writer(Vec::new());

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().context("flushing delimited output")?;
    String::from_utf8(bytes).context("delimited output is not UTF-8")
}

/// Pretty JSON with four-space indentation.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(format!("{}\n", to_json_string(value)?))
}

pub fn to_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).context("serializing JSON")?;
    String::from_utf8(buf).context("JSON output is not UTF-8")
}

pub fn value_to_str(value: &Value) -> String {
    match value {
        Value::Null => "".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Cell text for an optional value; `None` renders as an empty cell.
pub fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// `1,2,3`
pub fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",")
}
