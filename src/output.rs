use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::dataset::RiskDataset;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
    Table,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Table => "txt",
        }
    }
}

/// Row shape of the exported dataset.
#[derive(Debug, Serialize)]
struct OutputRecord<'a> {
    country: &'a str,
    areas_with_malaria: &'a str,
    estimated_risk: &'a str,
    iso_a3: Option<&'a str>,
}

fn records(dataset: &RiskDataset) -> impl Iterator<Item = OutputRecord<'_>> {
    dataset.rows().iter().map(|r| OutputRecord {
        country: &r.country,
        areas_with_malaria: &r.areas_with_malaria,
        estimated_risk: r.estimated_risk.as_str(),
        iso_a3: r.iso_a3.as_deref(),
    })
}

pub fn write_dataset<W: Write>(dataset: &RiskDataset, format: OutputFormat, out: W) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(dataset, out),
        OutputFormat::Json => write_json(dataset, out),
        OutputFormat::Table => write_table(dataset, out),
    }
}

pub fn write_csv<W: Write>(dataset: &RiskDataset, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    if dataset.is_empty() {
        writer.write_record(["country", "areas_with_malaria", "estimated_risk", "iso_a3"])?;
    }
    for record in records(dataset) {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(dataset: &RiskDataset, mut out: W) -> Result<()> {
    let rows: Vec<OutputRecord> = records(dataset).collect();
    serde_json::to_writer_pretty(&mut out, &rows)?;
    writeln!(out)?;
    Ok(())
}

/// Fixed-width text table for reading in a terminal.
pub fn write_table<W: Write>(dataset: &RiskDataset, mut out: W) -> Result<()> {
    let headers = ["iso_a3", "country", "estimated_risk", "areas_with_malaria"];
    let rows: Vec<[String; 4]> = records(dataset)
        .map(|r| {
            [
                r.iso_a3.unwrap_or("-").to_string(),
                r.country.to_string(),
                r.estimated_risk.to_string(),
                r.areas_with_malaria.to_string(),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 4]| -> String {
        let mut s = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i == cells.len() - 1 {
                s.push_str(cell);
            } else {
                let pad = widths[i] - cell.chars().count();
                s.push_str(cell);
                s.push_str(&" ".repeat(pad + 2));
            }
        }
        s.trim_end().to_string()
    };

    writeln!(out, "{}", line(headers))?;
    for row in &rows {
        writeln!(out, "{}", line([&row[0], &row[1], &row[2], &row[3]]))?;
    }
    writeln!(out, "({} rows)", rows.len())?;
    Ok(())
}

/// `<dir>/malaria_risk_<timestamp>.<ext>`
pub fn default_output_path(dir: &Path, format: OutputFormat) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("malaria_risk_{}.{}", timestamp, format.extension()))
}

pub fn write_dataset_to_file(dataset: &RiskDataset, format: OutputFormat, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    write_dataset(dataset, format, std::io::BufWriter::new(file))
}
