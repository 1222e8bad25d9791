//! CSV ingest and normalization.
//!
//! Turns a yearly observation CSV into a clean, sorted `YearRow` table that is
//! safe to hand to the estimators.
//!
//! Design goals:
//! - strict schema for required columns (clear errors, exit code 2)
//! - row-level validation (skip bad rows, but report what happened)
//! - deterministic behavior, no hidden normalization beyond sorting by year

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::YearRow;
use crate::error::ModelError;

const REQUIRED_COLUMNS: [&str; 5] = [
    "year",
    "population",
    "total_deaths",
    "suicide_deaths",
    "t_obs",
];

/// Summary stats about the rows actually used.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub year_min: i32,
    pub year_max: i32,
    pub population_min: f64,
    pub population_max: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: sorted rows + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedTable {
    pub rows: Vec<YearRow>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load and validate the yearly table from a CSV file.
///
/// Expected columns: `year, population, total_deaths, suicide_deaths, t_obs`
/// (`in_treatment` is accepted as an alias for `t_obs`). Rows are sorted by
/// year on the way out; duplicate years are a hard error.
pub fn load_year_rows(path: &Path) -> Result<IngestedTable, ModelError> {
    let file = File::open(path)
        .map_err(|e| ModelError::Io(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| ModelError::MalformedInput(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_required_columns(&header_map)?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if rows.is_empty() {
        return Err(ModelError::InsufficientData(
            "No valid rows remain after validation.".to_string(),
        ));
    }

    rows.sort_by_key(|r| r.year);
    for w in rows.windows(2) {
        if w[1].year == w[0].year {
            return Err(ModelError::MalformedInput(format!(
                "Duplicate year {} in input table.",
                w[0].year
            )));
        }
    }

    let stats = compute_stats(&rows);
    let rows_used = rows.len();

    Ok(IngestedTable {
        rows,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel-style UTF-8 exports sometimes carry a BOM on the first header;
    // without stripping it the schema check would report `year` as missing.
    let name = name.trim().trim_start_matches('\u{feff}');
    let name = name.to_ascii_lowercase();
    if name == "in_treatment" {
        "t_obs".to_string()
    } else {
        name
    }
}

fn ensure_required_columns(header_map: &HashMap<String, usize>) -> Result<(), ModelError> {
    for name in REQUIRED_COLUMNS {
        if !header_map.contains_key(name) {
            return Err(ModelError::MalformedInput(format!(
                "Missing required column: `{name}`"
            )));
        }
    }
    Ok(())
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<YearRow, String> {
    let year_raw = get_required(record, header_map, "year")?;
    let year: i32 = year_raw
        .parse()
        .map_err(|_| format!("Invalid `year` value '{year_raw}'."))?;

    let population = parse_f64(record, header_map, "population")?;
    let total_deaths = parse_f64(record, header_map, "total_deaths")?;
    let suicide_deaths = parse_f64(record, header_map, "suicide_deaths")?;
    let t_obs = parse_f64(record, header_map, "t_obs")?;

    if population <= 0.0 {
        return Err("`population` must be > 0.".to_string());
    }
    for (name, value) in [
        ("total_deaths", total_deaths),
        ("suicide_deaths", suicide_deaths),
        ("t_obs", t_obs),
    ] {
        if value < 0.0 {
            return Err(format!("`{name}` must be >= 0."));
        }
    }
    if suicide_deaths > total_deaths {
        return Err("`suicide_deaths` exceeds `total_deaths`.".to_string());
    }

    Ok(YearRow {
        year,
        population,
        total_deaths,
        suicide_deaths,
        t_obs,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_f64(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<f64, String> {
    let raw = get_required(record, header_map, name)?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("Invalid `{name}` value '{raw}'."))?;
    if !value.is_finite() {
        return Err(format!("Non-finite `{name}` value."));
    }
    Ok(value)
}

fn compute_stats(rows: &[YearRow]) -> DatasetStats {
    let mut population_min = f64::INFINITY;
    let mut population_max = f64::NEG_INFINITY;
    for r in rows {
        population_min = population_min.min(r.population);
        population_max = population_max.max(r.population);
    }
    DatasetStats {
        n_rows: rows.len(),
        year_min: rows[0].year,
        year_max: rows[rows.len() - 1].year,
        population_min,
        population_max,
    }
}
