//! CSV import of client records.
//!
//! Rows are validated one by one and buffered; full buffers are written with a
//! single batch insert. If a batch insert fails, its rows are retried one at a
//! time so a single bad row cannot sink its neighbours.

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::client_store::ClientStore;
use crate::errors::AppError;
use crate::models::{ImportStats, NewClient};

/// Rows per batch insert.
pub const BATCH_SIZE: usize = 500;

/// Maximum number of error messages kept in [`ImportStats::errors`].
pub const MAX_REPORTED_ERRORS: usize = 20;

/// Birth date formats accepted in CSV files, tried in order.
const BIRTH_DATE_FORMATS: [&str; 4] = ["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Columns that are never copied into the feature bag.
const BASE_FIELDS: [&str; 8] = [
    "first_name",
    "last_name",
    "middle_name",
    "birth_date",
    "phone",
    "email",
    "address",
    "user_id",
];

/// Cell values treated as "no data".
const NULL_TOKENS: [&str; 5] = ["", "nan", "NaN", "null", "None"];

/// Accumulates import results while rows are processed.
#[derive(Debug, Default)]
struct ImportReport {
    success_count: usize,
    failure_count: usize,
    errors: Vec<String>,
}

impl ImportReport {
    fn add_error(&mut self, line: usize, message: impl std::fmt::Display) {
        self.failure_count += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("Line {}: {}", line, message));
        }
    }

    fn finish(self) -> ImportStats {
        let mut errors = self.errors;
        let hidden = self.failure_count.saturating_sub(errors.len());
        if hidden > 0 {
            errors.push(format!("... and {} more errors", hidden));
        }

        ImportStats {
            success_count: self.success_count,
            failure_count: self.failure_count,
            total: self.success_count + self.failure_count,
            errors,
        }
    }
}

/// A validated row waiting for insertion, with its source line.
struct PendingRow {
    line: usize,
    client: NewClient,
}

/// Streams CSV rows into the client store.
#[derive(Clone)]
pub struct ImportService {
    store: Arc<dyn ClientStore>,
    batch_size: usize,
}

impl ImportService {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self::with_batch_size(store, BATCH_SIZE)
    }

    pub fn with_batch_size(store: Arc<dyn ClientStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Imports clients from CSV bytes with a header row.
    ///
    /// Only an unreadable header aborts the import; every other problem is
    /// recorded per line.
    pub async fn import_csv(&self, data: &[u8]) -> Result<ImportStats, AppError> {
        let delimiter = detect_delimiter(data);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::BadRequest(format!("failed to read CSV headers: {}", e)))?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(AppError::BadRequest("CSV file has no header row".to_string()));
        }

        let mut report = ImportReport::default();
        let mut batch: Vec<PendingRow> = Vec::with_capacity(self.batch_size);
        let mut line = 1usize;

        for record in reader.records() {
            let position = match &record {
                Ok(record) => record.position(),
                Err(e) => e.position(),
            };
            line = match position {
                Some(position) => record_start_line(data, position),
                None => line + 1,
            };

            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Failed to read CSV line {}: {}", line, e);
                    report.add_error(line, e);
                    continue;
                }
            };

            let row = make_row_map(&headers, &record);
            match parse_client_row(&row, &headers) {
                Ok(client) => batch.push(PendingRow { line, client }),
                Err(e) => {
                    report.add_error(line, e);
                    continue;
                }
            }

            if batch.len() >= self.batch_size {
                self.insert_batch(std::mem::take(&mut batch), &mut report)
                    .await;
            }
        }

        if !batch.is_empty() {
            self.insert_batch(batch, &mut report).await;
        }

        let stats = report.finish();
        tracing::info!(
            "CSV import completed: {} succeeded, {} failed",
            stats.success_count,
            stats.failure_count
        );
        Ok(stats)
    }

    async fn insert_batch(&self, rows: Vec<PendingRow>, report: &mut ImportReport) {
        let clients: Vec<NewClient> = rows.iter().map(|r| r.client.clone()).collect();

        match self.store.batch_create(&clients).await {
            Ok(created) => report.success_count += created,
            Err(e) => {
                tracing::warn!(
                    "Batch insert of {} rows failed, falling back to individual inserts: {}",
                    rows.len(),
                    e
                );
                for row in rows {
                    match self.store.create(&row.client).await {
                        Ok(_) => report.success_count += 1,
                        Err(e) => report.add_error(
                            row.line,
                            format!(
                                "failed to create client {} {}: {}",
                                row.client.first_name, row.client.last_name, e
                            ),
                        ),
                    }
                }
            }
        }
    }
}

/// Picks `;` when the header line contains one, `,` otherwise.
pub fn detect_delimiter(data: &[u8]) -> u8 {
    let header_line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    if header_line.contains(&b';') {
        b';'
    } else {
        b','
    }
}

/// Physical line a record starts on. The reader records its position before
/// skipping blank lines, so those are counted here.
fn record_start_line(data: &[u8], position: &csv::Position) -> usize {
    let start = usize::try_from(position.byte())
        .unwrap_or(data.len())
        .min(data.len());
    let skipped = data[start..]
        .iter()
        .take_while(|b| matches!(b, b'\r' | b'\n'))
        .filter(|b| **b == b'\n')
        .count();
    usize::try_from(position.line()).unwrap_or(usize::MAX).saturating_add(skipped)
}

fn make_row_map(headers: &[String], record: &csv::StringRecord) -> HashMap<String, String> {
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let value = record.get(i).unwrap_or("").trim().to_string();
            (header.clone(), value)
        })
        .collect()
}

/// Validates one row and converts it into a client.
pub fn parse_client_row(
    row: &HashMap<String, String>,
    headers: &[String],
) -> Result<NewClient, String> {
    let first_name = required(row, "first_name")?;
    let last_name = required(row, "last_name")?;
    let birth_date = parse_birth_date(&required(row, "birth_date")?)?;

    let middle_name = row
        .get("middle_name")
        .filter(|m| !m.is_empty())
        .cloned();

    let features = extract_row_features(row, headers);

    Ok(NewClient {
        first_name,
        last_name,
        middle_name,
        birth_date,
        features: (!features.is_empty()).then_some(Value::Object(features)),
    })
}

fn required(row: &HashMap<String, String>, field: &str) -> Result<String, String> {
    match row.get(field) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(format!("{} is required", field)),
    }
}

/// Parses a birth date in day-month-year or year-month-day order.
pub fn parse_birth_date(value: &str) -> Result<NaiveDate, String> {
    BIRTH_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            format!(
                "invalid birth_date format: {} (expected DD-MM-YYYY or YYYY-MM-DD)",
                value
            )
        })
}

/// Copies every non-base column into the feature bag.
pub fn extract_row_features(row: &HashMap<String, String>, headers: &[String]) -> Map<String, Value> {
    let mut features = Map::new();

    for header in headers {
        if header.is_empty() || BASE_FIELDS.contains(&header.as_str()) {
            continue;
        }
        let value = row.get(header).map(String::as_str).unwrap_or("");
        features.insert(header.clone(), feature_cell(value));
    }

    features
}

/// Null tokens become `0.0`, numbers (decimal comma allowed) become floats,
/// anything else stays text.
pub fn feature_cell(value: &str) -> Value {
    if NULL_TOKENS.contains(&value) {
        return Value::from(0.0);
    }

    let normalized = value.replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(number) => Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string())),
        Err(_) => Value::String(value.to_string()),
    }
}
