// Training dataset loading
// Reads a CSV with a header row and extracts one feature and one target column

use std::path::Path;

use crate::errors::{Result, ServiceError};

/// Feature/target pairs in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature: String,
    pub target: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> (Vec<f64>, Vec<f64>) {
        indices.iter().map(|&i| (self.x[i], self.y[i])).unzip()
    }
}

/// Load `feature` and `target` columns from a CSV file.
///
/// Extra columns are ignored. Missing columns, blank or non-numeric cells
/// and an empty file are all `Dataset` errors.
pub fn load_csv(path: &Path, feature: &str, target: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ServiceError::Dataset(format!("cannot open {}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| ServiceError::Dataset(format!("cannot read header: {}", e)))?
        .clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            ServiceError::Dataset(format!(
                "missing required column '{}' (found: {})",
                name,
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })
    };
    let feature_idx = column(feature)?;
    let target_idx = column(target)?;

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row, record) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = row + 2;
        let record =
            record.map_err(|e| ServiceError::Dataset(format!("line {}: {}", line, e)))?;
        x.push(parse_cell(&record, feature_idx, feature, line)?);
        y.push(parse_cell(&record, target_idx, target, line)?);
    }

    if x.is_empty() {
        return Err(ServiceError::Dataset(format!(
            "{} contains no data rows",
            path.display()
        )));
    }

    tracing::info!(path = %path.display(), rows = x.len(), "Loaded dataset");
    Ok(Dataset {
        feature: feature.to_string(),
        target: target.to_string(),
        x,
        y,
    })
}

fn parse_cell(record: &csv::StringRecord, idx: usize, name: &str, line: usize) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("");
    let value: f64 = raw.parse().map_err(|_| {
        ServiceError::Dataset(format!(
            "line {}: column '{}' is not numeric ('{}')",
            line, name, raw
        ))
    })?;
    if !value.is_finite() {
        return Err(ServiceError::Dataset(format!(
            "line {}: column '{}' is not finite",
            line, name
        )));
    }
    Ok(value)
}
