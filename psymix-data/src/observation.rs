//! Delimited observation file parser.
//!
//! Reads header-prefixed tab, comma or whitespace delimited files with one
//! observation per row and one indicator variable per column. Supports
//! missing value handling, column selection and an optional row ID column.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use psymix_linalg::DenseMatrix;

/// Column separator, detected from the header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Comma,
    Whitespace,
}

impl Delimiter {
    /// Tab wins over comma, comma over whitespace.
    pub fn detect(header: &str) -> Self {
        if header.contains('\t') {
            Delimiter::Tab
        } else if header.contains(',') {
            Delimiter::Comma
        } else {
            Delimiter::Whitespace
        }
    }

    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Tab => line.split('\t').map(|s| s.trim()).collect(),
            Delimiter::Comma => line.split(',').map(|s| s.trim()).collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// Parsed observations for the selected columns.
#[derive(Debug, Clone)]
pub struct ObservationData {
    /// Row labels: the ID column when given, else the 1-based data row.
    pub row_ids: Vec<String>,
    /// Selected column names in output order.
    pub column_names: Vec<String>,
    /// values[i][j] = observation i, column j (NaN for missing).
    pub values: Vec<Vec<f64>>,
}

impl ObservationData {
    pub fn n_rows(&self) -> usize {
        self.values.len()
    }

    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Stack the given rows into an observation matrix.
    pub fn to_matrix(&self, indices: &[usize]) -> DenseMatrix {
        let d = self.n_columns();
        let mut m = DenseMatrix::zeros(indices.len(), d);
        for (r, &i) in indices.iter().enumerate() {
            for (j, &v) in self.values[i].iter().enumerate() {
                m.set(r, j, v);
            }
        }
        m
    }
}

/// Parse an observation file.
///
/// # Arguments
/// - `path`: Path to the delimited file
/// - `columns`: Names of the variable columns; empty selects every column
///   except the ID column
/// - `id_column`: Optional name of a row ID column
pub fn parse_observation_file(
    path: &Path,
    columns: &[String],
    id_column: Option<&str>,
) -> Result<ObservationData> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read observation file: {}", path.display()))?;

    let mut lines = contents.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| anyhow!("Empty observation file"))?;
    let delim = Delimiter::detect(header_line);
    let headers = delim.split(header_line);

    let id_idx = match id_column {
        Some(name) => Some(
            headers
                .iter()
                .position(|&h| h == name)
                .ok_or_else(|| anyhow!("ID column '{}' not found in header", name))?,
        ),
        None => None,
    };

    let column_names: Vec<String> = if columns.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != id_idx)
            .map(|(_, h)| h.to_string())
            .collect()
    } else {
        columns.to_vec()
    };
    if column_names.is_empty() {
        bail!("No variable columns selected");
    }

    let col_indices: Vec<usize> = column_names
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|&h| h == name.as_str())
                .ok_or_else(|| anyhow!("Column '{}' not found in header", name))
        })
        .collect::<Result<Vec<_>>>()?;
    let needed = col_indices
        .iter()
        .copied()
        .chain(id_idx)
        .max()
        .unwrap_or(0);

    let mut row_ids = Vec::new();
    let mut values = Vec::new();

    for (line_num, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields = delim.split(line);
        if fields.len() <= needed {
            bail!(
                "Line {} has too few fields (expected at least {})",
                line_num + 2,
                needed + 1
            );
        }

        row_ids.push(match id_idx {
            Some(i) => fields[i].to_string(),
            None => (values.len() + 1).to_string(),
        });
        let row = col_indices
            .iter()
            .zip(column_names.iter())
            .map(|(&ci, name)| {
                parse_value(fields[ci]).ok_or_else(|| {
                    anyhow!(
                        "Line {}: cannot parse '{}' in column '{}' as a number",
                        line_num + 2,
                        fields[ci],
                        name
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        values.push(row);
    }

    Ok(ObservationData {
        row_ids,
        column_names,
        values,
    })
}

/// Parse a field as f64. Missing-value tokens give NaN; anything else that
/// is not a number gives `None`.
fn parse_value(s: &str) -> Option<f64> {
    match s {
        "NA" | "na" | "Na" | "." | "" | "-" | "NaN" | "nan" => Some(f64::NAN),
        _ => s.parse().ok(),
    }
}

/// Rows with every selected value present and finite (listwise deletion).
pub fn complete_case_indices(data: &ObservationData) -> Vec<usize> {
    data.values
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
        .map(|(i, _)| i)
        .collect()
}
