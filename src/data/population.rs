// src/data/population.rs

use arrow::{
    array::{Array, Float64Array, StringArray},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::{collections::HashMap, path::Path};
use tracing::debug;

use super::{
    load_dataset, POPULATION_MEASURE, POP_CENSUS_YEAR_COLUMN, POP_MEASURE_COLUMN,
    POP_REGION_COLUMN, POP_VALUE_COLUMN,
};
use crate::error::{AnalysisError, Result};

/// (plain region name, measure, census year as text)
type PopulationKey = (String, String, String);

/// Read-only population counts keyed by region, measure and census year.
///
/// Duplicate keys are kept rather than collapsed so a lookup can refuse
/// to pick between them.
#[derive(Debug, Clone, Default)]
pub struct PopulationIndex {
    values: HashMap<PopulationKey, Vec<f64>>,
}

impl PopulationIndex {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let batch = load_dataset(path)?;
        Self::from_batch(&batch).map_err(|e| AnalysisError::data_source(path, e))
    }

    /// Build from a table with `Region`, `Measure`, `Census year` and `Value`
    /// columns. Census years stored as integers are rendered to text.
    /// Rows with any null key or value are skipped.
    pub fn from_batch(batch: &RecordBatch) -> Result<Self> {
        let region = text_column(batch, POP_REGION_COLUMN)?;
        let measure = text_column(batch, POP_MEASURE_COLUMN)?;
        let census_year = text_column(batch, POP_CENSUS_YEAR_COLUMN)?;
        let value = value_column(batch, POP_VALUE_COLUMN)?;

        let mut values: HashMap<PopulationKey, Vec<f64>> = HashMap::new();
        let mut skipped = 0usize;
        for i in 0..batch.num_rows() {
            if region.is_null(i) || measure.is_null(i) || census_year.is_null(i) || value.is_null(i)
            {
                skipped += 1;
                continue;
            }
            values
                .entry((
                    region.value(i).to_string(),
                    measure.value(i).to_string(),
                    census_year.value(i).to_string(),
                ))
                .or_default()
                .push(value.value(i));
        }
        debug!(keys = values.len(), skipped, "population index built");
        Ok(Self { values })
    }

    pub fn from_rows<I, R, M, Y>(rows: I) -> Self
    where
        I: IntoIterator<Item = (R, M, Y, f64)>,
        R: Into<String>,
        M: Into<String>,
        Y: Into<String>,
    {
        let mut values: HashMap<PopulationKey, Vec<f64>> = HashMap::new();
        for (r, m, y, v) in rows {
            values
                .entry((r.into(), m.into(), y.into()))
                .or_default()
                .push(v);
        }
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resident population of `region` (plain name) in census `year`.
    pub fn lookup(&self, region: &str, year: i64) -> Result<f64> {
        self.lookup_measure(region, POPULATION_MEASURE, year)
    }

    /// Exactly one row must match and its value must be a positive count;
    /// anything else is a lookup error.
    pub fn lookup_measure(&self, region: &str, measure: &str, year: i64) -> Result<f64> {
        let key = (region.to_string(), measure.to_string(), year.to_string());
        match self.values.get(&key).map(Vec::as_slice) {
            Some([v]) if v.is_finite() && *v > 0.0 => Ok(*v),
            Some([v]) => Err(AnalysisError::Lookup {
                region: region.to_string(),
                year,
                reason: format!("population must be positive, found {v}"),
            }),
            None | Some([]) => Err(AnalysisError::Lookup {
                region: region.to_string(),
                year,
                reason: format!("no `{measure}` row"),
            }),
            Some(many) => Err(AnalysisError::Lookup {
                region: region.to_string(),
                year,
                reason: format!("{} `{measure}` rows, expected exactly one", many.len()),
            }),
        }
    }
}

fn text_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let idx = batch.schema().index_of(name).map_err(|_| {
        AnalysisError::config(format!("population dataset has no `{name}` column"))
    })?;
    let col = cast(batch.column(idx), &DataType::Utf8)?;
    col.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| AnalysisError::config(format!("population column `{name}` is not text")))
}

fn value_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let idx = batch.schema().index_of(name).map_err(|_| {
        AnalysisError::config(format!("population dataset has no `{name}` column"))
    })?;
    let col = cast(batch.column(idx), &DataType::Float64)?;
    col.as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| AnalysisError::config(format!("population column `{name}` is not numeric")))
}
