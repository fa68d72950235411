// src/data/store.rs

use arrow::{
    array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, Scalar, StringArray},
    compute::{cast, filter_record_batch, kernels::cmp::eq},
    datatypes::{DataType, SchemaRef},
    record_batch::RecordBatch,
};
use std::{path::Path, sync::Arc};

use super::{load_dataset, region::crash_region_label, CRASH_YEAR_COLUMN, REGION_COLUMN};
use crate::config::ConstraintValue;
use crate::error::{AnalysisError, Result};

/// Read-only in-memory view over the crash records.
///
/// Every operation returns a new store; the underlying Arrow buffers are
/// shared, so projections and filters never copy the source table and the
/// store can be handed to any number of worker threads.
#[derive(Debug, Clone)]
pub struct RecordStore {
    batch: RecordBatch,
}

impl RecordStore {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(load_dataset(path)?))
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.batch
            .schema()
            .field_with_name(name)
            .ok()
            .map(|f| f.data_type().clone())
    }

    fn column(&self, name: &str) -> Result<&ArrayRef> {
        let idx = self.batch.schema().index_of(name).map_err(|_| {
            AnalysisError::query_compile(name, "column not found in crash dataset")
        })?;
        Ok(self.batch.column(idx))
    }

    /// Keep only `columns`, in exactly the order given.
    pub fn project(&self, columns: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let indices = columns
            .iter()
            .map(|c| {
                schema.index_of(c).map_err(|_| {
                    AnalysisError::query_compile(c, "column not found in crash dataset")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(self.batch.project(&indices)?))
    }

    /// Keep rows where `column == value`. The literal is coerced to the
    /// column's type; a literal that cannot be represented matches nothing.
    pub fn filter_eq(&self, column: &str, value: &ConstraintValue) -> Result<Self> {
        let col = self.column(column)?;
        let col: ArrayRef = match col.data_type() {
            DataType::Dictionary(_, values) => cast(col, values)?,
            _ => Arc::clone(col),
        };

        if let ConstraintValue::Float(x) = value {
            if col.data_type().is_integer() && x.fract() != 0.0 {
                return Ok(Self::new(self.batch.slice(0, 0)));
            }
        }

        let literal = literal_array(value);
        let literal = if literal.data_type() == col.data_type() {
            literal
        } else {
            cast(&literal, col.data_type())?
        };
        let mask: BooleanArray = eq(&col, &Scalar::new(literal))?;
        Ok(Self::new(filter_record_batch(&self.batch, &mask)?))
    }

    pub fn filter_year(&self, year: i64) -> Result<Self> {
        self.filter_eq(CRASH_YEAR_COLUMN, &ConstraintValue::Integer(year))
    }

    /// Filter on a plain region name; the crash-side label is derived here.
    pub fn filter_region(&self, region: &str) -> Result<Self> {
        self.filter_eq(
            REGION_COLUMN,
            &ConstraintValue::Text(crash_region_label(region)),
        )
    }

    /// Sum a numeric or boolean column, skipping nulls and NaN. Empty -> 0.
    pub fn sum(&self, column: &str) -> Result<f64> {
        let col = self.column(column)?;
        if !is_summable(col.data_type()) {
            return Err(AnalysisError::query_compile(
                column,
                format!("cannot sum column of type {}", col.data_type()),
            ));
        }
        let values = cast(col, &DataType::Float64)?;
        let values = values
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| AnalysisError::query_compile(column, "cast to Float64 failed"))?;
        Ok(values.iter().flatten().filter(|v| !v.is_nan()).sum())
    }
}

/// Column types whose values can be added up.
pub fn is_summable(dt: &DataType) -> bool {
    dt.is_numeric() || *dt == DataType::Boolean
}

fn literal_array(value: &ConstraintValue) -> ArrayRef {
    match value {
        ConstraintValue::Bool(b) => Arc::new(BooleanArray::from(vec![*b])),
        ConstraintValue::Integer(i) => Arc::new(Int64Array::from(vec![*i])),
        ConstraintValue::Float(x) => Arc::new(Float64Array::from(vec![*x])),
        ConstraintValue::Text(s) => Arc::new(StringArray::from(vec![s.as_str()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};

    fn store() -> RecordStore {
        let schema = Arc::new(Schema::new(vec![
            Field::new("bicycle", DataType::Int64, true),
            Field::new(CRASH_YEAR_COLUMN, DataType::Int64, false),
            Field::new(REGION_COLUMN, DataType::Utf8, false),
            Field::new("urban", DataType::Utf8, true),
            Field::new("speedLimit", DataType::Float64, true),
            Field::new("holiday", DataType::Boolean, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2), None, Some(4)])),
                Arc::new(Int64Array::from(vec![2020, 2020, 2020, 2021])),
                Arc::new(StringArray::from(vec![
                    "Auckland Region",
                    "Auckland Region",
                    "Otago Region",
                    "Auckland Region",
                ])),
                Arc::new(StringArray::from(vec![
                    Some("Urban"),
                    Some("Open"),
                    Some("Urban"),
                    None,
                ])),
                Arc::new(Float64Array::from(vec![50.0, 100.0, 50.0, 30.0])),
                Arc::new(BooleanArray::from(vec![true, false, true, true])),
            ],
        )
        .unwrap();
        RecordStore::new(batch)
    }

    #[test]
    fn project_keeps_requested_order() {
        let p = store()
            .project(&["urban", CRASH_YEAR_COLUMN, "bicycle"])
            .unwrap();
        let names: Vec<String> = p.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["urban", CRASH_YEAR_COLUMN, "bicycle"]);
        assert_eq!(p.num_rows(), 4);
    }

    #[test]
    fn project_unknown_column_fails() {
        let err = store().project(&["nope"]).unwrap_err();
        assert!(matches!(err, AnalysisError::QueryCompile { ref field, .. } if field == "nope"));
    }

    #[test]
    fn region_filter_uses_suffixed_label() {
        let s = store().filter_region("Auckland").unwrap();
        assert_eq!(s.num_rows(), 3);
        assert_eq!(store().filter_region("Auckland Region").unwrap().num_rows(), 0);
    }

    #[test]
    fn filters_compose_and_sum_skips_nulls() {
        let s = store().filter_year(2020).unwrap();
        assert_eq!(s.sum("bicycle").unwrap(), 3.0);
        let s = s.filter_eq("urban", &"Urban".into()).unwrap();
        assert_eq!(s.num_rows(), 2);
        assert_eq!(s.sum("bicycle").unwrap(), 1.0);
    }

    #[test]
    fn literals_are_coerced_to_column_type() {
        assert_eq!(store().filter_eq("speedLimit", &50i64.into()).unwrap().num_rows(), 2);
        assert_eq!(store().filter_eq(CRASH_YEAR_COLUMN, &2021.0f64.into()).unwrap().num_rows(), 1);
        assert_eq!(store().filter_eq(CRASH_YEAR_COLUMN, &2020.5f64.into()).unwrap().num_rows(), 0);
        assert_eq!(store().filter_eq("holiday", &true.into()).unwrap().num_rows(), 3);
        // Unparseable text against a numeric column matches nothing.
        assert_eq!(store().filter_eq("speedLimit", &"fast".into()).unwrap().num_rows(), 0);
    }

    #[test]
    fn sum_of_empty_selection_is_zero_and_text_is_rejected() {
        let s = store().filter_region("Nowhere").unwrap();
        assert_eq!(s.sum("bicycle").unwrap(), 0.0);
        assert_eq!(store().sum("holiday").unwrap(), 3.0);
        assert!(matches!(store().sum("urban"), Err(AnalysisError::QueryCompile { .. })));
    }

    #[test]
    fn sum_skips_nan_measurements() {
        let schema = Arc::new(Schema::new(vec![
            Field::new(CRASH_YEAR_COLUMN, DataType::Int64, false),
            Field::new(REGION_COLUMN, DataType::Utf8, false),
            Field::new("speed", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![2020, 2020, 2021])),
                Arc::new(StringArray::from(vec!["Auckland Region"; 3])),
                Arc::new(Float64Array::from(vec![Some(1.5), Some(f64::NAN), Some(2.0)])),
            ],
        )
        .unwrap();
        let s = RecordStore::new(batch);
        assert_eq!(s.filter_year(2020).unwrap().sum("speed").unwrap(), 1.5);
        assert_eq!(s.sum("speed").unwrap(), 3.5);
    }
}
