// src/aggregate/mod.rs

use serde::Serialize;
use std::fmt;

use crate::data::{PopulationIndex, RecordStore};
use crate::error::Result;
use crate::query::FieldQuery;

/// Per-capita values are expressed per this many residents.
pub const PER_CAPITA_SCALE: f64 = 100_000.0;

/// Identity of one aggregation cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellKey {
    pub field: String,
    pub region: String,
    pub year: i64,
}

impl CellKey {
    pub fn new(field: &str, region: &str, year: i64) -> Self {
        Self {
            field: field.to_string(),
            region: region.to_string(),
            year,
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.field, self.region, self.year)
    }
}

/// Filtered sum of `query.target_column` for one region and year.
///
/// `region` is the plain name; the crash-side `"<Name> Region"` label is
/// derived by the store. With `use_population` and a population index the
/// sum is divided by the region's census count for `year` and scaled to
/// occurrences per [`PER_CAPITA_SCALE`] residents. Otherwise the raw sum
/// is returned.
pub fn aggregate(
    store: &RecordStore,
    population: Option<&PopulationIndex>,
    query: &FieldQuery,
    region: &str,
    year: i64,
    use_population: bool,
) -> Result<f64> {
    let mut rows = store
        .project(&query.projection())?
        .filter_year(year)?
        .filter_region(region)?;
    for (column, value) in &query.constraints {
        rows = rows.filter_eq(column, value)?;
    }
    let total = rows.sum(&query.target_column)?;

    match population {
        Some(index) if use_population => {
            let divisor = index.lookup(region, year)?;
            Ok(total / divisor * PER_CAPITA_SCALE)
        }
        _ => Ok(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;
    use crate::data::{CRASH_YEAR_COLUMN, POPULATION_MEASURE, REGION_COLUMN};
    use crate::error::AnalysisError;
    use crate::query::compile_field;
    use arrow::{
        array::{Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
        record_batch::RecordBatch,
    };
    use std::sync::Arc;

    fn store() -> RecordStore {
        let schema = Arc::new(Schema::new(vec![
            Field::new(CRASH_YEAR_COLUMN, DataType::Int64, false),
            Field::new(REGION_COLUMN, DataType::Utf8, false),
            Field::new("bicycle", DataType::Int64, false),
            Field::new("urban", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![2020, 2020, 2021, 2020])),
                Arc::new(StringArray::from(vec![
                    "Auckland Region",
                    "Auckland Region",
                    "Auckland Region",
                    "Otago Region",
                ])),
                Arc::new(Int64Array::from(vec![1, 0, 1, 5])),
                Arc::new(StringArray::from(vec!["Urban", "Open", "Urban", "Urban"])),
            ],
        )
        .unwrap();
        RecordStore::new(batch)
    }

    fn bike() -> FieldQuery {
        compile_field("bike", &FieldSpec::new("bicycle", Vec::<(&str, &str)>::new())).unwrap()
    }

    fn population() -> PopulationIndex {
        PopulationIndex::from_rows([("Auckland", POPULATION_MEASURE, "2020", 1_000_000.0)])
    }

    #[test]
    fn raw_sum_per_region_and_year() {
        let s = store();
        assert_eq!(aggregate(&s, None, &bike(), "Auckland", 2020, false).unwrap(), 1.0);
        assert_eq!(aggregate(&s, None, &bike(), "Auckland", 2021, false).unwrap(), 1.0);
        assert_eq!(aggregate(&s, None, &bike(), "Otago", 2020, false).unwrap(), 5.0);
        assert_eq!(aggregate(&s, None, &bike(), "Otago", 2021, false).unwrap(), 0.0);
    }

    #[test]
    fn constraints_narrow_the_sum() {
        let q = compile_field("bike_open", &FieldSpec::new("bicycle", [("urban", "Open")])).unwrap();
        assert_eq!(aggregate(&store(), None, &q, "Auckland", 2020, false).unwrap(), 0.0);
        let q = compile_field("bike_urban", &FieldSpec::new("bicycle", [("urban", "Urban")])).unwrap();
        assert_eq!(aggregate(&store(), None, &q, "Auckland", 2020, false).unwrap(), 1.0);
    }

    #[test]
    fn per_capita_divides_and_scales() {
        let v = aggregate(&store(), Some(&population()), &bike(), "Auckland", 2020, true).unwrap();
        assert!((v - 0.1).abs() < 1e-12);
    }

    #[test]
    fn normalization_off_ignores_population() {
        let pop = population();
        let with = aggregate(&store(), Some(&pop), &bike(), "Auckland", 2020, false).unwrap();
        let without = aggregate(&store(), None, &bike(), "Auckland", 2020, false).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn missing_population_row_fails() {
        let err =
            aggregate(&store(), Some(&population()), &bike(), "Otago", 2020, true).unwrap_err();
        assert!(matches!(err, AnalysisError::Lookup { ref region, year: 2020, .. } if region == "Otago"));
    }
}
