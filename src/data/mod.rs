// src/data/mod.rs
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    error::ArrowError,
    record_batch::RecordBatch,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{
    fs::File,
    io::Seek,
    path::Path,
    sync::Arc,
};
use tracing::info;

use crate::error::{AnalysisError, Result};

pub mod population;
pub mod region;
pub mod store;

pub use population::PopulationIndex;
pub use region::crash_region_label;
pub use store::RecordStore;

/// Year column of the crash (CAS) dataset.
pub const CRASH_YEAR_COLUMN: &str = "crashYear";
/// Region column of the crash dataset, values formatted `"<Name> Region"`.
pub const REGION_COLUMN: &str = "region";

pub const POP_REGION_COLUMN: &str = "Region";
pub const POP_MEASURE_COLUMN: &str = "Measure";
pub const POP_CENSUS_YEAR_COLUMN: &str = "Census year";
pub const POP_VALUE_COLUMN: &str = "Value";

/// The population measure used for per-capita normalization.
pub const POPULATION_MEASURE: &str = "Census usually resident population count";

const CSV_BATCH_ROWS: usize = 65_536;

/// Load a whole dataset into one in-memory batch.
///
/// `.csv` files get their schema inferred from the header and every row;
/// `.parquet` files carry their own. Anything else is rejected.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(AnalysisError::data_source(
            path,
            "not able to locate the dataset",
        ));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let batch = match ext.as_deref() {
        Some("csv") => read_csv(path),
        Some("parquet") => read_parquet(path),
        _ => {
            return Err(AnalysisError::data_source(
                path,
                "unsupported format, only CSV and Parquet are supported",
            ))
        }
    }
    .map_err(|e| match e {
        e @ AnalysisError::DataSource { .. } => e,
        other => AnalysisError::data_source(path, other),
    })?;

    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "dataset loaded"
    );
    Ok(batch)
}

fn read_csv(path: &Path) -> Result<RecordBatch> {
    let mut file = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(CSV_BATCH_ROWS)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn csv_schema_is_inferred() -> anyhow::Result<()> {
        let mut tmp = Builder::new().suffix(".csv").tempfile()?;
        write!(
            tmp,
            "crashYear,region,bicycle,urban\n2020,Auckland Region,1,Urban\n2021,Otago Region,0,Open\n"
        )?;
        let batch = load_dataset(tmp.path())?;
        assert_eq!(batch.num_rows(), 2);
        let schema = batch.schema();
        assert_eq!(schema.field_with_name(CRASH_YEAR_COLUMN)?.data_type(), &DataType::Int64);
        assert_eq!(schema.field_with_name(REGION_COLUMN)?.data_type(), &DataType::Utf8);
        Ok(())
    }

    #[test]
    fn missing_and_unsupported_files_are_data_source_errors() -> anyhow::Result<()> {
        let err = load_dataset("/no/such/cas.csv").unwrap_err();
        assert!(matches!(err, AnalysisError::DataSource { .. }));

        let tmp = Builder::new().suffix(".xlsx").tempfile()?;
        let err = load_dataset(tmp.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::DataSource { ref reason, .. } if reason.contains("unsupported")));
        Ok(())
    }
}
