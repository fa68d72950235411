//! Declarative aggregation of crash (CAS) records into time-series and
//! spatial summaries, optionally normalized by census population.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod query;
pub mod rank;
pub mod report;
pub mod trend;

pub use aggregate::{aggregate, CellKey, PER_CAPITA_SCALE};
pub use config::{load_config, AnalysisConfig, ConstraintValue, FieldSpec};
pub use data::{crash_region_label, load_dataset, PopulationIndex, RecordStore};
pub use dispatch::{run_spatial, run_temporal, Dispatcher, SpatialTable, TimeSeriesTable};
pub use error::{AnalysisError, Result};
pub use logging::LogContext;
pub use query::{compile_field, FieldQuery};
pub use rank::{rank, ranked_matrix, Ranking};
pub use trend::{fit, TrendCurve};
