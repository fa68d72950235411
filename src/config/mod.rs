pub mod load;
pub mod types;

pub use load::{load_config, parse_config};
pub use types::{AnalysisConfig, ConstraintValue, FieldSpec, DEFAULT_WORKERS};
