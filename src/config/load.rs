// src/config/load.rs

use std::{fs, path::Path};
use tracing::debug;

use super::types::AnalysisConfig;
use crate::error::{AnalysisError, Result};

/// Read, parse and validate a YAML analysis config.
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AnalysisConfig> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(AnalysisError::data_source(
            path,
            "not able to locate the config file",
        ));
    }
    let text = fs::read_to_string(path).map_err(|e| AnalysisError::data_source(path, e))?;
    let cfg = parse_config(&text)?;
    debug!(
        regions = cfg.region.len(),
        years = cfg.year.len(),
        fields = cfg.analysis_fields.len(),
        "loaded config"
    );
    Ok(cfg)
}

/// Parse and validate a config from YAML text.
pub fn parse_config(text: &str) -> Result<AnalysisConfig> {
    let cfg: AnalysisConfig =
        serde_yaml::from_str(text).map_err(|e| AnalysisError::config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}
