// src/config/types.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, path::PathBuf};

use crate::error::{AnalysisError, Result};

/// Worker count used when the config does not set `num_workers`.
pub const DEFAULT_WORKERS: usize = 4;

/// A literal a constraint column must equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for ConstraintValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for ConstraintValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for ConstraintValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for ConstraintValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// One `analysis_fields` entry as written in YAML:
///
/// ```yaml
/// bike_urban:
///   bicycle:
///     urban: Urban
/// ```
///
/// The mapping must hold exactly one key (the target column). Its value is
/// either null or an ordered mapping of constraint column to literal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSpec(IndexMap<String, Option<IndexMap<String, ConstraintValue>>>);

impl FieldSpec {
    pub fn new<I, K, V>(target: &str, constraints: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConstraintValue>,
    {
        let constraints: IndexMap<String, ConstraintValue> = constraints
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let value = if constraints.is_empty() {
            None
        } else {
            Some(constraints)
        };
        let mut map = IndexMap::new();
        map.insert(target.to_string(), value);
        Self(map)
    }

    #[cfg(test)]
    pub(crate) fn with_extra_key(mut self, key: &str) -> Self {
        self.0.insert(key.to_string(), None);
        self
    }

    /// Split the spec into its target column and constraint list.
    pub fn entry(&self, field_name: &str) -> Result<(&str, Vec<(&str, &ConstraintValue)>)> {
        if self.0.len() != 1 {
            return Err(AnalysisError::config(format!(
                "analysis field `{}` must have exactly one target column, found {}",
                field_name,
                self.0.len()
            )));
        }
        let (target, constraints) = self
            .0
            .first()
            .ok_or_else(|| AnalysisError::config(format!("analysis field `{field_name}` is empty")))?;
        let constraints = constraints
            .iter()
            .flat_map(|m| m.iter())
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        Ok((target.as_str(), constraints))
    }
}

/// Declarative description of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Plain region names, e.g. `Auckland`; order drives output order.
    pub region: Vec<String>,
    pub year: Vec<i64>,
    pub analysis_fields: IndexMap<String, FieldSpec>,

    // spatial only
    #[serde(default)]
    pub vis_scatter_factor: Option<f64>,
    #[serde(default)]
    pub use_population_data: Option<PathBuf>,
    /// Region coordinates for map rendering. Carried through, never read here.
    #[serde(default)]
    pub latlon_data: Option<PathBuf>,

    #[serde(default)]
    pub num_workers: Option<usize>,
}

impl AnalysisConfig {
    pub fn workers(&self) -> usize {
        self.num_workers.unwrap_or(DEFAULT_WORKERS)
    }

    /// Reject anything that would make aggregation meaningless before a
    /// single cell is computed.
    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            return Err(AnalysisError::config("`region` must list at least one region"));
        }
        if self.year.is_empty() {
            return Err(AnalysisError::config("`year` must list at least one year"));
        }
        if self.analysis_fields.is_empty() {
            return Err(AnalysisError::config(
                "`analysis_fields` must define at least one field",
            ));
        }

        let mut seen = HashSet::new();
        for r in &self.region {
            if !seen.insert(r.as_str()) {
                return Err(AnalysisError::config(format!("duplicate region `{r}`")));
            }
        }
        let mut seen = HashSet::new();
        for y in &self.year {
            if !seen.insert(*y) {
                return Err(AnalysisError::config(format!("duplicate year {y}")));
            }
        }

        for (name, spec) in &self.analysis_fields {
            spec.entry(name)?;
        }

        if self.num_workers == Some(0) {
            return Err(AnalysisError::config("`num_workers` must be at least 1"));
        }
        if let Some(f) = self.vis_scatter_factor {
            if !f.is_finite() {
                return Err(AnalysisError::config("`vis_scatter_factor` must be finite"));
            }
        }
        Ok(())
    }
}
