// src/query/mod.rs

use arrow::datatypes::Schema;
use serde::Serialize;

use crate::config::{AnalysisConfig, ConstraintValue, FieldSpec};
use crate::data::{store::is_summable, CRASH_YEAR_COLUMN, REGION_COLUMN};
use crate::error::{AnalysisError, Result};

/// A compiled `analysis_fields` entry: sum `target_column` over the rows
/// that satisfy every equality constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldQuery {
    pub field_name: String,
    pub target_column: String,
    /// In declaration order.
    pub constraints: Vec<(String, ConstraintValue)>,
}

impl FieldQuery {
    /// Columns the aggregation reads:
    /// `[target, year, region, constraint columns...]`.
    pub fn projection(&self) -> Vec<&str> {
        let mut cols = Vec::with_capacity(3 + self.constraints.len());
        cols.push(self.target_column.as_str());
        cols.push(CRASH_YEAR_COLUMN);
        cols.push(REGION_COLUMN);
        cols.extend(self.constraints.iter().map(|(c, _)| c.as_str()));
        cols
    }

    /// Human readable label, e.g. `bicycle, urban: Urban, light: Dark`.
    pub fn title(&self) -> String {
        let mut title = self.target_column.clone();
        for (col, value) in &self.constraints {
            title.push_str(&format!(", {col}: {value}"));
        }
        title
    }
}

/// Compile one field spec without looking at any dataset.
pub fn compile_field(field_name: &str, spec: &FieldSpec) -> Result<FieldQuery> {
    let (target, constraints) = spec.entry(field_name)?;
    Ok(FieldQuery {
        field_name: field_name.to_string(),
        target_column: target.to_string(),
        constraints: constraints
            .into_iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect(),
    })
}

/// Compile and check every referenced column against the crash schema.
pub fn compile_field_checked(
    field_name: &str,
    spec: &FieldSpec,
    schema: &Schema,
) -> Result<FieldQuery> {
    let query = compile_field(field_name, spec)?;

    for col in query.projection() {
        if schema.field_with_name(col).is_err() {
            return Err(AnalysisError::query_compile(
                field_name,
                format!("column `{col}` not found in crash dataset"),
            ));
        }
    }

    let target_type = schema
        .field_with_name(&query.target_column)
        .map(|f| f.data_type().clone())?;
    if !is_summable(&target_type) {
        return Err(AnalysisError::query_compile(
            field_name,
            format!(
                "target column `{}` has type {} and cannot be summed",
                query.target_column, target_type
            ),
        ));
    }
    Ok(query)
}

/// Compile every configured field, in config order.
pub fn compile_all(cfg: &AnalysisConfig, schema: &Schema) -> Result<Vec<FieldQuery>> {
    cfg.analysis_fields
        .iter()
        .map(|(name, spec)| compile_field_checked(name, spec, schema))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new(CRASH_YEAR_COLUMN, DataType::Int64, false),
            Field::new(REGION_COLUMN, DataType::Utf8, false),
            Field::new("bicycle", DataType::Int64, true),
            Field::new("urban", DataType::Utf8, true),
            Field::new("light", DataType::Utf8, true),
        ])
    }

    #[test]
    fn null_constraints_compile_to_empty_list() {
        let q = compile_field("bike", &FieldSpec::new("bicycle", Vec::<(&str, &str)>::new()))
            .unwrap();
        assert_eq!(q.target_column, "bicycle");
        assert!(q.constraints.is_empty());
        assert_eq!(q.projection(), vec!["bicycle", CRASH_YEAR_COLUMN, REGION_COLUMN]);
        assert_eq!(q.title(), "bicycle");
    }

    #[test]
    fn constraints_keep_declaration_order() {
        let spec = FieldSpec::new("bicycle", [("urban", "Urban"), ("light", "Dark")]);
        let q = compile_field("bike", &spec).unwrap();
        assert_eq!(
            q.constraints,
            vec![
                ("urban".to_string(), ConstraintValue::Text("Urban".into())),
                ("light".to_string(), ConstraintValue::Text("Dark".into())),
            ]
        );
        assert_eq!(
            q.projection(),
            vec!["bicycle", CRASH_YEAR_COLUMN, REGION_COLUMN, "urban", "light"]
        );
        assert_eq!(q.title(), "bicycle, urban: Urban, light: Dark");
    }

    #[test]
    fn wrong_key_count_is_config_error() {
        let spec = FieldSpec::new("bicycle", Vec::<(&str, &str)>::new()).with_extra_key("truck");
        assert!(matches!(compile_field("x", &spec), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn unknown_columns_fail_eagerly() {
        let spec = FieldSpec::new("bicycle", [("weatherA", "Fine")]);
        let err = compile_field_checked("bike", &spec, &schema()).unwrap_err();
        assert!(
            matches!(err, AnalysisError::QueryCompile { ref field, ref reason } if field == "bike" && reason.contains("weatherA"))
        );

        let spec = FieldSpec::new("truck", Vec::<(&str, &str)>::new());
        assert!(compile_field_checked("t", &spec, &schema()).is_err());
    }

    #[test]
    fn text_target_is_rejected() {
        let spec = FieldSpec::new("urban", Vec::<(&str, &str)>::new());
        assert!(matches!(
            compile_field_checked("u", &spec, &schema()),
            Err(AnalysisError::QueryCompile { .. })
        ));
    }
}
