// src/rank/mod.rs

use indexmap::IndexMap;

use crate::dispatch::TimeSeriesTable;
use crate::error::{AnalysisError, Result};

/// field -> region names, largest total first.
pub type Ranking = IndexMap<String, Vec<String>>;

/// Order `regions` by the sum of their series, descending, for every field.
///
/// Ties keep the order the regions have in `regions`.
pub fn rank(table: &TimeSeriesTable, regions: &[String]) -> Result<Ranking> {
    let mut ranking = Ranking::with_capacity(table.len());
    for (field, by_region) in table {
        let mut totals = regions
            .iter()
            .map(|region| {
                by_region
                    .get(region)
                    .map(|series| (region.clone(), series.iter().sum::<f64>()))
                    .ok_or_else(|| {
                        AnalysisError::Assembly(format!(
                            "field `{field}` has no series for region `{region}`"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        // stable: equal totals stay in config order
        totals.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking.insert(
            field.clone(),
            totals.into_iter().map(|(region, _)| region).collect(),
        );
    }
    Ok(ranking)
}

/// The region x year matrix for `field`, rows in ranked order.
pub fn ranked_matrix(table: &TimeSeriesTable, ranking: &Ranking, field: &str) -> Result<Vec<Vec<f64>>> {
    let by_region = table
        .get(field)
        .ok_or_else(|| AnalysisError::Assembly(format!("no series for field `{field}`")))?;
    let order = ranking
        .get(field)
        .ok_or_else(|| AnalysisError::Assembly(format!("no ranking for field `{field}`")))?;
    order
        .iter()
        .map(|region| {
            by_region.get(region).cloned().ok_or_else(|| {
                AnalysisError::Assembly(format!("field `{field}` has no series for `{region}`"))
            })
        })
        .collect()
}
