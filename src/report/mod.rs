// src/report/mod.rs

use indexmap::IndexMap;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::data::{PopulationIndex, RecordStore};
use crate::dispatch::Dispatcher;
use crate::error::{AnalysisError, Result};
use crate::logging::LogContext;
use crate::query::compile_all;
use crate::rank::{rank, ranked_matrix};
use crate::trend::{fit, TrendCurve};

pub const TIMESERIES_FILENAME_PREFIX: &str = "timeseries_";
pub const SPATIAL_FILENAME_PREFIX: &str = "spatial_";

const PER_CAPITA_UNIT: &str = "Crashes/100,000 person";
const TOTAL_UNIT: &str = "Total crashes";

#[derive(Debug, Clone, Serialize)]
pub struct TemporalFieldReport {
    pub field: String,
    pub title: String,
    pub years: Vec<i64>,
    /// region -> per-year totals, in config region order
    pub series: IndexMap<String, Vec<f64>>,
    pub ranked_regions: Vec<String>,
    /// `series` rows reordered by `ranked_regions`
    pub ranked_matrix: Vec<Vec<f64>>,
    pub trend: TrendCurve,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemporalReport {
    pub run_id: String,
    pub fields: Vec<TemporalFieldReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpatialFieldReport {
    pub field: String,
    pub title: String,
    pub target_column: String,
    pub unit: String,
    /// region -> year -> value
    pub values: IndexMap<String, IndexMap<i64, f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpatialReport {
    pub run_id: String,
    pub per_capita: bool,
    pub vis_scatter_factor: Option<f64>,
    pub fields: Vec<SpatialFieldReport>,
}

/// Time series, ranking and trend for every configured field.
#[tracing::instrument(
    level = "info",
    parent = ctx.span(),
    skip_all,
    fields(field_count = cfg.analysis_fields.len(), regions = cfg.region.len())
)]
pub fn temporal_report(
    store: &RecordStore,
    cfg: &AnalysisConfig,
    ctx: &LogContext,
) -> Result<TemporalReport> {
    let queries = compile_all(cfg, &store.schema())?;
    let mut table = Dispatcher::new(store, None, cfg.workers(), ctx.clone())
        .run_temporal(cfg, &queries)?;
    let ranking = rank(&table, &cfg.region)?;

    let mut fields = Vec::with_capacity(queries.len());
    for query in &queries {
        let matrix = ranked_matrix(&table, &ranking, &query.field_name)?;
        let trend = fit(&matrix)?;
        info!(
            parent: ctx.span(),
            field = %query.field_name,
            slope = trend.slope,
            intercept = trend.intercept,
            "trend fitted"
        );
        fields.push(TemporalFieldReport {
            field: query.field_name.clone(),
            title: query.title(),
            years: cfg.year.clone(),
            series: table.shift_remove(&query.field_name).unwrap_or_default(),
            ranked_regions: ranking.get(&query.field_name).cloned().unwrap_or_default(),
            ranked_matrix: matrix,
            trend,
        });
    }

    Ok(TemporalReport {
        run_id: ctx.run_id().to_string(),
        fields,
    })
}

/// Per-region values for every configured field, per capita when a
/// population index is given.
#[tracing::instrument(
    level = "info",
    parent = ctx.span(),
    skip_all,
    fields(field_count = cfg.analysis_fields.len(), per_capita = population.is_some())
)]
pub fn spatial_report(
    store: &RecordStore,
    population: Option<&PopulationIndex>,
    cfg: &AnalysisConfig,
    ctx: &LogContext,
) -> Result<SpatialReport> {
    let queries = compile_all(cfg, &store.schema())?;
    let per_capita = population.is_some();
    let mut table = Dispatcher::new(store, population, cfg.workers(), ctx.clone())
        .run_spatial(cfg, &queries)?;

    let unit = if per_capita { PER_CAPITA_UNIT } else { TOTAL_UNIT };
    let fields = queries
        .iter()
        .map(|query| {
            let values = table
                .shift_remove(&query.field_name)
                .and_then(|mut by_target| by_target.shift_remove(&query.target_column))
                .ok_or_else(|| {
                    AnalysisError::Assembly(format!("no values for field `{}`", query.field_name))
                })?;
            Ok(SpatialFieldReport {
                field: query.field_name.clone(),
                title: query.title(),
                target_column: query.target_column.clone(),
                unit: unit.to_string(),
                values,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SpatialReport {
        run_id: ctx.run_id().to_string(),
        per_capita,
        vis_scatter_factor: cfg.vis_scatter_factor,
        fields,
    })
}

/// Write one `timeseries_<field>.json` per field into `workdir`.
pub fn write_temporal(report: &TemporalReport, workdir: &Path) -> Result<Vec<PathBuf>> {
    report
        .fields
        .iter()
        .map(|f| write_json(workdir, &format!("{TIMESERIES_FILENAME_PREFIX}{}.json", f.field), f))
        .collect()
}

/// Write one `spatial_<field>.json` per field into `workdir`.
pub fn write_spatial(report: &SpatialReport, workdir: &Path) -> Result<Vec<PathBuf>> {
    report
        .fields
        .iter()
        .map(|f| write_json(workdir, &format!("{SPATIAL_FILENAME_PREFIX}{}.json", f.field), f))
        .collect()
}

fn write_json<T: Serialize>(workdir: &Path, file_name: &str, value: &T) -> Result<PathBuf> {
    fs::create_dir_all(workdir).map_err(|e| AnalysisError::data_source(workdir, e))?;
    let path = workdir.join(file_name);
    let file = File::create(&path).map_err(|e| AnalysisError::data_source(&path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| AnalysisError::data_source(&path, e))?;
    writer.flush()?;
    info!(path = %path.display(), "report written");
    Ok(path)
}
