// src/dispatch/mod.rs

use indexmap::IndexMap;
use rayon::prelude::*;
use std::{collections::HashMap, time::Instant};
use tracing::{error, info};

use crate::aggregate::{aggregate, CellKey};
use crate::config::AnalysisConfig;
use crate::data::{PopulationIndex, RecordStore};
use crate::error::{AnalysisError, Result};
use crate::logging::LogContext;
use crate::query::{compile_all, FieldQuery};

/// field -> region -> one value per configured year, in config order.
pub type TimeSeriesTable = IndexMap<String, IndexMap<String, Vec<f64>>>;

/// field -> sub-field (target column) -> region -> year -> value.
pub type SpatialTable = IndexMap<String, IndexMap<String, IndexMap<String, IndexMap<i64, f64>>>>;

/// One unit of work: a cell key plus the query that computes it.
#[derive(Debug, Clone)]
pub struct CellTask<'q> {
    pub key: CellKey,
    pub query: &'q FieldQuery,
}

/// Enumerate every cell field-major, then region, then year.
pub fn enumerate_cells<'q>(
    queries: &'q [FieldQuery],
    regions: &[String],
    years: &[i64],
) -> Vec<CellTask<'q>> {
    let mut tasks = Vec::with_capacity(queries.len() * regions.len() * years.len());
    for query in queries {
        for region in regions {
            for &year in years {
                tasks.push(CellTask {
                    key: CellKey::new(&query.field_name, region, year),
                    query,
                });
            }
        }
    }
    tasks
}

/// Runs aggregation cells on a bounded worker pool and gathers the results
/// keyed by cell, so completion order never affects placement.
pub struct Dispatcher<'a> {
    store: &'a RecordStore,
    population: Option<&'a PopulationIndex>,
    workers: usize,
    ctx: LogContext,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        store: &'a RecordStore,
        population: Option<&'a PopulationIndex>,
        workers: usize,
        ctx: LogContext,
    ) -> Self {
        Self {
            store,
            population,
            workers: workers.max(1),
            ctx,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Compute every task with the aggregation engine.
    pub fn execute(
        &self,
        tasks: &[CellTask<'_>],
        use_population: bool,
    ) -> Result<HashMap<CellKey, f64>> {
        self.execute_with(tasks, |task| {
            aggregate(
                self.store,
                self.population,
                task.query,
                &task.key.region,
                task.key.year,
                use_population,
            )
        })
    }

    /// Compute every task with `eval`. The first failure aborts the batch;
    /// no partial map is returned.
    #[tracing::instrument(
        level = "info",
        parent = self.ctx.span(),
        skip_all,
        fields(cells = tasks.len(), workers = self.workers)
    )]
    pub fn execute_with<F>(&self, tasks: &[CellTask<'_>], eval: F) -> Result<HashMap<CellKey, f64>>
    where
        F: Fn(&CellTask<'_>) -> Result<f64> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("cas-cell-{i}"))
            .build()
            .map_err(|e| AnalysisError::Pool(e.to_string()))?;

        let start = Instant::now();
        info!(
            parent: self.ctx.span(),
            cells = tasks.len(),
            workers = self.workers,
            "computing cells"
        );

        let gathered: Vec<(CellKey, f64)> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| match eval(task) {
                    Ok(v) => Ok((task.key.clone(), v)),
                    Err(e) => {
                        error!(parent: self.ctx.span(), cell = %task.key, "cell failed: {e}");
                        Err(AnalysisError::Cell {
                            field: task.key.field.clone(),
                            region: task.key.region.clone(),
                            year: task.key.year,
                            source: Box::new(e),
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut results = HashMap::with_capacity(gathered.len());
        for (key, value) in gathered {
            if results.insert(key.clone(), value).is_some() {
                return Err(AnalysisError::Assembly(format!("cell {key} submitted twice")));
            }
        }

        info!(
            parent: self.ctx.span(),
            cells = results.len(),
            elapsed = ?start.elapsed(),
            "cells complete"
        );
        Ok(results)
    }

    /// Raw per-year sums for every field and region.
    pub fn run_temporal(
        &self,
        cfg: &AnalysisConfig,
        queries: &[FieldQuery],
    ) -> Result<TimeSeriesTable> {
        let tasks = enumerate_cells(queries, &cfg.region, &cfg.year);
        let results = self.execute(&tasks, false)?;
        assemble_temporal(queries, &cfg.region, &cfg.year, &results)
    }

    /// Per-region, per-year values; per-capita when a population index is present.
    pub fn run_spatial(&self, cfg: &AnalysisConfig, queries: &[FieldQuery]) -> Result<SpatialTable> {
        let tasks = enumerate_cells(queries, &cfg.region, &cfg.year);
        let results = self.execute(&tasks, self.population.is_some())?;
        assemble_spatial(queries, &cfg.region, &cfg.year, &results)
    }
}

fn take(results: &HashMap<CellKey, f64>, key: &CellKey) -> Result<f64> {
    results
        .get(key)
        .copied()
        .ok_or_else(|| AnalysisError::Assembly(format!("no result gathered for cell {key}")))
}

/// Re-nest gathered results into field -> region -> per-year series.
pub fn assemble_temporal(
    queries: &[FieldQuery],
    regions: &[String],
    years: &[i64],
    results: &HashMap<CellKey, f64>,
) -> Result<TimeSeriesTable> {
    let mut table = TimeSeriesTable::with_capacity(queries.len());
    for query in queries {
        let mut by_region = IndexMap::with_capacity(regions.len());
        for region in regions {
            let series = years
                .iter()
                .map(|&year| take(results, &CellKey::new(&query.field_name, region, year)))
                .collect::<Result<Vec<_>>>()?;
            by_region.insert(region.clone(), series);
        }
        table.insert(query.field_name.clone(), by_region);
    }
    Ok(table)
}

/// Re-nest gathered results into field -> target -> region -> year -> value.
pub fn assemble_spatial(
    queries: &[FieldQuery],
    regions: &[String],
    years: &[i64],
    results: &HashMap<CellKey, f64>,
) -> Result<SpatialTable> {
    let mut table = SpatialTable::with_capacity(queries.len());
    for query in queries {
        let mut by_region = IndexMap::with_capacity(regions.len());
        for region in regions {
            let mut by_year = IndexMap::with_capacity(years.len());
            for &year in years {
                by_year.insert(year, take(results, &CellKey::new(&query.field_name, region, year))?);
            }
            by_region.insert(region.clone(), by_year);
        }
        let mut by_sub_field = IndexMap::with_capacity(1);
        by_sub_field.insert(query.target_column.clone(), by_region);
        table.insert(query.field_name.clone(), by_sub_field);
    }
    Ok(table)
}

/// Compile the config against the store and build the temporal table.
pub fn run_temporal(
    store: &RecordStore,
    cfg: &AnalysisConfig,
    ctx: &LogContext,
) -> Result<TimeSeriesTable> {
    let queries = compile_all(cfg, &store.schema())?;
    Dispatcher::new(store, None, cfg.workers(), ctx.clone()).run_temporal(cfg, &queries)
}

/// Compile the config against the store and build the spatial table.
pub fn run_spatial(
    store: &RecordStore,
    population: Option<&PopulationIndex>,
    cfg: &AnalysisConfig,
    ctx: &LogContext,
) -> Result<SpatialTable> {
    let queries = compile_all(cfg, &store.schema())?;
    Dispatcher::new(store, population, cfg.workers(), ctx.clone()).run_spatial(cfg, &queries)
}
