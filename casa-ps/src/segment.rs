//! Cluster and segment assignment
//!
//! Three labelling policies share the `cluster` field name on the wire:
//!
//! 1. model clusters from the clustering pipeline
//! 2. equal-width price buckets over the batch, when the pipeline is unusable
//! 3. fixed price bands for single quick predictions
//!
//! [`ClusterSource`] records which of the first two produced a batch's labels.
//! Price bands have their own type, [`PriceBand`].

use serde::Serialize;
use tracing::{info, warn};

use crate::data::{Cell, RecordBatch};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{ClusterProjection, PipelineRunner};

/// Number of fallback buckets
pub const PRICE_BUCKETS: usize = 5;

/// Confidence reported with every price band
pub const BAND_CONFIDENCE: f64 = 0.75;

const PRICE_COLUMN: &str = "buy_price";

/// Origin of a batch's cluster labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSource {
    /// Label column already present in the dataset
    Precomputed,
    Model,
    PriceBucket,
}

/// One label per batch row; `None` where no label applies
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    pub labels: Vec<Option<i64>>,
    pub source: ClusterSource,
}

/// Model clusters, falling back to price buckets
///
/// The fallback applies when an artifact is unavailable or a stage fails and
/// the batch has a `buy_price` column. Missing projection columns are not
/// recoverable and are returned as is.
pub fn assign_clusters(
    runner: &PipelineRunner,
    batch: &RecordBatch,
    projection: ClusterProjection,
) -> PipelineResult<ClusterAssignment> {
    match runner.cluster(batch, projection) {
        Ok(labels) => Ok(ClusterAssignment {
            labels: labels.into_iter().map(Some).collect(),
            source: ClusterSource::Model,
        }),
        Err(err @ (PipelineError::ModelUnavailable { .. } | PipelineError::PredictionFailed(_))) => {
            let Some(prices) = batch.column(PRICE_COLUMN) else {
                return Err(err);
            };
            warn!("Clustering pipeline unusable, using price buckets: {}", err);
            let prices: Vec<Option<f64>> = prices.iter().map(|c| c.as_finite()).collect();
            Ok(ClusterAssignment {
                labels: price_buckets(&prices),
                source: ClusterSource::PriceBucket,
            })
        }
        Err(err) => Err(err),
    }
}

/// Attach cluster labels to `batch` under `column`
///
/// With `keep_precomputed`, a batch that already has `column` is returned
/// unchanged.
pub fn label_batch(
    runner: &PipelineRunner,
    batch: RecordBatch,
    column: &str,
    projection: ClusterProjection,
    keep_precomputed: bool,
) -> PipelineResult<(RecordBatch, ClusterSource)> {
    if keep_precomputed && batch.has_column(column) {
        info!("Serving precomputed '{}' column", column);
        return Ok((batch, ClusterSource::Precomputed));
    }
    let assignment = assign_clusters(runner, &batch, projection)?;
    let cells = assignment.labels.into_iter().map(Cell::from).collect();
    let batch = batch.with_column(column, cells)?;
    Ok((batch, assignment.source))
}

/// Equal-width bucket index per price
///
/// Bins span the min and max of the given prices, right-closed, with the
/// lowest edge pulled down by 0.1% of the range so the minimum falls in
/// bucket 0. A constant range is widened by 0.1% on both sides. Missing
/// prices get no bucket.
pub fn price_buckets(prices: &[Option<f64>]) -> Vec<Option<i64>> {
    let finite = prices.iter().flatten().filter(|p| p.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(*p), hi.max(*p))
    });
    if min > max {
        return vec![None; prices.len()];
    }

    let edges = bucket_edges(min, max);
    prices
        .iter()
        .map(|price| {
            let p = price.filter(|p| p.is_finite())?;
            let bucket = edges[1..]
                .iter()
                .position(|edge| p <= *edge)
                .unwrap_or(PRICE_BUCKETS - 1);
            Some(bucket as i64)
        })
        .collect()
}

fn bucket_edges(min: f64, max: f64) -> [f64; PRICE_BUCKETS + 1] {
    let (lo, hi) = if min == max {
        let pad = if min == 0.0 { 0.001 } else { 0.001 * min.abs() };
        (min - pad, max + pad)
    } else {
        (min, max)
    };
    let mut edges = [0.0; PRICE_BUCKETS + 1];
    for (i, edge) in edges.iter_mut().enumerate() {
        *edge = lo + (hi - lo) * i as f64 / PRICE_BUCKETS as f64;
    }
    edges[PRICE_BUCKETS] = hi;
    if min != max {
        edges[0] -= (hi - lo) * 0.001;
    }
    edges
}

/// Fixed price bands for quick predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBand {
    Economico,
    MedioBajo,
    Medio,
    MedioAlto,
    Lujo,
}

impl PriceBand {
    pub fn from_price(buy_price: f64) -> PriceBand {
        if buy_price < 300_000.0 {
            PriceBand::Economico
        } else if buy_price < 500_000.0 {
            PriceBand::MedioBajo
        } else if buy_price < 800_000.0 {
            PriceBand::Medio
        } else if buy_price < 1_200_000.0 {
            PriceBand::MedioAlto
        } else {
            PriceBand::Lujo
        }
    }

    pub fn id(self) -> i64 {
        match self {
            PriceBand::Economico => 0,
            PriceBand::MedioBajo => 1,
            PriceBand::Medio => 2,
            PriceBand::MedioAlto => 3,
            PriceBand::Lujo => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriceBand::Economico => "Económico",
            PriceBand::MedioBajo => "Medio-Bajo",
            PriceBand::Medio => "Medio",
            PriceBand::MedioAlto => "Medio-Alto",
            PriceBand::Lujo => "Lujo",
        }
    }
}

/// Response of the quick predict endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickPrediction {
    pub cluster: i64,
    pub segment: &'static str,
    pub confidence: f64,
}

pub fn quick_predict(buy_price: f64) -> QuickPrediction {
    let band = PriceBand::from_price(buy_price);
    QuickPrediction {
        cluster: band.id(),
        segment: band.label(),
        confidence: BAND_CONFIDENCE,
    }
}
