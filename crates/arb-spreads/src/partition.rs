//! Row-partitioned evaluation.
//!
//! A frame is cut into contiguous row ranges, each range is transformed on the
//! rayon pool, and the results are stacked back in their original order. The
//! transformation must be row-local: anything that looks across rows (sorts,
//! group-bys, filters on aggregates) belongs after the stack.

use crate::{ArbError, Result};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::debug;

/// Apply `f` to `partitions` contiguous slices of `df` in parallel.
///
/// A partition count of zero is treated as one, and the count never exceeds
/// the number of rows. An empty frame is handed to `f` unchanged.
pub fn map_partitions<F>(df: DataFrame, partitions: usize, f: F) -> Result<DataFrame>
where
    F: Fn(DataFrame) -> Result<DataFrame> + Send + Sync,
{
    let height = df.height();
    let n = partitions.clamp(1, height.max(1));
    if n == 1 {
        return f(df);
    }

    let chunk = height.div_ceil(n);
    let parts: Vec<DataFrame> = (0..n)
        .map(|i| df.slice((i * chunk) as i64, chunk))
        .filter(|part| part.height() > 0)
        .collect();
    debug!(rows = height, partitions = parts.len(), chunk, "evaluating partitions");

    let results = parts.into_par_iter().map(&f).collect::<Result<Vec<_>>>()?;

    let mut results = results.into_iter();
    let mut stacked = results
        .next()
        .ok_or_else(|| ArbError::Computation("no partitions produced".into()))?;
    for part in results {
        stacked.vstack_mut(&part)?;
    }
    Ok(stacked)
}
