//! Order-aware adjacency energy
//!
//! `D = (1/n) * Σ |r_i - r_(i+1)|` with `r_(n+1) = r_1`: the mean absolute
//! difference between cyclically adjacent dimensions in an explicit order.
//! The value depends on the order; permutations are not equivalent.

use ppd_common::{DimensionKey, Error, Result, ScoreMap};

/// Cyclic adjacent-difference energy over `order`
///
/// **Errors:**
/// - [`Error::EmptyOrder`] if `order` is empty
/// - [`Error::MissingDimension`] naming the first ordered key absent from `scores`
pub fn adjacency_energy(order: &[DimensionKey], scores: &ScoreMap) -> Result<f64> {
    if order.is_empty() {
        return Err(Error::EmptyOrder);
    }

    let values = order
        .iter()
        .map(|key| {
            scores
                .get(key)
                .ok_or_else(|| Error::MissingDimension(key.to_string()))
        })
        .collect::<Result<Vec<f64>>>()?;

    let n = values.len();
    if n == 1 {
        return Ok(0.0);
    }

    let total: f64 = (0..n)
        .map(|i| (values[i] - values[(i + 1) % n]).abs())
        .sum();

    Ok(total / n as f64)
}
