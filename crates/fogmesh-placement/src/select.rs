//! Best-placement selection.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use fogmesh_core::Placement;

use crate::error::{PlacementError, PlacementResult};

/// Pick the most probable placement, breaking ties uniformly at random.
///
/// Candidates come from a single solver run, so ties are compared with exact
/// equality.
pub fn select_best<R: Rng + ?Sized>(
    candidates: Vec<Placement>,
    rng: &mut R,
) -> PlacementResult<Placement> {
    let best = candidates
        .iter()
        .map(|p| p.probability)
        .fold(f64::NEG_INFINITY, f64::max);

    let tied: Vec<Placement> = candidates
        .into_iter()
        .filter(|p| p.probability == best)
        .collect();

    let winner = tied.choose(rng).cloned().ok_or(PlacementError::NoCandidates)?;

    debug!(probability = best, tied = tied.len(), "selected best placement");
    Ok(winner)
}
