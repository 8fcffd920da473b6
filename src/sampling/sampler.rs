//! Seeded sampling of signal rows

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::data::{Column, Frame, Value};
use crate::error::{Error, Result};

/// How groups are seeded by [`sample_groups`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStrategy {
    /// Every group reuses the same seed, so draws are correlated across groups
    Shared(u64),
    /// Each group gets a seed derived from the base seed and its ordinal
    PerGroup(u64),
    /// Fresh OS entropy for every group
    Entropy,
}

impl Default for SeedStrategy {
    fn default() -> Self {
        SeedStrategy::Shared(0)
    }
}

impl SeedStrategy {
    /// Seed used for the group at `ordinal` (first-appearance order)
    pub fn seed_for(&self, ordinal: usize) -> Option<u64> {
        match *self {
            SeedStrategy::Shared(seed) => Some(seed),
            SeedStrategy::PerGroup(seed) => {
                Some(seed ^ (ordinal as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
            }
            SeedStrategy::Entropy => None,
        }
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draw `n` distinct entries of `candidates` uniformly at random
fn choose<R: Rng>(candidates: &[usize], n: usize, rng: &mut R) -> Result<Vec<usize>> {
    if candidates.len() < n {
        return Err(Error::InsufficientPopulation {
            available: candidates.len(),
            requested: n,
        });
    }

    Ok(rand::seq::index::sample(rng, candidates.len(), n)
        .into_iter()
        .map(|i| candidates[i])
        .collect())
}

fn candidates(column: &Column, rows: impl Iterator<Item = usize>, value: &Value) -> Vec<usize> {
    rows.filter(|&row| column.matches(row, value)).collect()
}

/// Mark `n` randomly chosen rows where `column == value` in a new bool column.
///
/// `flag_column` is added or overwritten; every row outside the sample is
/// `false`. Identical input and seed give identical flags.
pub fn sample_signals(
    frame: &Frame,
    column: &str,
    value: &Value,
    n: usize,
    flag_column: &str,
    seed: Option<u64>,
) -> Result<Frame> {
    let target = frame.column(column)?;
    let pool = candidates(target, 0..frame.height(), value);

    let mut rng = make_rng(seed);
    let chosen = choose(&pool, n, &mut rng)?;

    let mut flags = vec![false; frame.height()];
    for row in chosen {
        flags[row] = true;
    }

    let mut sampled = frame.clone();
    sampled.set_column(flag_column, Column::Bool(flags))?;
    Ok(sampled)
}

/// [`sample_signals`] applied independently within each group of `group_key`.
///
/// Row order is untouched. A group with fewer than `n` candidates fails the
/// whole call.
pub fn sample_groups(
    frame: &Frame,
    group_key: &str,
    column: &str,
    value: &Value,
    n: usize,
    flag_column: &str,
    strategy: SeedStrategy,
) -> Result<Frame> {
    let groups = frame.group_indices(group_key)?;
    let target = frame.column(column)?;

    let mut flags = vec![false; frame.height()];
    for (ordinal, group) in groups.iter().enumerate() {
        let pool = candidates(target, group.rows.iter().copied(), value);
        let mut rng = make_rng(strategy.seed_for(ordinal));
        let chosen = choose(&pool, n, &mut rng)?;

        debug!(group = %group.key, candidates = pool.len(), sampled = chosen.len(), "sampled group");
        for row in chosen {
            flags[row] = true;
        }
    }

    let mut sampled = frame.clone();
    sampled.set_column(flag_column, Column::Bool(flags))?;
    Ok(sampled)
}
