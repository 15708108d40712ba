use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::vectorizer::SparseVector;

/// Scales the vector to unit l2 norm; an all-zero vector stays zero.
pub(crate) fn normalize_vector(vec: &mut SparseVector) {
    let norm: f32 = vec.values().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec.scale(1.0 / norm);
    }
}

/// Shuffles `0..n` with a seeded generator and splits off the holdout indices.
///
/// Returns `(train, holdout)`. The holdout has `floor(n * ratio)` entries but
/// never takes the last training example.
pub(crate) fn split_indices(n: usize, ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let holdout_size = ((n as f64) * ratio.clamp(0.0, 1.0)).floor() as usize;
    let holdout_size = holdout_size.min(n.saturating_sub(1));
    let train = indices.split_off(holdout_size);
    (train, indices)
}
