//! Uniform sampling helpers shared by the network builders, the mobility
//! machine and the edge-removal intervention.

use crate::rand::seq::index::sample as choose_range;
use crate::rand::Rng;

/// Sample up to `requested` elements uniformly without replacement from a
/// container of known length, preserving the container's order.
///
/// We do not assume the container is randomly indexable, only that it can be
/// iterated over. If more elements are requested than exist, every element is
/// returned.
pub fn sample_multiple_from_known_length<I, R, T>(
    rng: &mut R,
    iter: I,
    requested: usize,
) -> Vec<T>
where
    R: Rng,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = iter.into_iter();
    let len = iter.len();
    let requested = requested.min(len);
    if requested == 0 {
        return Vec::new();
    }
    if requested == len {
        return iter.collect();
    }

    let mut indexes = choose_range(rng, len, requested).into_vec();
    indexes.sort_unstable();
    let mut index_iterator = indexes.into_iter();
    let mut next_idx = index_iterator.next();
    let mut selected = Vec::with_capacity(requested);

    for (idx, item) in iter.enumerate() {
        if Some(idx) == next_idx {
            selected.push(item);
            next_idx = index_iterator.next();
            if next_idx.is_none() {
                break;
            }
        }
    }

    selected
}

/// Draw `count` elements uniformly with replacement from `pool`.
///
/// Returns an empty vector when `pool` is empty.
pub fn sample_with_replacement<R, T>(rng: &mut R, pool: &[T], count: usize) -> Vec<T>
where
    R: Rng,
    T: Copy,
{
    if pool.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|_| pool[rng.random_range(0..pool.len())])
        .collect()
}
