//! Quota selection and uniform sampling.
//!
//! Promotion uses [`select`]: shuffle each keyword group and take up to
//! `quota` items from it. Digest composition uses [`sample`]: `k` of `n`
//! uniformly, or all `n` when `n <= k`.
//!
//! Both take the random source as a parameter; production code passes
//! `rand::rng()`, tests pass a seeded `StdRng`.

use std::collections::BTreeMap;

use itertools::Itertools;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{CurationError, Result};
use crate::models::Item;

/// Output of [`select`].
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<K: Ord, T> {
    pub selected: Vec<T>,
    /// Leftovers per group. Groups with nothing left are absent.
    pub remainder: BTreeMap<K, Vec<T>>,
}

impl<K: Ord, T> Selection<K, T> {
    /// Every remaining item, in group order.
    pub fn remainder_flat(self) -> Vec<T> {
        self.remainder.into_values().flatten().collect()
    }
}

/// Pick up to `quota` random items from every group.
///
/// # Errors
///
/// [`CurationError::InvalidQuota`] when `quota <= 0`. Nothing is consumed in
/// that case since the input is only moved on success.
pub fn select<K, T, R>(
    grouped: BTreeMap<K, Vec<T>>,
    quota: i64,
    rng: &mut R,
) -> Result<Selection<K, T>>
where
    K: Ord,
    R: Rng + ?Sized,
{
    check_quota(quota)?;
    let quota = usize::try_from(quota).unwrap_or(usize::MAX);

    let mut selected = Vec::new();
    let mut remainder = BTreeMap::new();
    for (key, mut items) in grouped {
        if items.is_empty() {
            continue;
        }
        items.shuffle(rng);
        let rest = items.split_off(quota.min(items.len()));
        selected.extend(items);
        if !rest.is_empty() {
            remainder.insert(key, rest);
        }
    }

    Ok(Selection { selected, remainder })
}

/// Validate `quota` without consuming anything.
pub fn check_quota(quota: i64) -> Result<()> {
    if quota <= 0 {
        Err(CurationError::InvalidQuota(quota))
    } else {
        Ok(())
    }
}

/// `k` of `n` uniformly at random, or all of them when `n <= k`.
pub fn sample<T, R: Rng + ?Sized>(mut items: Vec<T>, k: usize, rng: &mut R) -> Vec<T> {
    if items.len() <= k {
        return items;
    }
    items.shuffle(rng);
    items.truncate(k);
    items
}

/// Group items by their provenance keyword (`unknown` when absent).
pub fn group_by_keyword(items: Vec<Item>) -> BTreeMap<String, Vec<Item>> {
    items
        .into_iter()
        .into_group_map_by(|i| i.keyword().to_string())
        .into_iter()
        .collect()
}
