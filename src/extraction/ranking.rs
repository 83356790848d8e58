//! Top-two-band selection over keyword-diversity scores.

use std::collections::BTreeSet;

use crate::core::types::{KeywordMatchResult, RankedResultSet};

/// Anything with a discrete score that can be banded.
pub trait Scored {
    fn band_score(&self) -> usize;
}

impl Scored for KeywordMatchResult {
    fn band_score(&self) -> usize {
        self.score()
    }
}

/// Keep every item whose score is one of the `bands` largest distinct scores.
///
/// Ties are all kept and input order is preserved.
pub fn select_top_bands<T: Scored>(items: Vec<T>, bands: usize) -> Vec<T> {
    let distinct: BTreeSet<usize> = items.iter().map(Scored::band_score).collect();
    let kept: BTreeSet<usize> = distinct.into_iter().rev().take(bands).collect();
    items
        .into_iter()
        .filter(|item| kept.contains(&item.band_score()))
        .collect()
}

/// Results at the two highest distinct keyword counts.
pub fn select_top(results: Vec<KeywordMatchResult>) -> RankedResultSet {
    select_top_bands(results, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Scored for (usize, &'static str) {
        fn band_score(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn test_two_bands_keep_ties() {
        let items = vec![(5, "a"), (3, "b"), (1, "c"), (5, "d"), (3, "e")];
        let kept: Vec<&str> = select_top_bands(items, 2).into_iter().map(|i| i.1).collect();
        assert_eq!(kept, vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn test_single_distinct_value_keeps_everything() {
        let items = vec![(2, "a"), (2, "b"), (2, "c")];
        assert_eq!(select_top_bands(items, 2).len(), 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(select_top(Vec::new()).is_empty());
    }

    #[test]
    fn test_zero_score_band_is_kept_when_among_top_two() {
        let items = vec![(0, "a"), (4, "b")];
        assert_eq!(select_top_bands(items, 2).len(), 2);
    }
}
