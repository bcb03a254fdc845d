// dixsearch: Double-indexed local alignment search
//
// Copyright 2024 Tommi Mäklin [tommi@maklin.fi].

// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.

// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
//! Seed hits and their filtering.
//!
//! The filters run in a fixed order on sorted hits: duplicates are
//! removed first, then (query, subject) pairs with too many hits are
//! dropped, and finally overlapping hits on the same diagonal are merged.

/// Occurrence of a seed in a subject.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Match {
    /// Translated query id.
    pub qry_id: usize,
    /// Translated subject id.
    pub subj_id: usize,
    /// Start of the hit in the query.
    pub qry_start: usize,
    /// Start of the hit in the subject.
    pub subj_start: usize,
    /// Length of the hit.
    pub length: usize,
}

impl Match {
    /// Subject start minus query start.
    #[inline]
    pub fn diagonal(&self) -> i64 {
        self.subj_start as i64 - self.qry_start as i64
    }

    /// End of the hit in the subject, exclusive.
    pub fn subj_end(&self) -> usize {
        self.subj_start + self.length
    }

    /// End of the hit in the query, exclusive.
    pub fn qry_end(&self) -> usize {
        self.qry_start + self.length
    }
}

/// Filters applied to the hits of a query block.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterOpts {
    /// Remove hits on the same query position and diagonal.
    pub filter_duplicates: bool,
    /// Drop all hits of (query, subject) pairs with more than
    /// `abundance_threshold` hits.
    pub filter_abundant: bool,
    /// Maximum number of hits a (query, subject) pair may have.
    pub abundance_threshold: usize,
    /// Merge overlapping and adjacent hits on the same diagonal.
    pub merge_siblings: bool,
}

impl Default for FilterOpts {
    /// Default to these values:
    /// ```rust
    /// let mut opts = dixsearch::hits::FilterOpts::default();
    /// opts.filter_duplicates = true;
    /// opts.filter_abundant = false;
    /// opts.abundance_threshold = 1000;
    /// opts.merge_siblings = true;
    /// # let expected = dixsearch::hits::FilterOpts::default();
    /// # assert_eq!(opts, expected);
    /// ```
    ///
    fn default() -> FilterOpts {
        FilterOpts {
            filter_duplicates: true,
            filter_abundant: false,
            abundance_threshold: 1000,
            merge_siblings: true,
        }
    }
}

impl FilterOpts {
    /// Whether any filter is enabled.
    pub fn any(&self) -> bool {
        self.filter_duplicates || self.filter_abundant || self.merge_siblings
    }
}

/// Number of hits removed by each filter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCounts {
    /// Removed as duplicates.
    pub duplicates: usize,
    /// Removed by the abundance filter.
    pub abundant: usize,
    /// Merged into a sibling.
    pub merged: usize,
}

/// Sorts by (query, subject, diagonal, subject start).
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_unstable_by_key(|x| (x.qry_id, x.subj_id, x.diagonal(), x.subj_start, x.length));
}

/// Removes matches equal to an earlier one in query, subject, diagonal and
/// query start. `matches` must be sorted with [sort_matches].
pub fn remove_duplicates(matches: &mut Vec<Match>) -> usize {
    let before = matches.len();
    matches.dedup_by_key(|x| (x.qry_id, x.subj_id, x.diagonal(), x.qry_start));
    before - matches.len()
}

/// Drops every match of (query, subject) pairs that have more than
/// `threshold` matches. `matches` must be sorted with [sort_matches].
pub fn remove_abundant(matches: &mut Vec<Match>, threshold: usize) -> usize {
    let before = matches.len();
    let mut kept: Vec<Match> = Vec::with_capacity(matches.len());
    for group in matches.chunk_by(|a, b| a.qry_id == b.qry_id && a.subj_id == b.subj_id) {
        if group.len() <= threshold {
            kept.extend_from_slice(group);
        }
    }
    *matches = kept;
    before - matches.len()
}

/// Merges matches on the same diagonal whose subject intervals overlap or
/// touch. `matches` must be sorted with [sort_matches].
pub fn merge_siblings(matches: &mut Vec<Match>) -> usize {
    let before = matches.len();
    let mut merged: Vec<Match> = Vec::with_capacity(matches.len());
    for m in matches.iter() {
        match merged.last_mut() {
            Some(prev) if prev.qry_id == m.qry_id
                && prev.subj_id == m.subj_id
                && prev.diagonal() == m.diagonal()
                && m.subj_start <= prev.subj_end() => {
                    let end = prev.subj_end().max(m.subj_end());
                    prev.length = end - prev.subj_start;
                },
            _ => merged.push(*m),
        }
    }
    *matches = merged;
    before - matches.len()
}

/// Applies the enabled filters in order.
///
/// With all filters disabled the matches pass through unchanged.
///
/// # Examples
/// ```rust
/// use dixsearch::hits::{reduce, FilterOpts, Match};
///
/// let matches = vec![
///     Match { qry_id: 0, subj_id: 0, qry_start: 5, subj_start: 5, length: 4 },
///     Match { qry_id: 0, subj_id: 0, qry_start: 0, subj_start: 0, length: 5 },
/// ];
/// let (reduced, _) = reduce(matches, &FilterOpts::default());
/// assert_eq!(reduced, vec![Match { qry_id: 0, subj_id: 0, qry_start: 0, subj_start: 0, length: 9 }]);
/// ```
///
pub fn reduce(mut matches: Vec<Match>, opts: &FilterOpts) -> (Vec<Match>, FilterCounts) {
    let mut counts = FilterCounts::default();
    if !opts.any() {
        return (matches, counts);
    }
    sort_matches(&mut matches);
    if opts.filter_duplicates {
        counts.duplicates = remove_duplicates(&mut matches);
    }
    if opts.filter_abundant {
        counts.abundant = remove_abundant(&mut matches, opts.abundance_threshold);
    }
    if opts.merge_siblings {
        counts.merged = merge_siblings(&mut matches);
    }
    (matches, counts)
}
