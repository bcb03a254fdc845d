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
//! Seed generation from query blocks.
use std::ops::Range;

use crate::seqset::ReducedView;

/// Fixed-length query window searched in the subject index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Seed {
    /// Translated query id.
    pub qry_id: usize,
    /// Start of the window in the query.
    pub offset: usize,
    /// Length of the window.
    pub length: usize,
}

/// Start offsets of the seed windows of query `qry_id`.
///
/// Windows start at `0, seed_offset, 2 * seed_offset, ...` while they fit
/// in the query. Windows that contain an ambiguous symbol are skipped.
pub fn seed_windows<'a>(
    queries: &'a ReducedView<'a>,
    qry_id: usize,
    seed_length: usize,
    seed_offset: usize,
) -> impl Iterator<Item = usize> + 'a {
    let alphabet = queries.alphabet();
    let len = queries.seq_len(qry_id);
    let n_windows = if seed_length == 0 || len < seed_length { 0 } else { (len - seed_length) / seed_offset.max(1) + 1 };

    (0..n_windows).map(move |i| i * seed_offset.max(1)).filter(move |offset| {
        (*offset..*offset + seed_length).all(|pos| !alphabet.is_ambiguous(queries.symbol(qry_id, pos)))
    })
}

/// Generates the seeds of the queries in `block`.
///
/// # Examples
/// ```rust
/// use dixsearch::alphabet::{Alphabet, Reduction};
/// use dixsearch::seeds::generate;
/// use dixsearch::seqset::{ReducedView, SequenceSet};
///
/// let mut queries = SequenceSet::new();
/// queries.push(&Alphabet::AminoAcid.encode_seq(b"MKVLXAG")).unwrap();
/// let view = ReducedView::new(&queries, Alphabet::AminoAcid, Reduction::None);
///
/// let seeds = generate(&view, 0..1, 2, 2);
/// // Window 4..6 contains `X`
/// # assert_eq!(seeds.iter().map(|x| x.offset).collect::<Vec<usize>>(), vec![0, 2]);
/// ```
///
pub fn generate(
    queries: &ReducedView,
    block: Range<usize>,
    seed_length: usize,
    seed_offset: usize,
) -> Vec<Seed> {
    block.flat_map(|qry_id| {
        seed_windows(queries, qry_id, seed_length, seed_offset)
            .map(move |offset| Seed { qry_id, offset, length: seed_length })
    }).collect()
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::alphabet::Reduction;
    use crate::seqset::SequenceSet;

    fn queries(seqs: &[&[u8]]) -> SequenceSet {
        let mut set = SequenceSet::new();
        for seq in seqs {
            set.push(&Alphabet::AminoAcid.encode_seq(seq)).unwrap();
        }
        set
    }

    #[test]
    fn windows_step_by_offset() {
        let set = queries(&[b"ACDEFGHIK"]);
        let view = ReducedView::new(&set, Alphabet::AminoAcid, Reduction::None);
        let got: Vec<usize> = seed_windows(&view, 0, 4, 2).collect();
        assert_eq!(got, vec![0, 2, 4]);
        let got: Vec<usize> = seed_windows(&view, 0, 4, 1).collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn short_queries_have_no_seeds() {
        let set = queries(&[b"ACD", b"ACDEFG"]);
        let view = ReducedView::new(&set, Alphabet::AminoAcid, Reduction::None);
        let seeds = generate(&view, 0..2, 4, 2);
        assert!(seeds.iter().all(|x| x.qry_id == 1));
        assert_eq!(seeds.len(), 2);
    }

    #[test]
    fn ambiguous_windows_are_skipped() {
        let set = queries(&[b"AC*DEF", b"XXXXXX"]);
        let view = ReducedView::new(&set, Alphabet::AminoAcid, Reduction::Murphy10);
        let seeds = generate(&view, 0..2, 2, 1);
        let offsets: Vec<(usize, usize)> = seeds.iter().map(|x| (x.qry_id, x.offset)).collect();
        assert_eq!(offsets, vec![(0, 0), (0, 3), (0, 4)]);
    }

    #[test]
    fn block_limits_the_queries() {
        let set = queries(&[b"ACDEFG", b"ACDEFG", b"ACDEFG"]);
        let view = ReducedView::new(&set, Alphabet::AminoAcid, Reduction::None);
        let seeds = generate(&view, 1..2, 3, 3);
        assert_eq!(seeds, vec![Seed { qry_id: 1, offset: 0, length: 3 }, Seed { qry_id: 1, offset: 3, length: 3 }]);
    }
}
