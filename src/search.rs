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
//! Finding seed occurrences in the subject index.
//!
//! In double-indexed mode the seed trie and the subject index are walked
//! together depth first: a trie edge is followed only if the index can be
//! extended by the same symbol, so a prefix shared by many seeds is
//! matched once. Per-seed mode matches every seed window on its own from
//! the index root. Both produce the same sorted match list.
//!
//! With `seed_delta > 0` up to that many substitutions are tolerated along
//! a seed: at every step, the index is also extended with each other
//! unambiguous symbol at the cost of one error.
use std::ops::Range;

use crate::error::Error;
use crate::hits::sort_matches;
use crate::hits::Match;
use crate::index::IndexState;
use crate::index::SubjectIndex;
use crate::seeds::seed_windows;
use crate::seeds::Seed;
use crate::seqset::ReducedView;
use crate::trie::SeedTrie;
use crate::trie::ROOT;

/// Seed matching parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SeedParams {
    /// Substitutions tolerated along a seed.
    pub seed_delta: usize,
    /// Seeds with more occurrences than this produce no matches, 0 for
    /// no limit.
    pub max_seed_hits: usize,
}

/// Matches found for one query block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Seed occurrences sorted by (query, subject, diagonal, subject start).
    pub matches: Vec<Match>,
    /// Seeds searched.
    pub seeds: usize,
    /// Seeds skipped for exceeding `max_seed_hits`.
    pub too_frequent: usize,
}

struct Walker<'a> {
    index: &'a SubjectIndex,
    params: SeedParams,
    alternatives: Vec<u8>,
    result: SearchResult,
}

impl<'a> Walker<'a> {
    fn new(index: &'a SubjectIndex, params: SeedParams) -> Walker<'a> {
        let alphabet = index.alphabet();
        let alternatives = (0..alphabet.size() as u8).filter(|x| !alphabet.is_ambiguous(*x)).collect();
        Walker { index, params, alternatives, result: SearchResult::default() }
    }

    // Steps from `state` by `sym` and by every other symbol while errors remain
    fn steps(&self, state: &IndexState, sym: u8, errors: usize) -> Vec<(IndexState, usize)> {
        let mut next: Vec<(IndexState, usize)> = Vec::new();
        if let Some(exact) = self.index.extend(state, sym) {
            next.push((exact, errors));
        }
        if errors < self.params.seed_delta {
            for other in self.alternatives.iter().filter(|x| **x != sym) {
                if let Some(mismatch) = self.index.extend(state, *other) {
                    next.push((mismatch, errors + 1));
                }
            }
        }
        next
    }

    fn report(&mut self, state: &IndexState, seeds: &[Seed]) -> Result<(), Error> {
        if self.params.max_seed_hits > 0 && state.count() > self.params.max_seed_hits {
            self.result.too_frequent += seeds.len();
            return Ok(());
        }
        for (subj_id, subj_start) in self.index.locate(state)? {
            self.result.matches.extend(seeds.iter().map(|seed| Match {
                qry_id: seed.qry_id,
                subj_id,
                qry_start: seed.offset,
                subj_start,
                length: seed.length,
            }));
        }
        Ok(())
    }

    fn walk_trie(&mut self, trie: &SeedTrie, all_seeds: &[Seed], node: usize, state: IndexState, errors: usize) -> Result<(), Error> {
        if !trie.seeds(node).is_empty() {
            let seeds: Vec<Seed> = trie.seeds(node).iter().map(|x| all_seeds[*x]).collect();
            self.report(&state, &seeds)?;
        }
        for (sym, child) in trie.children(node) {
            for (next, next_errors) in self.steps(&state, sym, errors) {
                self.walk_trie(trie, all_seeds, child, next, next_errors)?;
            }
        }
        Ok(())
    }

    fn walk_seed(&mut self, seed: &Seed, symbols: &[u8], state: IndexState, errors: usize) -> Result<(), Error> {
        match symbols.split_first() {
            None => self.report(&state, std::slice::from_ref(seed)),
            Some((sym, rest)) => {
                for (next, next_errors) in self.steps(&state, *sym, errors) {
                    self.walk_seed(seed, rest, next, next_errors)?;
                }
                Ok(())
            },
        }
    }

    fn finish(mut self) -> SearchResult {
        sort_matches(&mut self.result.matches);
        self.result
    }
}

/// Walks `trie` over `seeds` and `index` together.
pub fn search_trie(
    index: &SubjectIndex,
    trie: &SeedTrie,
    seeds: &[Seed],
    params: SeedParams,
) -> Result<SearchResult, Error> {
    let mut walker = Walker::new(index, params);
    walker.result.seeds = seeds.len();
    if !trie.is_empty() && index.n_subjects() > 0 {
        walker.walk_trie(trie, seeds, ROOT, index.root(), 0)?;
    }
    Ok(walker.finish())
}

/// Matches every seed window of the queries in `block` on its own.
pub fn search_per_seed(
    index: &SubjectIndex,
    queries: &ReducedView,
    block: Range<usize>,
    seed_length: usize,
    seed_offset: usize,
    params: SeedParams,
) -> Result<SearchResult, Error> {
    let mut walker = Walker::new(index, params);
    for qry_id in block {
        for offset in seed_windows(queries, qry_id, seed_length, seed_offset) {
            walker.result.seeds += 1;
            if index.n_subjects() == 0 {
                continue;
            }
            let seed = Seed { qry_id, offset, length: seed_length };
            let symbols: Vec<u8> = (offset..offset + seed_length).map(|pos| queries.symbol(qry_id, pos)).collect();
            walker.walk_seed(&seed, &symbols, index.root(), 0)?;
        }
    }
    Ok(walker.finish())
}
