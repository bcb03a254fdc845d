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
//! Concatenated sequence storage.
//!
//! A [SequenceSet] stores all sequences back to back in a single buffer and
//! keeps a `limits` array of prefix sums, so that sequence `i` spans
//! `limits[i]..limits[i + 1]`. `limits[0]` is always 0 and the array is
//! strictly increasing because empty sequences are rejected.
use crate::alphabet::Alphabet;
use crate::alphabet::Reduction;
use crate::error::Error;

/// Sequences of symbol ranks stored back to back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceSet {
    data: Vec<u8>,
    limits: Vec<usize>,
}

impl Default for SequenceSet {
    fn default() -> SequenceSet {
        SequenceSet {
            data: Vec::new(),
            limits: vec![0],
        }
    }
}

impl SequenceSet {
    /// Creates an empty set.
    pub fn new() -> SequenceSet {
        SequenceSet::default()
    }

    /// Creates an empty set with room for `n_seqs` sequences of total length `total_len`.
    pub fn with_capacity(n_seqs: usize, total_len: usize) -> Result<SequenceSet, Error> {
        let mut set = SequenceSet::default();
        set.data.try_reserve_exact(total_len)
            .map_err(|_| Error::OutOfMemory(format!("allocating {} sequence symbols", total_len)))?;
        set.limits.try_reserve_exact(n_seqs)
            .map_err(|_| Error::OutOfMemory(format!("allocating {} sequence limits", n_seqs)))?;
        Ok(set)
    }

    /// Reassembles a set from its buffer and limits.
    ///
    /// Returns [Error::CorruptIndex] if `limits` does not describe `data`.
    pub fn from_parts(data: Vec<u8>, limits: Vec<usize>) -> Result<SequenceSet, Error> {
        if limits.first() != Some(&0) {
            return Err(Error::CorruptIndex("sequence limits do not start at 0".to_string()));
        }
        if limits.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::CorruptIndex("sequence limits are not strictly increasing".to_string()));
        }
        if *limits.last().unwrap_or(&0) != data.len() {
            return Err(Error::CorruptIndex(format!("sequence limits end at {} but data has {} symbols", limits.last().unwrap_or(&0), data.len())));
        }
        Ok(SequenceSet { data, limits })
    }

    /// Appends a sequence.
    pub fn push(&mut self, seq: &[u8]) -> Result<(), Error> {
        if seq.is_empty() {
            return Err(Error::EmptySequence);
        }
        self.data.try_reserve(seq.len())
            .map_err(|_| Error::OutOfMemory(format!("storing sequence {}", self.len())))?;
        self.data.extend_from_slice(seq);
        self.limits.push(self.data.len());
        Ok(())
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.limits.len() - 1
    }

    /// Whether the set contains no sequences.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence `i`.
    pub fn get(&self, i: usize) -> &[u8] {
        &self.data[self.limits[i]..self.limits[i + 1]]
    }

    /// Length of sequence `i`.
    pub fn seq_len(&self, i: usize) -> usize {
        self.limits[i + 1] - self.limits[i]
    }

    /// Prefix sums of the sequence lengths.
    pub fn limits(&self) -> &[usize] {
        &self.limits
    }

    /// The concatenated sequences.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total number of symbols over all sequences.
    pub fn total_len(&self) -> usize {
        self.data.len()
    }

    /// Iterates over the sequences in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.limits.windows(2).map(|w| &self.data[w[0]..w[1]])
    }
}

/// Where a translated sequence came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SeqOrigin {
    /// Index of the original sequence.
    pub id: usize,
    /// Reading frame: 0 if untranslated, ±1..±3 otherwise. For BLASTN
    /// queries -1 is the reverse complement.
    pub frame: i8,
}

/// A [SequenceSet] in the working alphabet together with the provenance of
/// each sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct TranslatedSet {
    /// Translated (or passed through) sequences.
    pub seqs: SequenceSet,
    /// Origin of each sequence in `seqs`.
    pub origins: Vec<SeqOrigin>,
    /// Lengths of the original sequences, indexed by original id.
    pub orig_lens: Vec<usize>,
    /// Alphabet of `seqs`.
    pub alphabet: Alphabet,
}

impl TranslatedSet {
    /// Creates an empty set over `alphabet`.
    pub fn new(alphabet: Alphabet) -> TranslatedSet {
        TranslatedSet {
            seqs: SequenceSet::new(),
            origins: Vec::new(),
            orig_lens: Vec::new(),
            alphabet,
        }
    }

    /// Number of translated sequences.
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    /// Whether no sequences are stored.
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Number of original sequences the set was derived from.
    pub fn n_original(&self) -> usize {
        self.orig_lens.len()
    }

    /// Translated sequence `i`.
    pub fn get(&self, i: usize) -> &[u8] {
        self.seqs.get(i)
    }

    /// Origin of translated sequence `i`.
    pub fn origin(&self, i: usize) -> SeqOrigin {
        self.origins[i]
    }
}

/// Read-only reduced view of a [SequenceSet].
///
/// Symbols are mapped through the reduction when read; the view owns no
/// sequence data.
#[derive(Copy, Clone, Debug)]
pub struct ReducedView<'a> {
    set: &'a SequenceSet,
    from: Alphabet,
    reduction: Reduction,
}

impl<'a> ReducedView<'a> {
    /// Reduces `set`, which is stored in `from`.
    pub fn new(set: &'a SequenceSet, from: Alphabet, reduction: Reduction) -> ReducedView<'a> {
        ReducedView { set, from, reduction }
    }

    /// Alphabet of the reduced symbols.
    pub fn alphabet(&self) -> Alphabet {
        self.reduction.target(self.from)
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether the underlying set is empty.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Length of sequence `i`.
    pub fn seq_len(&self, i: usize) -> usize {
        self.set.seq_len(i)
    }

    /// Total number of symbols.
    pub fn total_len(&self) -> usize {
        self.set.total_len()
    }

    /// Reduced symbol at `pos` of sequence `i`.
    #[inline]
    pub fn symbol(&self, i: usize, pos: usize) -> u8 {
        self.reduction.reduce(self.from, self.set.get(i)[pos])
    }

    /// Iterates over the reduced symbols of sequence `i`.
    pub fn iter_seq(&self, i: usize) -> impl Iterator<Item = u8> + 'a {
        let from = self.from;
        let reduction = self.reduction;
        self.set.get(i).iter().map(move |x| reduction.reduce(from, *x))
    }

    /// Reduced copy of sequence `i`.
    pub fn to_vec(&self, i: usize) -> Vec<u8> {
        self.iter_seq(i).collect()
    }
}
