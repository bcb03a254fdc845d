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
//! FM-indexes and the bidirectional FM-index.
//!
//! [FmCore] is a plain FM-index: the Burrows-Wheeler transform of a text,
//! occurrence counts checkpointed every 64 rows, and a suffix array sampled
//! at every `sampling`th text position.
//!
//! Backward search on an FM-index prepends symbols to the pattern. To
//! extend seeds to the right, [FmIndex] indexes the reversed text: a
//! backward step there is a forward step in the original text.
//! [BiFmIndex] keeps an index of both orientations with synchronized
//! ranges so that the pattern can grow in either direction.
use std::io::Read;
use std::io::Write;

use log::debug;

use crate::error::Error;
use crate::index::persist;
use crate::index::sa::sort_suffixes;
use crate::index::TERMINAL;

const OCC_RATE: usize = 64;

/// FM-index of one text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FmCore {
    sigma: usize,
    sampling: usize,
    bwt: Vec<u8>,
    // c[s] = number of symbols smaller than s
    c: Vec<usize>,
    // occ[k * sigma + s] = occurrences of s in bwt[..k * OCC_RATE]
    occ: Vec<usize>,
    marks: Vec<u64>,
    mark_ranks: Vec<usize>,
    samples: Vec<usize>,
}

impl FmCore {
    /// Builds the FM-index of `text` over `sigma` symbols.
    ///
    /// `text` must end in a unique [TERMINAL].
    pub fn build(text: &[u8], sigma: usize, sampling: usize) -> Result<FmCore, Error> {
        let n = text.len();
        let sa = sort_suffixes(text)?;

        let mut bwt: Vec<u8> = Vec::new();
        bwt.try_reserve_exact(n)
            .map_err(|_| Error::OutOfMemory(format!("allocating a Burrows-Wheeler transform of {} symbols", n)))?;
        bwt.extend(sa.iter().map(|pos| if *pos == 0 { text[n - 1] } else { text[pos - 1] }));

        let mut counts = vec![0_usize; sigma];
        text.iter().for_each(|x| counts[*x as usize] += 1);
        let mut c = vec![0_usize; sigma + 1];
        for s in 0..sigma {
            c[s + 1] = c[s] + counts[s];
        }

        let n_blocks = n / OCC_RATE + 1;
        let mut occ: Vec<usize> = Vec::new();
        occ.try_reserve_exact(n_blocks * sigma)
            .map_err(|_| Error::OutOfMemory("allocating occurrence checkpoints".to_string()))?;
        let mut running = vec![0_usize; sigma];
        for block in 0..n_blocks {
            occ.extend_from_slice(&running);
            let end = ((block + 1) * OCC_RATE).min(n);
            bwt[(block * OCC_RATE).min(n)..end].iter().for_each(|x| running[*x as usize] += 1);
        }

        let mut marks = vec![0_u64; n_blocks];
        let mut samples: Vec<usize> = Vec::new();
        samples.try_reserve_exact(n / sampling + 1)
            .map_err(|_| Error::OutOfMemory("allocating suffix array samples".to_string()))?;
        for (row, pos) in sa.iter().enumerate() {
            if pos % sampling == 0 {
                marks[row / 64] |= 1 << (row % 64);
                samples.push(*pos);
            }
        }
        let mut mark_ranks = Vec::with_capacity(n_blocks);
        let mut total = 0;
        for word in marks.iter() {
            mark_ranks.push(total);
            total += word.count_ones() as usize;
        }

        debug!("FM-index over {} symbols with {} samples", n, samples.len());
        Ok(FmCore { sigma, sampling, bwt, c, occ, marks, mark_ranks, samples })
    }

    /// Number of rows, equal to the text length.
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    /// Whether the index is over an empty text.
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    /// Occurrences of `sym` in the first `row` rows of the transform.
    #[inline]
    fn occ(&self, sym: u8, row: usize) -> usize {
        let block = row / OCC_RATE;
        let base = self.occ[block * self.sigma + sym as usize];
        base + self.bwt[block * OCC_RATE..row].iter().filter(|x| **x == sym).count()
    }

    #[inline]
    fn lf(&self, row: usize) -> usize {
        let sym = self.bwt[row];
        self.c[sym as usize] + self.occ(sym, row)
    }

    /// Prepends `sym` to the pattern matching rows `lo..hi`.
    #[inline]
    pub fn backward(&self, lo: usize, hi: usize, sym: u8) -> (usize, usize) {
        if sym as usize >= self.sigma {
            return (0, 0);
        }
        let base = self.c[sym as usize];
        (base + self.occ(sym, lo), base + self.occ(sym, hi))
    }

    /// Number of symbols smaller than `sym` in rows `lo..hi` of the
    /// transform.
    #[inline]
    pub fn smaller(&self, lo: usize, hi: usize, sym: u8) -> usize {
        (0..sym.min(self.sigma as u8)).map(|s| self.occ(s, hi) - self.occ(s, lo)).sum()
    }

    #[inline]
    fn is_marked(&self, row: usize) -> bool {
        (self.marks[row / 64] >> (row % 64)) & 1 == 1
    }

    #[inline]
    fn mark_rank(&self, row: usize) -> usize {
        let mask = (1_u64 << (row % 64)) - 1;
        self.mark_ranks[row / 64] + (self.marks[row / 64] & mask).count_ones() as usize
    }

    /// Text position of the suffix in `row`.
    ///
    /// A marked row is reached in fewer than `sampling` LF steps, otherwise
    /// the sampled suffix array is corrupt.
    pub fn locate_row(&self, row: usize) -> Result<usize, Error> {
        let mut row = row;
        let mut steps = 0;
        while !self.is_marked(row) {
            steps += 1;
            if steps >= self.sampling {
                return Err(Error::CorruptIndex(format!("no suffix array sample within {} steps of row {}", self.sampling, row)));
            }
            row = self.lf(row);
        }
        let pos = self.samples[self.mark_rank(row)] + steps;
        if pos >= self.len() {
            return Err(Error::CorruptIndex(format!("row {} locates past the end of the text", row)));
        }
        Ok(pos)
    }

    /// Serializes the index.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        persist::write_u64(out, self.sigma as u64)?;
        persist::write_u64(out, self.sampling as u64)?;
        persist::write_bytes(out, &self.bwt)?;
        persist::write_usizes(out, &self.c)?;
        persist::write_usizes(out, &self.occ)?;
        persist::write_u64s(out, &self.marks)?;
        persist::write_usizes(out, &self.mark_ranks)?;
        persist::write_usizes(out, &self.samples)?;
        Ok(())
    }

    /// Inverse of [FmCore::write_to].
    pub fn read_from<R: Read>(conn: &mut R) -> Result<FmCore, Error> {
        let sigma = persist::read_u64(conn)? as usize;
        let sampling = persist::read_u64(conn)? as usize;
        let bwt = persist::read_bytes(conn)?;
        let c = persist::read_usizes(conn)?;
        let occ = persist::read_usizes(conn)?;
        let marks = persist::read_u64s(conn)?;
        let mark_ranks = persist::read_usizes(conn)?;
        let samples = persist::read_usizes(conn)?;

        let n = bwt.len();
        let n_blocks = n / OCC_RATE + 1;
        // One sample for every text position divisible by `sampling`
        let n_samples = if n == 0 || sampling == 0 { 0 } else { (n - 1) / sampling + 1 };
        let mut rank = 0;
        let ranks_match = marks.iter().zip(mark_ranks.iter()).all(|(word, word_rank)| {
            let ok = *word_rank == rank;
            rank += word.count_ones() as usize;
            ok
        });
        let consistent = sampling > 0
            && c.len() == sigma + 1
            && c.last() == Some(&n)
            && occ.len() == n_blocks * sigma
            && marks.len() == n_blocks
            && mark_ranks.len() == n_blocks
            && ranks_match
            && rank == n_samples
            && samples.len() == n_samples
            && samples.iter().all(|x| *x < n && *x % sampling == 0)
            && bwt.iter().all(|x| (*x as usize) < sigma);
        if !consistent {
            return Err(Error::CorruptIndex("FM-index tables are inconsistent".to_string()));
        }

        Ok(FmCore { sigma, sampling, bwt, c, occ, marks, mark_ranks, samples })
    }
}

/// Reverses the text in front of the terminal.
fn reverse_text(text: &[u8]) -> Result<Vec<u8>, Error> {
    let mut rev: Vec<u8> = Vec::new();
    rev.try_reserve_exact(text.len())
        .map_err(|_| Error::OutOfMemory(format!("allocating a reversed text of {} symbols", text.len())))?;
    rev.extend(text[..text.len() - 1].iter().rev());
    rev.push(TERMINAL);
    Ok(rev)
}

/// FM-index over the reversed text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FmIndex {
    core: FmCore,
}

impl FmIndex {
    /// Builds the index of the reversed `text`.
    pub fn build(text: &[u8], sigma: usize, sampling: usize) -> Result<FmIndex, Error> {
        let rev = reverse_text(text)?;
        Ok(FmIndex { core: FmCore::build(&rev, sigma, sampling)? })
    }

    /// Appends `sym` to the pattern matching rows `lo..hi`.
    #[inline]
    pub fn extend(&self, lo: usize, hi: usize, sym: u8) -> (usize, usize) {
        self.core.backward(lo, hi, sym)
    }

    /// Start position in the original text of the pattern of length
    /// `depth` found in `row`.
    pub fn locate(&self, row: usize, depth: usize) -> Result<usize, Error> {
        // The occurrence ends where the reversed occurrence starts
        (self.core.len() - 1 - self.core.locate_row(row)?).checked_sub(depth)
            .ok_or_else(|| Error::CorruptIndex(format!("row {} locates before the start of the text", row)))
    }

    /// Serializes the index.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        self.core.write_to(out)
    }

    /// Inverse of [FmIndex::write_to].
    pub fn read_from<R: Read>(conn: &mut R) -> Result<FmIndex, Error> {
        Ok(FmIndex { core: FmCore::read_from(conn)? })
    }
}

/// Bidirectional FM-index.
///
/// `left` indexes the text as is and grows patterns to the left; `right`
/// indexes the reversed text and grows patterns to the right. Rows are
/// located through `left`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BiFmIndex {
    left: FmCore,
    right: FmCore,
}

impl BiFmIndex {
    /// Builds both indexes of `text` in parallel.
    pub fn build(text: &[u8], sigma: usize, sampling: usize) -> Result<BiFmIndex, Error> {
        let rev = reverse_text(text)?;
        let (left, right) = rayon::join(
            || FmCore::build(text, sigma, sampling),
            || FmCore::build(&rev, sigma, sampling),
        );
        Ok(BiFmIndex { left: left?, right: right? })
    }

    /// Appends `sym` to the pattern with ranges `fwd` in `left` and `rev`
    /// in `right`.
    #[inline]
    pub fn extend_right(
        &self,
        fwd: (usize, usize),
        rev: (usize, usize),
        sym: u8,
    ) -> ((usize, usize), (usize, usize)) {
        let (rev_lo, rev_hi) = self.right.backward(rev.0, rev.1, sym);
        let lo = fwd.0 + self.right.smaller(rev.0, rev.1, sym);
        ((lo, lo + (rev_hi - rev_lo)), (rev_lo, rev_hi))
    }

    /// Prepends `sym` to the pattern with ranges `fwd` in `left` and `rev`
    /// in `right`.
    #[inline]
    pub fn extend_left(
        &self,
        fwd: (usize, usize),
        rev: (usize, usize),
        sym: u8,
    ) -> ((usize, usize), (usize, usize)) {
        let (lo, hi) = self.left.backward(fwd.0, fwd.1, sym);
        let rev_lo = rev.0 + self.left.smaller(fwd.0, fwd.1, sym);
        ((lo, hi), (rev_lo, rev_lo + (hi - lo)))
    }

    /// Start position in the text of the pattern found in `row` of `left`.
    pub fn locate(&self, row: usize) -> Result<usize, Error> {
        self.left.locate_row(row)
    }

    /// Serializes the right-extension index.
    pub fn write_right<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        self.right.write_to(out)
    }

    /// Serializes the left-extension index.
    pub fn write_left<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        self.left.write_to(out)
    }

    /// Reassembles the index from its two halves.
    pub fn from_parts(left: FmCore, right: FmCore) -> Result<BiFmIndex, Error> {
        if left.len() != right.len() || left.sigma != right.sigma {
            return Err(Error::CorruptIndex("bidirectional index halves do not match".to_string()));
        }
        Ok(BiFmIndex { left, right })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use random::Source;

    // Naive occurrence search
    fn occurrences(text: &[u8], pattern: &[u8]) -> Vec<usize> {
        (0..text.len().saturating_sub(pattern.len() - 1))
            .filter(|i| &text[*i..*i + pattern.len()] == pattern)
            .collect()
    }

    fn random_text(seed: u64, len: usize, sigma: u64) -> Vec<u8> {
        let mut rng = random::Default::new([seed, 121232]);
        let mut text: Vec<u8> = (0..len).map(|_| (rng.read_u64() % (sigma - 2) + 2) as u8).collect();
        // Sprinkle separators
        for i in (17..len).step_by(53) {
            text[i] = 1;
        }
        text.push(TERMINAL);
        text
    }

    #[test]
    fn locate_every_row() {
        let text = random_text(1, 300, 6);
        let core = FmCore::build(&text, 6, 7).unwrap();
        let sa = sort_suffixes(&text).unwrap();
        for row in 0..core.len() {
            assert_eq!(core.locate_row(row).unwrap(), sa[row]);
        }
    }

    #[test]
    fn forward_extension_over_reversed_text() {
        let text = random_text(2, 500, 5);
        let index = FmIndex::build(&text, 5, 4).unwrap();
        let pattern = text[100..104].to_vec();

        let (mut lo, mut hi) = (0, text.len());
        for (depth, sym) in pattern.iter().enumerate() {
            (lo, hi) = index.extend(lo, hi, *sym);
            assert!(lo < hi, "lost pattern at depth {}", depth);
        }
        let mut got: Vec<usize> = (lo..hi).map(|row| index.locate(row, pattern.len()).unwrap()).collect();
        got.sort();
        assert_eq!(got, occurrences(&text, &pattern));
    }

    #[test]
    fn bidirectional_ranges_stay_in_sync() {
        let text = random_text(3, 400, 5);
        let index = BiFmIndex::build(&text, 5, 3).unwrap();
        let pattern = text[200..205].to_vec();

        // Start from the middle symbol and grow outwards
        let n = text.len();
        let (mut fwd, mut rev) = index.extend_right((0, n), (0, n), pattern[2]);
        (fwd, rev) = index.extend_right(fwd, rev, pattern[3]);
        (fwd, rev) = index.extend_left(fwd, rev, pattern[1]);
        (fwd, rev) = index.extend_right(fwd, rev, pattern[4]);
        (fwd, rev) = index.extend_left(fwd, rev, pattern[0]);
        assert_eq!(fwd.1 - fwd.0, rev.1 - rev.0);

        let mut got: Vec<usize> = (fwd.0..fwd.1).map(|row| index.locate(row).unwrap()).collect();
        got.sort();
        assert_eq!(got, occurrences(&text, &pattern));
    }

    #[test]
    fn missing_symbol_gives_empty_range() {
        let text = vec![2, 3, 2, 1, 0];
        let core = FmCore::build(&text, 5, 2).unwrap();
        let (lo, hi) = core.backward(0, text.len(), 4);
        assert_eq!(lo, hi);
        let (lo, hi) = core.backward(0, text.len(), 9);
        assert_eq!(lo, hi);
    }

    #[test]
    fn serialized_core_reads_back() {
        let text = random_text(4, 200, 6);
        let core = FmCore::build(&text, 6, 5).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        core.write_to(&mut buf).unwrap();
        assert_eq!(FmCore::read_from(&mut buf.as_slice()).unwrap(), core);
        buf[20] ^= 0xFF;
        assert!(FmCore::read_from(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn unsampled_core_is_rejected() {
        let text = random_text(5, 300, 6);
        let mut core = FmCore::build(&text, 6, 8).unwrap();
        core.marks.iter_mut().for_each(|x| *x = 0);
        core.mark_ranks.iter_mut().for_each(|x| *x = 0);
        core.samples.clear();

        let mut buf: Vec<u8> = Vec::new();
        core.write_to(&mut buf).unwrap();
        let got = FmCore::read_from(&mut buf.as_slice());
        assert!(matches!(got, Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn misplaced_samples_are_rejected() {
        let text = random_text(6, 300, 6);
        let mut core = FmCore::build(&text, 6, 8).unwrap();
        core.samples[0] = text.len() + 8;

        let mut buf: Vec<u8> = Vec::new();
        core.write_to(&mut buf).unwrap();
        let got = FmCore::read_from(&mut buf.as_slice());
        assert!(matches!(got, Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn locate_stops_when_marks_are_misplaced() {
        let text = random_text(7, 300, 6);
        let mut core = FmCore::build(&text, 6, 8).unwrap();
        // Move every mark one row over while keeping the counts intact
        let marked: Vec<usize> = (0..core.len()).filter(|row| core.is_marked(*row)).collect();
        core.marks.iter_mut().for_each(|x| *x = 0);
        for row in marked {
            let moved = (row + 1) % core.len();
            core.marks[moved / 64] |= 1 << (moved % 64);
        }
        let mut total = 0;
        for (word, rank) in core.marks.iter().zip(core.mark_ranks.iter_mut()) {
            *rank = total;
            total += word.count_ones() as usize;
        }

        let located: Vec<Result<usize, Error>> = (0..core.len()).map(|row| core.locate_row(row)).collect();
        assert!(located.iter().all(|x| match x { Ok(pos) => *pos < core.len(), Err(Error::CorruptIndex(_)) => true, Err(_) => false }));
    }
}
