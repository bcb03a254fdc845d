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
//! Suffix array with binary search extension.
use std::io::Read;
use std::io::Write;

use crate::error::Error;
use crate::index::persist;

/// Sorts the suffixes of `text` with SA-IS.
///
/// `text` must end in a symbol that is smaller than every other symbol
/// and occurs nowhere else.
pub fn sort_suffixes(text: &[u8]) -> Result<Vec<usize>, Error> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    // SA-IS works in about two words per symbol
    let mut workspace: Vec<usize> = Vec::new();
    workspace.try_reserve_exact(2 * text.len())
        .map_err(|_| Error::OutOfMemory(format!("allocating a suffix array of {} entries", text.len())))?;
    drop(workspace);
    Ok(bio::data_structures::suffix_array::suffix_array(text))
}

/// Text and its suffix array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuffixArray {
    text: Vec<u8>,
    sa: Vec<usize>,
}

impl SuffixArray {
    /// Sorts the suffixes of `text`.
    pub fn build(text: Vec<u8>) -> Result<SuffixArray, Error> {
        let sa = sort_suffixes(&text)?;
        Ok(SuffixArray { text, sa })
    }

    /// Narrows `lo..hi` to the suffixes that have `sym` at offset `depth`.
    ///
    /// All suffixes in `lo..hi` must share their first `depth` symbols,
    /// none of which is the terminal.
    #[inline]
    pub fn extend(&self, lo: usize, hi: usize, depth: usize, sym: u8) -> (usize, usize) {
        let range = &self.sa[lo..hi];
        let first = range.partition_point(|pos| self.text[pos + depth] < sym);
        let last = first + range[first..].partition_point(|pos| self.text[pos + depth] <= sym);
        (lo + first, lo + last)
    }

    /// Text positions of the suffixes in `lo..hi`.
    pub fn positions(&self, lo: usize, hi: usize) -> &[usize] {
        &self.sa[lo..hi]
    }

    /// Length of the text.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Serializes the text and the suffix array.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        persist::write_bytes(out, &self.text)?;
        persist::write_usizes(out, &self.sa)?;
        Ok(())
    }

    /// Inverse of [SuffixArray::write_to].
    pub fn read_from<R: Read>(conn: &mut R) -> Result<SuffixArray, Error> {
        let text = persist::read_bytes(conn)?;
        let sa = persist::read_usizes(conn)?;
        if text.len() != sa.len() || sa.iter().any(|x| *x >= text.len()) {
            return Err(Error::CorruptIndex("suffix array does not match its text".to_string()));
        }
        Ok(SuffixArray { text, sa })
    }
}
