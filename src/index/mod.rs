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
//! Full-text indexes over the reduced subject sequences.
//!
//! All subjects are concatenated into one text in which every subject is
//! followed by a separator and the whole text ends in a unique terminal
//! symbol. Working symbols are shifted up by two to make room for these:
//!
//! ```text
//! subjects:  [3 0 1] [2 2]
//! text:      5 2 3 1 4 4 1 0
//! ```
//!
//! Three index variants are supported, see [IndexVariant]. All of them
//! answer the same questions through [SubjectIndex]: starting from
//! [SubjectIndex::root], a pattern is matched one symbol at a time with
//! [SubjectIndex::extend], and the occurrences of the matched pattern are
//! listed with [SubjectIndex::locate].
use std::fmt;
use std::str::FromStr;

use crate::alphabet::Alphabet;
use crate::alphabet::Reduction;
use crate::error::Error;
use crate::seqset::ReducedView;
use crate::translate::GeneticCode;
use crate::translate::Program;

pub mod fm;
pub mod persist;
pub mod sa;

/// End of the whole text.
pub const TERMINAL: u8 = 0;
/// End of one subject.
pub const SEPARATOR: u8 = 1;
/// Offset added to working symbols in the text.
pub const SYMBOL_SHIFT: u8 = 2;

/// Full-text index data structure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexVariant {
    /// Plain suffix array; extension by binary search.
    SuffixArray,
    /// FM-index over the reversed text; extension by backward search.
    FmIndex,
    /// Bidirectional FM-index; extension in both directions.
    BiFmIndex,
}

impl IndexVariant {
    /// Id written to the `db_index_type` option file.
    pub fn id(&self) -> u8 {
        match self {
            IndexVariant::SuffixArray => 0,
            IndexVariant::FmIndex => 1,
            IndexVariant::BiFmIndex => 2,
        }
    }

    /// Inverse of [IndexVariant::id].
    pub fn from_id(id: u8) -> Result<IndexVariant, Error> {
        match id {
            0 => Ok(IndexVariant::SuffixArray),
            1 => Ok(IndexVariant::FmIndex),
            2 => Ok(IndexVariant::BiFmIndex),
            _ => Err(Error::CorruptIndex(format!("unknown index type {}", id))),
        }
    }

    /// Short name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            IndexVariant::SuffixArray => "sa",
            IndexVariant::FmIndex => "fm",
            IndexVariant::BiFmIndex => "bifm",
        }
    }
}

impl fmt::Display for IndexVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for IndexVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<IndexVariant, Error> {
        match s.to_ascii_lowercase().as_str() {
            "sa" => Ok(IndexVariant::SuffixArray),
            "fm" => Ok(IndexVariant::FmIndex),
            "bifm" => Ok(IndexVariant::BiFmIndex),
            _ => Err(Error::Config(format!("unknown index type `{}`", s))),
        }
    }
}

/// Options and parameters for [build_database](crate::build_database).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct IndexOpts {
    /// Program the database will be searched with.
    pub program: Program,
    /// Alphabet reduction applied to the indexed text.
    pub reduction: Reduction,
    /// NCBI genetic code for translated subjects.
    pub genetic_code: u8,
    /// Index data structure.
    pub variant: IndexVariant,
    /// Every `sa_sampling`th text position is stored in FM-index suffix
    /// array samples.
    pub sa_sampling: usize,
    /// Threads used for suffix sorting.
    pub num_threads: usize,
    /// Compare the estimated memory use with the available memory before
    /// building.
    pub check_memory: bool,
}

impl Default for IndexOpts {
    /// Default to these values:
    /// ```rust
    /// use dixsearch::alphabet::Reduction;
    /// use dixsearch::index::{IndexOpts, IndexVariant};
    /// use dixsearch::translate::Program;
    ///
    /// let mut opts = IndexOpts::default();
    /// opts.program = Program::Blastx;
    /// opts.reduction = Reduction::Murphy10;
    /// opts.genetic_code = 1;
    /// opts.variant = IndexVariant::FmIndex;
    /// opts.sa_sampling = 10;
    /// opts.num_threads = 1;
    /// opts.check_memory = true;
    /// # let expected = IndexOpts::default();
    /// # assert_eq!(opts, expected);
    /// ```
    ///
    fn default() -> IndexOpts {
        IndexOpts {
            program: Program::Blastx,
            reduction: Reduction::Murphy10,
            genetic_code: 1,
            variant: IndexVariant::FmIndex,
            sa_sampling: 10,
            num_threads: 1,
            check_memory: true,
        }
    }
}

impl IndexOpts {
    /// Checks the options for contradictions.
    pub fn validate(&self) -> Result<(), Error> {
        if self.num_threads == 0 {
            return Err(Error::Config("number of threads must be at least 1".to_string()));
        }
        if self.sa_sampling == 0 {
            return Err(Error::Config("suffix array sampling rate must be at least 1".to_string()));
        }
        if self.program.translated_alphabet() == Alphabet::Dna5 && self.reduction != Reduction::None {
            return Err(Error::Config(format!("alphabet reduction is not available for {}", self.program)));
        }
        GeneticCode::from_id(self.genetic_code)?;
        Ok(())
    }
}

/// Where the subjects are in the index text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextLayout {
    starts: Vec<usize>,
    len: usize,
}

impl TextLayout {
    pub(crate) fn from_parts(starts: Vec<usize>, len: usize) -> Result<TextLayout, Error> {
        if starts.windows(2).any(|w| w[0] >= w[1]) || starts.last().is_some_and(|x| *x >= len) {
            return Err(Error::CorruptIndex("subject start positions are inconsistent".to_string()));
        }
        Ok(TextLayout { starts, len })
    }

    /// Number of subjects.
    pub fn n_subjects(&self) -> usize {
        self.starts.len()
    }

    /// Length of the text including separators and the terminal.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the text holds only the terminal.
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Start positions of the subjects in the text.
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    /// Converts a text position into (subject id, offset in subject).
    pub fn to_subject(&self, pos: usize) -> (usize, usize) {
        let id = self.starts.partition_point(|x| *x <= pos).saturating_sub(1);
        (id, pos - self.starts[id])
    }
}

/// Concatenates the reduced subjects into an index text.
pub fn build_text(subjects: &ReducedView) -> Result<(Vec<u8>, TextLayout), Error> {
    let len = subjects.total_len() + subjects.len() + 1;
    let mut text: Vec<u8> = Vec::new();
    text.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory(format!("allocating an index text of {} symbols", len)))?;
    let mut starts: Vec<usize> = Vec::with_capacity(subjects.len());

    for i in 0..subjects.len() {
        starts.push(text.len());
        text.extend(subjects.iter_seq(i).map(|x| x + SYMBOL_SHIFT));
        text.push(SEPARATOR);
    }
    text.push(TERMINAL);

    Ok((text, TextLayout { starts, len }))
}

/// Matching state of a pattern in a [SubjectIndex].
///
/// Holds the suffix array range of the pattern occurrences and the
/// pattern length. Bidirectional indexes also carry the range in the
/// index of the reversed text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexState {
    lo: usize,
    hi: usize,
    depth: usize,
    rev_lo: usize,
    rev_hi: usize,
}

impl IndexState {
    /// Length of the matched pattern.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of occurrences of the matched pattern.
    pub fn count(&self) -> usize {
        self.hi - self.lo
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Backend {
    Sa(sa::SuffixArray),
    Fm(fm::FmIndex),
    BiFm(fm::BiFmIndex),
}

/// Read-only full-text index over the subject database.
#[derive(Clone, Debug, PartialEq)]
pub struct SubjectIndex {
    layout: TextLayout,
    alphabet: Alphabet,
    backend: Backend,
}

impl SubjectIndex {
    /// Builds a `variant` index over `subjects`.
    ///
    /// The two halves of a bidirectional index are built in parallel in
    /// the current rayon thread pool. Allocation failures return
    /// [Error::OutOfMemory].
    ///
    /// # Examples
    /// ```rust
    /// use dixsearch::alphabet::{Alphabet, Reduction};
    /// use dixsearch::index::{IndexVariant, SubjectIndex};
    /// use dixsearch::seqset::{ReducedView, SequenceSet};
    ///
    /// let mut subjects = SequenceSet::new();
    /// subjects.push(&Alphabet::AminoAcid.encode_seq(b"MKVL")).unwrap();
    /// let view = ReducedView::new(&subjects, Alphabet::AminoAcid, Reduction::None);
    ///
    /// let index = SubjectIndex::build(&view, IndexVariant::FmIndex, 10).unwrap();
    ///
    /// let mut state = index.root();
    /// for c in Alphabet::AminoAcid.encode_seq(b"KV") {
    ///     state = index.extend(&state, c).unwrap();
    /// }
    /// assert_eq!(index.locate(&state).unwrap(), vec![(0, 1)]);
    /// ```
    ///
    pub fn build(
        subjects: &ReducedView,
        variant: IndexVariant,
        sa_sampling: usize,
    ) -> Result<SubjectIndex, Error> {
        let (text, layout) = build_text(subjects)?;
        let sigma = subjects.alphabet().size() + SYMBOL_SHIFT as usize;

        let backend = match variant {
            IndexVariant::SuffixArray => Backend::Sa(sa::SuffixArray::build(text)?),
            IndexVariant::FmIndex => Backend::Fm(fm::FmIndex::build(&text, sigma, sa_sampling)?),
            IndexVariant::BiFmIndex => Backend::BiFm(fm::BiFmIndex::build(&text, sigma, sa_sampling)?),
        };

        Ok(SubjectIndex { layout, alphabet: subjects.alphabet(), backend })
    }

    /// Data structure of the index.
    pub fn variant(&self) -> IndexVariant {
        match self.backend {
            Backend::Sa(_) => IndexVariant::SuffixArray,
            Backend::Fm(_) => IndexVariant::FmIndex,
            Backend::BiFm(_) => IndexVariant::BiFmIndex,
        }
    }

    /// Alphabet of the indexed symbols.
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Number of indexed subjects.
    pub fn n_subjects(&self) -> usize {
        self.layout.n_subjects()
    }

    /// Layout of the index text.
    pub fn layout(&self) -> &TextLayout {
        &self.layout
    }

    /// State matching the empty pattern.
    pub fn root(&self) -> IndexState {
        let n = self.layout.len();
        IndexState { lo: 0, hi: n, depth: 0, rev_lo: 0, rev_hi: n }
    }

    /// Extends the pattern of `state` by `symbol` on the right.
    ///
    /// Returns None if the extended pattern does not occur.
    #[inline]
    pub fn extend(&self, state: &IndexState, symbol: u8) -> Option<IndexState> {
        let sym = symbol + SYMBOL_SHIFT;
        let next = match &self.backend {
            Backend::Sa(index) => {
                let (lo, hi) = index.extend(state.lo, state.hi, state.depth, sym);
                IndexState { lo, hi, depth: state.depth + 1, rev_lo: 0, rev_hi: 0 }
            },
            Backend::Fm(index) => {
                let (lo, hi) = index.extend(state.lo, state.hi, sym);
                IndexState { lo, hi, depth: state.depth + 1, rev_lo: 0, rev_hi: 0 }
            },
            Backend::BiFm(index) => {
                let ((lo, hi), (rev_lo, rev_hi)) = index.extend_right((state.lo, state.hi), (state.rev_lo, state.rev_hi), sym);
                IndexState { lo, hi, depth: state.depth + 1, rev_lo, rev_hi }
            },
        };
        if next.lo < next.hi { Some(next) } else { None }
    }

    /// Extends the pattern of `state` by `symbol` on the left.
    ///
    /// Only bidirectional indexes support left extension; the other
    /// variants return [Error::UnsupportedFeature].
    pub fn extend_left(&self, state: &IndexState, symbol: u8) -> Result<Option<IndexState>, Error> {
        match &self.backend {
            Backend::BiFm(index) => {
                let ((lo, hi), (rev_lo, rev_hi)) = index.extend_left((state.lo, state.hi), (state.rev_lo, state.rev_hi), symbol + SYMBOL_SHIFT);
                let next = IndexState { lo, hi, depth: state.depth + 1, rev_lo, rev_hi };
                Ok(if lo < hi { Some(next) } else { None })
            },
            _ => Err(Error::UnsupportedFeature(format!("left extension in a {} index", self.variant()))),
        }
    }

    /// Number of occurrences of the pattern of `state`.
    pub fn count(&self, state: &IndexState) -> usize {
        state.count()
    }

    /// Lists the occurrences of the pattern of `state` as (subject id,
    /// start position in subject).
    ///
    /// Returns [Error::CorruptIndex] if a sampled FM-index cannot resolve
    /// a row.
    pub fn locate(&self, state: &IndexState) -> Result<Vec<(usize, usize)>, Error> {
        let mut res: Vec<(usize, usize)> = Vec::with_capacity(state.count());
        match &self.backend {
            Backend::Sa(index) => {
                res.extend(index.positions(state.lo, state.hi).iter().map(|pos| self.layout.to_subject(*pos)));
            },
            Backend::Fm(index) => {
                for row in state.lo..state.hi {
                    res.push(self.layout.to_subject(index.locate(row, state.depth)?));
                }
            },
            Backend::BiFm(index) => {
                for row in state.lo..state.hi {
                    res.push(self.layout.to_subject(index.locate(row)?));
                }
            },
        }
        Ok(res)
    }
}
