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
//! Gapped extension of seed hits into local alignments.
//!
//! A hit is extended with banded Smith-Waterman over the whole query,
//! restricted to the diagonals within `band` of the hit diagonal. Gaps
//! cost `open + length * extend` (Gotoh); with [GapModel::Linear] the
//! opening cost is left out of the recursion.
use crate::hits::Match;
use crate::scoring::GapModel;
use crate::scoring::ScoringScheme;
use crate::stats;

const NEG: i32 = i32::MIN / 2;

// Trace byte layout
const FROM_ZERO: u8 = 0;
const FROM_DIAG: u8 = 1;
const FROM_LEFT: u8 = 2;
const FROM_UP: u8 = 3;
const LEFT_EXTENDS: u8 = 4;
const UP_EXTENDS: u8 = 8;

/// Alignment column type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EditOp {
    /// Identical residues.
    Match,
    /// Different residues.
    Mismatch,
    /// Query residue aligned to a gap in the subject.
    Insertion,
    /// Subject residue aligned to a gap in the query.
    Deletion,
}

impl EditOp {
    /// CIGAR operation letter.
    pub fn cigar(&self) -> char {
        match self {
            EditOp::Match | EditOp::Mismatch => 'M',
            EditOp::Insertion => 'I',
            EditOp::Deletion => 'D',
        }
    }

    fn consumes_query(&self) -> bool {
        !matches!(self, EditOp::Deletion)
    }

    fn consumes_subject(&self) -> bool {
        !matches!(self, EditOp::Insertion)
    }
}

/// Local alignment between a translated query and a translated subject.
#[derive(Clone, Debug, PartialEq)]
pub struct Alignment {
    /// Translated query id.
    pub qry_id: usize,
    /// Translated subject id.
    pub subj_id: usize,
    /// Start in the query.
    pub qry_begin: usize,
    /// End in the query, exclusive.
    pub qry_end: usize,
    /// Start in the subject.
    pub subj_begin: usize,
    /// End in the subject, exclusive.
    pub subj_end: usize,
    /// Raw score.
    pub score: i32,
    /// Normalized score in bits.
    pub bit_score: f64,
    /// Expected number of chance alignments scoring at least as well.
    pub evalue: f64,
    /// Run-length encoded alignment columns.
    pub ops: Vec<(EditOp, usize)>,
    /// Columns with identical residues.
    pub identities: usize,
    /// Columns with different residues.
    pub mismatches: usize,
    /// Columns with a positive substitution score.
    pub positives: usize,
    /// Number of gaps.
    pub gap_opens: usize,
    /// Columns with a gap.
    pub gaps: usize,
}

impl Alignment {
    /// Number of alignment columns.
    pub fn length(&self) -> usize {
        self.ops.iter().map(|(_, n)| n).sum()
    }

    /// Percentage of identical columns.
    pub fn percent_identity(&self) -> f64 {
        if self.length() == 0 {
            return 0.0;
        }
        100.0 * self.identities as f64 / self.length() as f64
    }

    /// Subject start minus query start.
    pub fn diagonal(&self) -> i64 {
        self.subj_begin as i64 - self.qry_begin as i64
    }

    /// Whether `hit` lies inside this alignment on a diagonal within `band`.
    pub fn covers(&self, hit: &Match, band: usize) -> bool {
        hit.qry_id == self.qry_id
            && hit.subj_id == self.subj_id
            && self.qry_begin <= hit.qry_start
            && hit.qry_end() <= self.qry_end
            && self.subj_begin <= hit.subj_start
            && hit.subj_end() <= self.subj_end
            && (hit.diagonal() - self.diagonal()).unsigned_abs() as usize <= band
    }

    /// CIGAR string of the alignment.
    pub fn cigar(&self) -> String {
        let mut res = String::new();
        let mut ops = self.ops.iter().map(|(op, n)| (op.cigar(), *n)).peekable();
        while let Some((op, mut n)) = ops.next() {
            while let Some((_, more)) = ops.next_if(|(next, _)| *next == op) {
                n += more;
            }
            res.push_str(&format!("{}{}", n, op));
        }
        res
    }

    /// Aligned query and subject rows with `-` for gaps, in the alphabet
    /// given by `decode`.
    pub fn rows<F: Fn(u8) -> u8>(&self, query: &[u8], subject: &[u8], decode: F) -> (String, String) {
        let mut qry_row = String::with_capacity(self.length());
        let mut subj_row = String::with_capacity(self.length());
        let mut i = self.qry_begin;
        let mut j = self.subj_begin;
        for (op, n) in self.ops.iter() {
            for _ in 0..*n {
                if op.consumes_query() {
                    qry_row.push(decode(query[i]) as char);
                    i += 1;
                } else {
                    qry_row.push('-');
                }
                if op.consumes_subject() {
                    subj_row.push(decode(subject[j]) as char);
                    j += 1;
                } else {
                    subj_row.push('-');
                }
            }
        }
        (qry_row, subj_row)
    }
}

/// Extends seed hits with banded dynamic programming.
#[derive(Copy, Clone, Debug)]
pub struct Extender<'a> {
    scheme: &'a ScoringScheme,
    band: usize,
    evalue_cutoff: f64,
}

impl<'a> Extender<'a> {
    /// Extender scoring with `scheme` within `band` diagonals of each hit.
    pub fn new(scheme: &'a ScoringScheme, band: usize, evalue_cutoff: f64) -> Extender<'a> {
        Extender { scheme, band, evalue_cutoff }
    }

    /// Band width in diagonals on either side of a hit.
    pub fn band(&self) -> usize {
        self.band
    }

    /// Extends `hit` between `query` and `subject`.
    ///
    /// `search_space` is the effective search space of the query, see
    /// [stats::search_space]. Returns None if no positive-scoring
    /// alignment exists or its E-value is above the cutoff.
    pub fn extend_match(
        &self,
        hit: &Match,
        query: &[u8],
        subject: &[u8],
        search_space: f64,
    ) -> Option<Alignment> {
        let m = query.len();
        let n = subject.len() as i64;
        let width = 2 * self.band + 1;
        let lo_diag = hit.diagonal() - self.band as i64;
        let (open, extend) = (self.scheme.gaps.open(), self.scheme.gaps.extend());
        let linear = matches!(self.scheme.gaps, GapModel::Linear { .. });

        let cells = (m + 1) * width;
        let mut h = vec![NEG; cells];
        let mut e = vec![NEG; cells];
        let mut f = vec![NEG; cells];
        let mut trace = vec![FROM_ZERO; cells];
        let mut best = (0, 0, 0);

        for i in 0..=m {
            for k in 0..width {
                let j = i as i64 + lo_diag + k as i64;
                if j < 0 || j > n {
                    continue;
                }
                let j = j as usize;
                let cell = i * width + k;
                if i == 0 || j == 0 {
                    h[cell] = 0;
                    continue;
                }

                let diag = h[(i - 1) * width + k] + self.scheme.score(query[i - 1], subject[j - 1]);

                let mut t = FROM_ZERO;
                if k > 0 {
                    let from_h = h[cell - 1] - open - extend;
                    let from_e = e[cell - 1] - extend;
                    if !linear && from_e > from_h {
                        e[cell] = from_e;
                        t |= LEFT_EXTENDS;
                    } else {
                        e[cell] = from_h;
                    }
                }
                if k + 1 < width {
                    let up = (i - 1) * width + k + 1;
                    let from_h = h[up] - open - extend;
                    let from_f = f[up] - extend;
                    if !linear && from_f > from_h {
                        f[cell] = from_f;
                        t |= UP_EXTENDS;
                    } else {
                        f[cell] = from_h;
                    }
                }

                let (score, source) = [(diag, FROM_DIAG), (e[cell], FROM_LEFT), (f[cell], FROM_UP)]
                    .into_iter()
                    .fold((0, FROM_ZERO), |acc, x| if x.0 > acc.0 { x } else { acc });
                h[cell] = score;
                trace[cell] = t | source;
                if score > best.0 {
                    best = (score, i, j);
                }
            }
        }

        let (score, end_i, end_j) = best;
        if score <= 0 {
            return None;
        }

        // Traceback
        let mut ops: Vec<EditOp> = Vec::new();
        let (mut i, mut j) = (end_i, end_j);
        let mut state = FROM_DIAG;
        loop {
            let k = (j as i64 - i as i64 - lo_diag) as usize;
            let t = trace[i * width + k];
            match state {
                FROM_LEFT => {
                    ops.push(EditOp::Deletion);
                    if t & LEFT_EXTENDS == 0 { state = FROM_DIAG; }
                    j -= 1;
                },
                FROM_UP => {
                    ops.push(EditOp::Insertion);
                    if t & UP_EXTENDS == 0 { state = FROM_DIAG; }
                    i -= 1;
                },
                _ => match t & 3 {
                    FROM_ZERO => break,
                    FROM_DIAG => {
                        ops.push(if query[i - 1] == subject[j - 1] { EditOp::Match } else { EditOp::Mismatch });
                        i -= 1;
                        j -= 1;
                    },
                    other => state = other,
                },
            }
        }
        ops.reverse();

        let mut aln = Alignment {
            qry_id: hit.qry_id,
            subj_id: hit.subj_id,
            qry_begin: i,
            qry_end: end_i,
            subj_begin: j,
            subj_end: end_j,
            score,
            bit_score: stats::bit_score(score, &self.scheme.karlin),
            evalue: 0.0,
            ops: Vec::new(),
            identities: 0,
            mismatches: 0,
            positives: 0,
            gap_opens: 0,
            gaps: 0,
        };
        aln.evalue = stats::evalue(aln.bit_score, search_space);
        if aln.evalue > self.evalue_cutoff {
            return None;
        }

        let (mut qi, mut sj) = (i, j);
        for op in ops.iter() {
            match op {
                EditOp::Match | EditOp::Mismatch => {
                    if *op == EditOp::Match { aln.identities += 1 } else { aln.mismatches += 1 }
                    if self.scheme.score(query[qi], subject[sj]) > 0 {
                        aln.positives += 1;
                    }
                    qi += 1;
                    sj += 1;
                },
                EditOp::Insertion => { aln.gaps += 1; qi += 1; },
                EditOp::Deletion => { aln.gaps += 1; sj += 1; },
            }
        }
        for op in ops {
            match aln.ops.last_mut() {
                Some((last, n)) if *last == op => *n += 1,
                _ => {
                    if matches!(op, EditOp::Insertion | EditOp::Deletion) {
                        aln.gap_opens += 1;
                    }
                    aln.ops.push((op, 1));
                },
            }
        }

        Some(aln)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::translate::Program;

    fn aa(seq: &[u8]) -> Vec<u8> {
        Alphabet::AminoAcid.encode_seq(seq)
    }

    fn hit(qry_start: usize, subj_start: usize, length: usize) -> Match {
        Match { qry_id: 0, subj_id: 0, qry_start, subj_start, length }
    }

    #[test]
    fn exact_match_extends_to_full_length() {
        let scheme = ScoringScheme::new(Program::Blastp, 2, -3, 11, 1).unwrap();
        let extender = Extender::new(&scheme, 8, 10.0);
        let query = aa(b"MKVLAGHWQERT");
        let subject = aa(b"PPPMKVLAGHWQERTPPP");
        let aln = extender.extend_match(&hit(2, 5, 3), &query, &subject, 1000.0).unwrap();

        assert_eq!((aln.qry_begin, aln.qry_end), (0, 12));
        assert_eq!((aln.subj_begin, aln.subj_end), (3, 15));
        assert_eq!(aln.ops, vec![(EditOp::Match, 12)]);
        assert_eq!(aln.identities, 12);
        assert_eq!(aln.gap_opens, 0);
        let expected: i32 = query.iter().map(|x| scheme.score(*x, *x)).sum();
        assert_eq!(aln.score, expected);
        assert_eq!(aln.cigar(), "12M");
    }

    #[test]
    fn affine_gap_in_subject() {
        let scheme = ScoringScheme::new(Program::Blastp, 2, -3, 11, 1).unwrap();
        let extender = Extender::new(&scheme, 8, 10.0);
        let query = aa(b"WWWWWWHKMCYF");
        let subject = aa(b"WWWWWWGHKMCYF");
        let aln = extender.extend_match(&hit(0, 0, 6), &query, &subject, 100.0).unwrap();

        assert_eq!(aln.ops, vec![(EditOp::Match, 6), (EditOp::Deletion, 1), (EditOp::Match, 6)]);
        assert_eq!(aln.gap_opens, 1);
        assert_eq!(aln.gaps, 1);
        // W 11, H 8, K 5, M 5, C 9, Y 7, F 6, one gap 11 + 1
        assert_eq!(aln.score, 6 * 11 + 40 - 12);
        assert_eq!(aln.cigar(), "6M1D6M");
        let (q, s) = aln.rows(&query, &subject, |x| Alphabet::AminoAcid.decode(x));
        assert_eq!(q, "WWWWWW-HKMCYF");
        assert_eq!(s, "WWWWWWGHKMCYF");
    }

    #[test]
    fn linear_gaps_cost_extension_only() {
        let scheme = ScoringScheme::new(Program::Blastp, 2, -3, 0, 1).unwrap();
        let extender = Extender::new(&scheme, 8, 10.0);
        let query = aa(b"WWWWWWGGCCCCCC");
        let subject = aa(b"WWWWWWCCCCCC");
        let aln = extender.extend_match(&hit(0, 0, 6), &query, &subject, 100.0).unwrap();

        assert_eq!(aln.ops, vec![(EditOp::Match, 6), (EditOp::Insertion, 2), (EditOp::Match, 6)]);
        assert_eq!(aln.score, 6 * 11 + 6 * 9 - 2);
        assert_eq!(aln.cigar(), "6M2I6M");
    }

    #[test]
    fn gaps_outside_the_band_are_not_found() {
        let scheme = ScoringScheme::new(Program::Blastp, 2, -3, 0, 1).unwrap();
        let extender = Extender::new(&scheme, 1, 10.0);
        let query = aa(b"WWWWWWCCCCCC");
        let subject = aa(b"WWWWWWGGGGGGGGCCCCCC");
        let aln = extender.extend_match(&hit(0, 0, 6), &query, &subject, 100.0).unwrap();
        assert_eq!(aln.ops, vec![(EditOp::Match, 6)]);
    }

    #[test]
    fn high_evalues_are_rejected() {
        let scheme = ScoringScheme::new(Program::Blastp, 2, -3, 11, 1).unwrap();
        let query = aa(b"MKV");
        let subject = aa(b"MKV");
        let strict = Extender::new(&scheme, 4, 1e-3);
        assert!(strict.extend_match(&hit(0, 0, 3), &query, &subject, 1e6).is_none());
        let lenient = Extender::new(&scheme, 4, 1e9);
        assert!(lenient.extend_match(&hit(0, 0, 3), &query, &subject, 1e6).is_some());
    }

    #[test]
    fn nucleotide_mismatch_counts() {
        let scheme = ScoringScheme::new(Program::Blastn, 2, -3, 5, 2).unwrap();
        let extender = Extender::new(&scheme, 4, 10.0);
        let query = Alphabet::Dna5.encode_seq(b"ACGTACGTACGTAAAAACGTACGTACGT");
        let subject = Alphabet::Dna5.encode_seq(b"ACGTACGTACGTAACAACGTACGTACGT");
        let aln = extender.extend_match(&hit(0, 0, 10), &query, &subject, 1000.0).unwrap();
        assert_eq!(aln.length(), 28);
        assert_eq!(aln.mismatches, 1);
        assert_eq!(aln.identities, 27);
        assert!((aln.percent_identity() - 100.0 * 27.0 / 28.0).abs() < 1e-9);
    }

    #[test]
    fn covers_checks_intervals_and_band() {
        let scheme = ScoringScheme::new(Program::Blastp, 2, -3, 11, 1).unwrap();
        let extender = Extender::new(&scheme, 2, 10.0);
        let query = aa(b"MKVLAGHWQERT");
        let aln = extender.extend_match(&hit(0, 0, 4), &query, &query, 100.0).unwrap();
        assert!(aln.covers(&hit(4, 4, 4), 2));
        assert!(aln.covers(&hit(4, 5, 4), 2));
        assert!(!aln.covers(&hit(4, 9, 4), 2));
        assert!(!aln.covers(&Match { qry_id: 1, ..hit(4, 4, 4) }, 2));
    }
}
