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
//! Substitution scores, gap costs and their statistics.
use crate::alphabet::AMINO_ACIDS;
use crate::alphabet::NT_UNKNOWN;
use crate::error::Error;
use crate::stats::KarlinParams;
use crate::stats::ParamTable;
use crate::translate::Program;

const AA: usize = AMINO_ACIDS.len();

/// BLOSUM62 in `ARNDCQEGHILKMFPSTWYVBJZX*` order.
#[rustfmt::skip]
pub static BLOSUM62: [i8; AA * AA] = [
//   A   R   N   D   C   Q   E   G   H   I   L   K   M   F   P   S   T   W   Y   V   B   J   Z   X   *
     4, -1, -2, -2,  0, -1, -1,  0, -2, -1, -1, -1, -1, -2, -1,  1,  0, -3, -2,  0, -2, -1, -1, -1, -4, // A
    -1,  5,  0, -2, -3,  1,  0, -2,  0, -3, -2,  2, -1, -3, -2, -1, -1, -3, -2, -3, -1, -2,  0, -1, -4, // R
    -2,  0,  6,  1, -3,  0,  0,  0,  1, -3, -3,  0, -2, -3, -2,  1,  0, -4, -2, -3,  4, -3,  0, -1, -4, // N
    -2, -2,  1,  6, -3,  0,  2, -1, -1, -3, -4, -1, -3, -3, -1,  0, -1, -4, -3, -3,  4, -3,  1, -1, -4, // D
     0, -3, -3, -3,  9, -3, -4, -3, -3, -1, -1, -3, -1, -2, -3, -1, -1, -2, -2, -1, -3, -1, -3, -1, -4, // C
    -1,  1,  0,  0, -3,  5,  2, -2,  0, -3, -2,  1,  0, -3, -1,  0, -1, -2, -1, -2,  0, -2,  4, -1, -4, // Q
    -1,  0,  0,  2, -4,  2,  5, -2,  0, -3, -3,  1, -2, -3, -1,  0, -1, -3, -2, -2,  1, -3,  4, -1, -4, // E
     0, -2,  0, -1, -3, -2, -2,  6, -2, -4, -4, -2, -3, -3, -2,  0, -2, -2, -3, -3, -1, -4, -2, -1, -4, // G
    -2,  0,  1, -1, -3,  0,  0, -2,  8, -3, -3, -1, -2, -1, -2, -1, -2, -2,  2, -3,  0, -3,  0, -1, -4, // H
    -1, -3, -3, -3, -1, -3, -3, -4, -3,  4,  2, -3,  1,  0, -3, -2, -1, -3, -1,  3, -3,  3, -3, -1, -4, // I
    -1, -2, -3, -4, -1, -2, -3, -4, -3,  2,  4, -2,  2,  0, -3, -2, -1, -2, -1,  1, -4,  3, -3, -1, -4, // L
    -1,  2,  0, -1, -3,  1,  1, -2, -1, -3, -2,  5, -1, -3, -1,  0, -1, -3, -2, -2,  0, -3,  1, -1, -4, // K
    -1, -1, -2, -3, -1,  0, -2, -3, -2,  1,  2, -1,  5,  0, -2, -1, -1, -1, -1,  1, -3,  2, -1, -1, -4, // M
    -2, -3, -3, -3, -2, -3, -3, -3, -1,  0,  0, -3,  0,  6, -4, -2, -2,  1,  3, -1, -3,  0, -3, -1, -4, // F
    -1, -2, -2, -1, -3, -1, -1, -2, -2, -3, -3, -1, -2, -4,  7, -1, -1, -4, -3, -2, -2, -3, -1, -1, -4, // P
     1, -1,  1,  0, -1,  0,  0,  0, -1, -2, -2,  0, -1, -2, -1,  4,  1, -3, -2, -2,  0, -2,  0, -1, -4, // S
     0, -1,  0, -1, -1, -1, -1, -2, -2, -1, -1, -1, -1, -2, -1,  1,  5, -2, -2,  0, -1, -1, -1, -1, -4, // T
    -3, -3, -4, -4, -2, -2, -3, -2, -2, -3, -2, -3, -1,  1, -4, -3, -2, 11,  2, -3, -4, -2, -2, -1, -4, // W
    -2, -2, -2, -3, -2, -1, -2, -3,  2, -1, -1, -2, -1,  3, -3, -2, -2,  2,  7, -1, -3, -1, -2, -1, -4, // Y
     0, -3, -3, -3, -1, -2, -2, -3, -3,  3,  1, -2,  1, -1, -2, -2,  0, -3, -1,  4, -3,  2, -2, -1, -4, // V
    -2, -1,  4,  4, -3,  0,  1, -1,  0, -3, -4,  0, -3, -3, -2,  0, -1, -4, -3, -3,  4, -3,  0, -1, -4, // B
    -1, -2, -3, -3, -1, -2, -3, -4, -3,  3,  3, -3,  2,  0, -3, -2, -1, -2, -1,  2, -3,  3, -3, -1, -4, // J
    -1,  0,  0,  1, -3,  4,  4, -2,  0, -3, -3,  1, -1, -3, -1,  0, -1, -2, -2, -2,  0, -3,  4, -1, -4, // Z
    -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -4, // X
    -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4, -4,  1, // *
];

/// Score of aligning two residues.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Substitution {
    /// BLOSUM62 over amino acid ranks.
    Blosum62,
    /// Match/mismatch scores over Dna5 ranks. `N` always scores as a mismatch.
    Nucleotide {
        /// Score of a match.
        reward: i32,
        /// Score of a mismatch, negative.
        penalty: i32,
    },
}

impl Substitution {
    /// Score of aligning `a` against `b`.
    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        match self {
            Substitution::Blosum62 => BLOSUM62[a as usize * AA + b as usize] as i32,
            Substitution::Nucleotide { reward, penalty } => {
                if a == b && a < NT_UNKNOWN { *reward } else { *penalty }
            },
        }
    }

    fn param_table(&self) -> ParamTable {
        match self {
            Substitution::Blosum62 => ParamTable::Blosum62,
            Substitution::Nucleotide { reward, penalty } => ParamTable::Nucleotide { reward: *reward, penalty: *penalty },
        }
    }
}

/// Gap cost model.
///
/// A gap of length `l` costs `open + l * extend`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GapModel {
    /// Every gap position costs `extend`.
    Linear {
        /// Cost per gap position.
        extend: i32,
    },
    /// Gotoh affine gaps.
    Affine {
        /// Cost of opening a gap, charged once.
        open: i32,
        /// Cost per gap position.
        extend: i32,
    },
}

impl GapModel {
    /// Chooses the linear model when `open` is 0.
    pub fn new(open: i32, extend: i32) -> GapModel {
        if open == 0 {
            GapModel::Linear { extend }
        } else {
            GapModel::Affine { open, extend }
        }
    }

    /// Opening cost, 0 for linear gaps.
    pub fn open(&self) -> i32 {
        match self {
            GapModel::Linear { .. } => 0,
            GapModel::Affine { open, .. } => *open,
        }
    }

    /// Cost per gap position.
    pub fn extend(&self) -> i32 {
        match self {
            GapModel::Linear { extend } => *extend,
            GapModel::Affine { extend, .. } => *extend,
        }
    }
}

/// Substitution scores, gap costs and the matching statistical parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScoringScheme {
    /// Residue scores.
    pub substitution: Substitution,
    /// Gap costs.
    pub gaps: GapModel,
    /// Karlin-Altschul parameters for `substitution` and `gaps`.
    pub karlin: KarlinParams,
}

impl ScoringScheme {
    /// Scheme for `program`.
    ///
    /// BLASTN uses the `reward`/`penalty` scheme, every other program
    /// BLOSUM62. Gap costs are positive. Returns [Error::Config] for
    /// negative costs, free gaps, or combinations without published
    /// statistical parameters.
    pub fn new(
        program: Program,
        reward: i32,
        penalty: i32,
        gap_open: i32,
        gap_extend: i32,
    ) -> Result<ScoringScheme, Error> {
        if gap_open < 0 || gap_extend < 0 {
            return Err(Error::Config(format!("gap costs must be positive, got open {} and extend {}", gap_open, gap_extend)));
        }
        if gap_extend == 0 {
            return Err(Error::Config("gap extension cost must be at least 1".to_string()));
        }
        let substitution = match program {
            Program::Blastn => {
                if reward <= 0 || penalty >= 0 {
                    return Err(Error::Config(format!("match score must be positive and mismatch score negative, got {} and {}", reward, penalty)));
                }
                Substitution::Nucleotide { reward, penalty }
            },
            _ => Substitution::Blosum62,
        };
        let karlin = substitution.param_table().karlin(gap_open as u32, gap_extend as u32)?;

        Ok(ScoringScheme { substitution, gaps: GapModel::new(gap_open, gap_extend), karlin })
    }

    /// Score of aligning `a` against `b`.
    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.substitution.score(a, b)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;

    #[test]
    fn blosum62_is_symmetric() {
        for a in 0..AA {
            for b in 0..AA {
                assert_eq!(BLOSUM62[a * AA + b], BLOSUM62[b * AA + a]);
            }
        }
    }

    #[test]
    fn blosum62_scores() {
        let aa = |c: u8| Alphabet::AminoAcid.encode(c);
        let scheme = Substitution::Blosum62;
        assert_eq!(scheme.score(aa(b'W'), aa(b'W')), 11);
        assert_eq!(scheme.score(aa(b'C'), aa(b'C')), 9);
        assert_eq!(scheme.score(aa(b'K'), aa(b'R')), 2);
        assert_eq!(scheme.score(aa(b'*'), aa(b'A')), -4);
    }

    #[test]
    fn nucleotide_n_never_matches() {
        let scheme = Substitution::Nucleotide { reward: 2, penalty: -3 };
        assert_eq!(scheme.score(0, 0), 2);
        assert_eq!(scheme.score(0, 1), -3);
        assert_eq!(scheme.score(NT_UNKNOWN, NT_UNKNOWN), -3);
    }

    #[test]
    fn zero_gap_open_selects_linear_gaps() {
        assert_eq!(GapModel::new(0, 2), GapModel::Linear { extend: 2 });
        assert_eq!(GapModel::new(11, 1), GapModel::Affine { open: 11, extend: 1 });
        assert_eq!(GapModel::new(0, 2).open(), 0);
    }

    #[test]
    fn scheme_for_programs() {
        let blastp = ScoringScheme::new(Program::Blastp, 2, -3, 11, 1).unwrap();
        assert_eq!(blastp.substitution, Substitution::Blosum62);
        let blastn = ScoringScheme::new(Program::Blastn, 2, -3, 5, 2).unwrap();
        assert_eq!(blastn.substitution, Substitution::Nucleotide { reward: 2, penalty: -3 });
        assert!(ScoringScheme::new(Program::Blastn, 3, -5, 5, 2).is_err());
        assert!(ScoringScheme::new(Program::Blastp, 2, -3, 11, 0).is_err());
        assert!(ScoringScheme::new(Program::Blastp, 2, -3, -1, 1).is_err());
    }
}
