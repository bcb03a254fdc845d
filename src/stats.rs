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
//! Karlin-Altschul statistics and search counters.
//!
//! Gapped parameters are looked up from the published NCBI tables for the
//! supported scoring schemes. The first entry of every table holds the
//! ungapped parameters, which are also used for linear gap costs that have
//! no entry of their own.
use std::ops::AddAssign;

use crate::error::Error;

/// Karlin-Altschul parameters of a scoring scheme.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KarlinParams {
    /// Scale of the score distribution.
    pub lambda: f64,
    /// Search space scaling.
    pub k: f64,
    /// Relative entropy per aligned pair.
    pub h: f64,
}

// (gap open, gap extend, lambda, K, H); first row is ungapped
type ParamRow = (u32, u32, f64, f64, f64);

const BLOSUM62_PARAMS: &[ParamRow] = &[
    (u32::MAX, u32::MAX, 0.3176, 0.134, 0.4012),
    (11, 2, 0.297, 0.082, 0.27),
    (10, 2, 0.291, 0.075, 0.23),
    (9, 2, 0.279, 0.058, 0.19),
    (8, 2, 0.264, 0.045, 0.15),
    (7, 2, 0.239, 0.027, 0.10),
    (6, 2, 0.201, 0.012, 0.061),
    (13, 1, 0.292, 0.071, 0.23),
    (12, 1, 0.283, 0.059, 0.19),
    (11, 1, 0.267, 0.041, 0.14),
    (10, 1, 0.243, 0.024, 0.10),
    (9, 1, 0.206, 0.010, 0.052),
];

const BLASTN_1_2_PARAMS: &[ParamRow] = &[
    (u32::MAX, u32::MAX, 1.28, 0.46, 0.85),
    (2, 2, 1.33, 0.62, 1.1),
    (1, 2, 1.30, 0.52, 0.93),
    (0, 2, 1.19, 0.34, 0.66),
    (3, 1, 1.32, 0.57, 1.0),
    (2, 1, 1.29, 0.49, 0.92),
    (1, 1, 1.14, 0.26, 0.52),
];

const BLASTN_1_3_PARAMS: &[ParamRow] = &[
    (u32::MAX, u32::MAX, 1.374, 0.711, 1.31),
    (2, 2, 1.37, 0.70, 1.2),
    (1, 2, 1.35, 0.64, 1.1),
    (0, 2, 1.25, 0.42, 0.83),
    (2, 1, 1.34, 0.60, 1.1),
    (1, 1, 1.21, 0.34, 0.71),
];

const BLASTN_2_3_PARAMS: &[ParamRow] = &[
    (u32::MAX, u32::MAX, 0.55, 0.21, 0.46),
    (4, 4, 0.63, 0.42, 0.84),
    (2, 4, 0.615, 0.37, 0.72),
    (0, 4, 0.55, 0.21, 0.46),
    (3, 3, 0.615, 0.37, 0.68),
    (6, 2, 0.63, 0.42, 0.84),
    (5, 2, 0.625, 0.41, 0.78),
    (4, 2, 0.61, 0.35, 0.68),
    (2, 2, 0.515, 0.14, 0.33),
];

/// Scoring systems with published Karlin-Altschul parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamTable {
    /// BLOSUM62 amino acid matrix.
    Blosum62,
    /// Nucleotide reward/penalty scheme (penalty given as a negative score).
    Nucleotide {
        /// Score of a match.
        reward: i32,
        /// Score of a mismatch.
        penalty: i32,
    },
}

impl ParamTable {
    fn rows(&self) -> Result<&'static [ParamRow], Error> {
        match self {
            ParamTable::Blosum62 => Ok(BLOSUM62_PARAMS),
            ParamTable::Nucleotide { reward: 1, penalty: -2 } => Ok(BLASTN_1_2_PARAMS),
            ParamTable::Nucleotide { reward: 1, penalty: -3 } => Ok(BLASTN_1_3_PARAMS),
            ParamTable::Nucleotide { reward: 2, penalty: -3 } => Ok(BLASTN_2_3_PARAMS),
            ParamTable::Nucleotide { reward, penalty } => Err(Error::Config(format!("no statistical parameters for match/mismatch scores {}/{}", reward, penalty))),
        }
    }

    /// Looks up the parameters for gap costs `gap_open`, `gap_extend`.
    ///
    /// Linear gap costs (`gap_open == 0`) without a table entry of their own
    /// use the ungapped parameters. Any other combination missing from the
    /// table is a configuration error.
    pub fn karlin(&self, gap_open: u32, gap_extend: u32) -> Result<KarlinParams, Error> {
        let rows = self.rows()?;
        let row = rows.iter()
            .find(|row| row.0 == gap_open && row.1 == gap_extend)
            .or_else(|| if gap_open == 0 { rows.first() } else { None })
            .ok_or_else(|| Error::Config(format!("no statistical parameters for gap costs {}/{} with {:?}", gap_open, gap_extend, self)))?;
        Ok(KarlinParams { lambda: row.2, k: row.3, h: row.4 })
    }
}

/// Converts a raw score into a bit score.
#[inline]
pub fn bit_score(raw: i32, params: &KarlinParams) -> f64 {
    (params.lambda * raw as f64 - params.k.ln()) / std::f64::consts::LN_2
}

/// Expected number of chance alignments with at least `bits` bits in a
/// search space of `space` residue pairs.
#[inline]
pub fn evalue(bits: f64, space: f64) -> f64 {
    space * (-bits).exp2()
}

/// Expected length of a chance alignment between a query of `qry_len`
/// residues and a database of `db_len` residues in `db_seqs` sequences.
///
/// Found by fixed point iteration of `l = ln(K (m - l) (n - N l)) / H`,
/// capped so that the effective query length stays at least `1 / K`.
pub fn length_adjustment(params: &KarlinParams, qry_len: usize, db_len: usize, db_seqs: usize) -> usize {
    let m = qry_len as f64;
    let n = db_len as f64;
    let seqs = db_seqs.max(1) as f64;

    let mut ell = 0.0_f64;
    for _ in 0..20 {
        let eff_m = (m - ell).max(1.0);
        let eff_n = (n - seqs * ell).max(1.0);
        let next = ((params.k * eff_m * eff_n).ln() / params.h).max(0.0);
        let converged = (next - ell).abs() < 0.5;
        ell = next;
        if converged {
            break;
        }
    }
    if m - ell < 1.0 / params.k {
        ell = (m - 1.0 / params.k).max(0.0);
    }
    ell.floor() as usize
}

/// Effective search space of one query after length adjustment.
pub fn search_space(params: &KarlinParams, qry_len: usize, db_len: usize, db_seqs: usize) -> f64 {
    let ell = length_adjustment(params, qry_len, db_len, db_seqs);
    let eff_m = qry_len.saturating_sub(ell).max(1) as f64;
    let eff_n = db_len.saturating_sub(db_seqs.max(1) * ell).max(1) as f64;
    eff_m * eff_n
}

/// Counters collected while searching.
///
/// Each query block fills its own copy; the copies are added together
/// once a block completes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Query blocks processed successfully.
    pub blocks: usize,
    /// Query blocks that failed and were skipped.
    pub failed_blocks: usize,
    /// Original queries searched, counted once per query whatever the number of frames.
    pub queries: usize,
    /// Seeds generated.
    pub seeds: usize,
    /// Seeds skipped for having too many occurrences.
    pub seeds_too_frequent: usize,
    /// Raw seed hits.
    pub hits: usize,
    /// Hits removed as duplicates.
    pub hits_duplicate: usize,
    /// Hits removed by the abundance filter.
    pub hits_abundant: usize,
    /// Hits merged into a neighbouring hit.
    pub hits_merged: usize,
    /// Hits skipped because an existing alignment already contains them.
    pub hits_contained: usize,
    /// Hits extended with dynamic programming.
    pub extensions: usize,
    /// Extensions rejected by the E-value cutoff.
    pub rejected_evalue: usize,
    /// Alignments reported.
    pub alignments: usize,
}

impl AddAssign<&SearchStats> for SearchStats {
    fn add_assign(&mut self, other: &SearchStats) {
        self.blocks += other.blocks;
        self.failed_blocks += other.failed_blocks;
        self.queries += other.queries;
        self.seeds += other.seeds;
        self.seeds_too_frequent += other.seeds_too_frequent;
        self.hits += other.hits;
        self.hits_duplicate += other.hits_duplicate;
        self.hits_abundant += other.hits_abundant;
        self.hits_merged += other.hits_merged;
        self.hits_contained += other.hits_contained;
        self.extensions += other.extensions;
        self.rejected_evalue += other.rejected_evalue;
        self.alignments += other.alignments;
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn blosum62_default_gap_costs() {
        let params = ParamTable::Blosum62.karlin(11, 1).unwrap();
        assert_approx_eq!(params.lambda, 0.267);
        assert_approx_eq!(params.k, 0.041);
        assert_approx_eq!(params.h, 0.14);
    }

    #[test]
    fn linear_gaps_fall_back_to_ungapped_params() {
        let params = ParamTable::Blosum62.karlin(0, 1).unwrap();
        assert_approx_eq!(params.lambda, 0.3176);
        // Nucleotide tables have their own linear entries
        let params = ParamTable::Nucleotide { reward: 1, penalty: -2 }.karlin(0, 2).unwrap();
        assert_approx_eq!(params.lambda, 1.19);
    }

    #[test]
    fn unknown_combinations_are_config_errors() {
        assert!(matches!(ParamTable::Blosum62.karlin(3, 3), Err(Error::Config(_))));
        assert!(matches!(ParamTable::Nucleotide { reward: 5, penalty: -4 }.karlin(0, 0), Err(Error::Config(_))));
    }

    #[test]
    fn bit_score_and_evalue() {
        let params = ParamTable::Blosum62.karlin(11, 1).unwrap();
        let bits = bit_score(100, &params);
        let expected = (0.267 * 100.0 - 0.041_f64.ln()) / 2.0_f64.ln();
        assert_approx_eq!(bits, expected);
        assert_approx_eq!(evalue(10.0, 1024.0), 1.0);
    }

    #[test]
    fn length_adjustment_is_bounded_by_query_length() {
        let params = ParamTable::Blosum62.karlin(11, 1).unwrap();
        let ell = length_adjustment(&params, 300, 1_000_000, 1000);
        assert!(ell > 0);
        assert!(ell < 300);
        // Queries shorter than 1/K residues are not adjusted
        assert_eq!(length_adjustment(&params, 20, 1_000_000, 1000), 0);
        assert!(search_space(&params, 20, 30, 1) >= 1.0);
    }

    #[test]
    fn stats_add_up() {
        let mut total = SearchStats::default();
        let block = SearchStats { blocks: 1, seeds: 10, hits: 4, alignments: 2, ..Default::default() };
        total += &block;
        total += &block;
        assert_eq!(total.blocks, 2);
        assert_eq!(total.seeds, 20);
        assert_eq!(total.hits, 8);
        assert_eq!(total.alignments, 4);
    }
}
