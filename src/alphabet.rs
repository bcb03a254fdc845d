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
//! Working alphabets and amino acid alphabet reduction.
//!
//! Sequences are stored as symbol ranks, not ASCII. The three alphabets are:
//! - **Dna5**: `ACGTN`, rank 4 (`N`) is ambiguous.
//! - **AminoAcid**: the BLOSUM matrix order `ARNDCQEGHILKMFPSTWYVBJZX*`,
//!   ranks 23 (`X`) and 24 (`*`) are ambiguous.
//! - **Murphy10**: the 10-letter clustering of Murphy, Wallqvist and Levy
//!   (2000), represented by the letters `ACDFGHIKPS`, with an extra
//!   ambiguous cluster `X` for unknown residues and stop codons.
//!
//! Ambiguous symbols are indexed but never used inside a seed.
use crate::error::Error;

/// Amino acid letters in rank order.
pub const AMINO_ACIDS: &[u8; 25] = b"ARNDCQEGHILKMFPSTWYVBJZX*";
/// Nucleotide letters in rank order.
pub const NUCLEOTIDES: &[u8; 5] = b"ACGTN";
/// Representative letters of the Murphy10 clusters in rank order.
pub const MURPHY10_LETTERS: &[u8; 11] = b"ACDFGHIKPSX";

/// Rank of `X` in [AMINO_ACIDS].
pub const AA_UNKNOWN: u8 = 23;
/// Rank of `*` in [AMINO_ACIDS].
pub const AA_STOP: u8 = 24;
/// Rank of `N` in [NUCLEOTIDES].
pub const NT_UNKNOWN: u8 = 4;

// AMINO_ACIDS rank -> Murphy10 rank
const MURPHY10_TABLE: [u8; 25] = [
    0, // A
    7, // R
    2, // N
    2, // D
    1, // C
    2, // Q
    2, // E
    4, // G
    5, // H
    6, // I
    6, // L
    7, // K
    6, // M
    3, // F
    8, // P
    9, // S
    9, // T
    3, // W
    3, // Y
    6, // V
    2, // B
    6, // J
    2, // Z
    10, // X
    10, // *
];

static ASCII_TO_AA: [u8; 256] = {
    let mut table = [AA_UNKNOWN; 256];
    let mut i = 0;
    while i < AMINO_ACIDS.len() {
        table[AMINO_ACIDS[i] as usize] = i as u8;
        table[AMINO_ACIDS[i].to_ascii_lowercase() as usize] = i as u8;
        i += 1;
    }
    // Selenocysteine and pyrrolysine score like unknowns
    table[b'U' as usize] = AA_UNKNOWN;
    table[b'O' as usize] = AA_UNKNOWN;
    table
};

static ASCII_TO_NT: [u8; 256] = {
    let mut table = [NT_UNKNOWN; 256];
    table[b'A' as usize] = 0;
    table[b'a' as usize] = 0;
    table[b'C' as usize] = 1;
    table[b'c' as usize] = 1;
    table[b'G' as usize] = 2;
    table[b'g' as usize] = 2;
    table[b'T' as usize] = 3;
    table[b't' as usize] = 3;
    table[b'U' as usize] = 3;
    table[b'u' as usize] = 3;
    table
};

/// Symbol alphabets sequences can be stored in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Alphabet {
    /// Nucleotides with a wildcard.
    Dna5,
    /// The 25 letter amino acid alphabet.
    AminoAcid,
    /// Murphy10 reduced amino acids.
    Murphy10,
}

impl Alphabet {
    /// Number of symbols in the alphabet.
    pub fn size(&self) -> usize {
        match self {
            Alphabet::Dna5 => NUCLEOTIDES.len(),
            Alphabet::AminoAcid => AMINO_ACIDS.len(),
            Alphabet::Murphy10 => MURPHY10_LETTERS.len(),
        }
    }

    /// Converts an ASCII character into a symbol rank.
    ///
    /// Unknown characters become the alphabet's wildcard. Murphy10 is
    /// encoded through the amino acid alphabet.
    pub fn encode(&self, c: u8) -> u8 {
        match self {
            Alphabet::Dna5 => ASCII_TO_NT[c as usize],
            Alphabet::AminoAcid => ASCII_TO_AA[c as usize],
            Alphabet::Murphy10 => MURPHY10_TABLE[ASCII_TO_AA[c as usize] as usize],
        }
    }

    /// Converts an ASCII sequence into symbol ranks.
    pub fn encode_seq(&self, seq: &[u8]) -> Vec<u8> {
        seq.iter().map(|c| self.encode(*c)).collect()
    }

    /// Converts a symbol rank back to its ASCII letter.
    pub fn decode(&self, rank: u8) -> u8 {
        let letters: &[u8] = match self {
            Alphabet::Dna5 => NUCLEOTIDES,
            Alphabet::AminoAcid => AMINO_ACIDS,
            Alphabet::Murphy10 => MURPHY10_LETTERS,
        };
        letters.get(rank as usize).copied().unwrap_or(b'?')
    }

    /// Whether `rank` is a wildcard that may not appear in seeds.
    pub fn is_ambiguous(&self, rank: u8) -> bool {
        match self {
            Alphabet::Dna5 => rank >= NT_UNKNOWN,
            Alphabet::AminoAcid => rank >= AA_UNKNOWN,
            Alphabet::Murphy10 => rank >= 10,
        }
    }

    /// Name used in the index option files.
    pub fn name(&self) -> &'static str {
        match self {
            Alphabet::Dna5 => "dna5",
            Alphabet::AminoAcid => "aminoacid",
            Alphabet::Murphy10 => "murphy10",
        }
    }

    /// Inverse of [Alphabet::name].
    pub fn from_name(name: &str) -> Option<Alphabet> {
        match name.trim() {
            "dna5" => Some(Alphabet::Dna5),
            "aminoacid" => Some(Alphabet::AminoAcid),
            "murphy10" => Some(Alphabet::Murphy10),
            _ => None,
        }
    }
}

/// Amino acid alphabet reduction applied before indexing and seeding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reduction {
    /// Index the translated alphabet as is.
    None,
    /// Cluster amino acids into the Murphy10 alphabet.
    Murphy10,
}

impl Reduction {
    /// Resolves a numeric reduction level.
    ///
    /// Level 0 disables reduction and level 2 selects Murphy10. Levels 1,
    /// 8, 10 and 12 are reserved for other clusterings and rejected like
    /// any other value.
    pub fn from_level(level: u8) -> Result<Reduction, Error> {
        match level {
            0 => Ok(Reduction::None),
            2 => Ok(Reduction::Murphy10),
            1 | 8 | 10 | 12 => Err(Error::Config(format!("alphabet reduction level {} is reserved and not available", level))),
            _ => Err(Error::Config(format!("unknown alphabet reduction level {}", level))),
        }
    }

    /// Numeric level of the reduction.
    pub fn level(&self) -> u8 {
        match self {
            Reduction::None => 0,
            Reduction::Murphy10 => 2,
        }
    }

    /// Alphabet that results from reducing `translated`.
    ///
    /// Nucleotides are never reduced.
    pub fn target(&self, translated: Alphabet) -> Alphabet {
        match (self, translated) {
            (Reduction::Murphy10, Alphabet::AminoAcid) => Alphabet::Murphy10,
            _ => translated,
        }
    }

    /// Maps a symbol of `translated` into the reduced alphabet.
    #[inline]
    pub fn reduce(&self, translated: Alphabet, rank: u8) -> u8 {
        match (self, translated) {
            (Reduction::Murphy10, Alphabet::AminoAcid) => MURPHY10_TABLE[rank as usize],
            _ => rank,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::Alphabet;
    use super::Reduction;

    #[test]
    fn encode_decode_amino_acids() {
        let seq = b"MKVLW*X";
        let ranks = Alphabet::AminoAcid.encode_seq(seq);
        let got: Vec<u8> = ranks.iter().map(|x| Alphabet::AminoAcid.decode(*x)).collect();
        assert_eq!(got, seq.to_vec());
    }

    #[test]
    fn encode_lowercase_and_unknown_nucleotides() {
        let got = Alphabet::Dna5.encode_seq(b"acgTuRN");
        assert_eq!(got, vec![0, 1, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn selenocysteine_is_unknown() {
        assert_eq!(Alphabet::AminoAcid.encode(b'U'), super::AA_UNKNOWN);
    }

    #[test]
    fn murphy10_clusters() {
        let enc = |c: u8| Alphabet::Murphy10.encode(c);
        assert_eq!(enc(b'L'), enc(b'V'));
        assert_eq!(enc(b'I'), enc(b'M'));
        assert_eq!(enc(b'K'), enc(b'R'));
        assert_eq!(enc(b'E'), enc(b'Q'));
        assert_eq!(enc(b'F'), enc(b'W'));
        assert_ne!(enc(b'C'), enc(b'A'));
        assert_ne!(enc(b'P'), enc(b'H'));
        assert!(Alphabet::Murphy10.is_ambiguous(enc(b'*')));
        assert!(!Alphabet::Murphy10.is_ambiguous(enc(b'S')));
    }

    #[test]
    fn reduction_of_nucleotides_is_identity() {
        for rank in 0..5 {
            assert_eq!(Reduction::Murphy10.reduce(Alphabet::Dna5, rank), rank);
        }
        assert_eq!(Reduction::Murphy10.target(Alphabet::Dna5), Alphabet::Dna5);
    }

    #[test]
    fn reduction_levels() {
        assert_eq!(Reduction::from_level(0).unwrap(), Reduction::None);
        assert_eq!(Reduction::from_level(2).unwrap(), Reduction::Murphy10);
        assert!(Reduction::from_level(1).is_err());
        assert!(Reduction::from_level(8).is_err());
        assert!(Reduction::from_level(10).is_err());
        assert!(Reduction::from_level(12).is_err());
        assert!(Reduction::from_level(3).is_err());
    }

    #[test]
    fn alphabet_names_round_trip() {
        for alph in [Alphabet::Dna5, Alphabet::AminoAcid, Alphabet::Murphy10] {
            assert_eq!(Alphabet::from_name(alph.name()), Some(alph));
        }
        assert_eq!(Alphabet::from_name("dna4"), None);
    }
}
