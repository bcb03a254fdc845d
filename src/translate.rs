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
//! Program modes and translation of nucleotide sequences into the working alphabet.
//!
//! Which side of the search is translated depends on the [Program]:
//!
//! | program | query                         | subject     |
//! |---------|-------------------------------|-------------|
//! | BLASTN  | forward + reverse complement  | as is       |
//! | BLASTP  | as is                         | as is       |
//! | BLASTX  | six frames                    | as is       |
//! | TBLASTN | as is                         | six frames  |
//! | TBLASTX | six frames                    | six frames  |
//!
//! Nucleotide sequences whose length in a frame is not a multiple of three
//! are truncated: the trailing 1-2 bases of the frame are dropped. Frames
//! that are shorter than one codon are left out of the translated set.
use std::fmt;
use std::str::FromStr;

use crate::alphabet::Alphabet;
use crate::alphabet::AA_STOP;
use crate::alphabet::AA_UNKNOWN;
use crate::alphabet::AMINO_ACIDS;
use crate::alphabet::NT_UNKNOWN;
use crate::error::Error;
use crate::seqset::SeqOrigin;
use crate::seqset::SequenceSet;
use crate::seqset::TranslatedSet;

/// Search program, in the BLAST sense.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Program {
    /// Nucleotide query against nucleotide subjects.
    Blastn,
    /// Protein query against protein subjects.
    Blastp,
    /// Translated nucleotide query against protein subjects.
    Blastx,
    /// Protein query against translated nucleotide subjects.
    Tblastn,
    /// Translated nucleotide query against translated nucleotide subjects.
    Tblastx,
}

/// Query or subject side of a search.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    /// The sequences being searched for.
    Query,
    /// The indexed database sequences.
    Subject,
}

impl Program {
    /// Alphabet the input sequences of `side` are read in.
    pub fn original_alphabet(&self, side: Side) -> Alphabet {
        match (self, side) {
            (Program::Blastn, _) => Alphabet::Dna5,
            (Program::Blastx, Side::Query) => Alphabet::Dna5,
            (Program::Tblastn, Side::Subject) => Alphabet::Dna5,
            (Program::Tblastx, _) => Alphabet::Dna5,
            _ => Alphabet::AminoAcid,
        }
    }

    /// Alphabet both sides are compared in.
    pub fn translated_alphabet(&self) -> Alphabet {
        match self {
            Program::Blastn => Alphabet::Dna5,
            _ => Alphabet::AminoAcid,
        }
    }

    /// Whether `side` is translated into amino acids.
    pub fn is_translated(&self, side: Side) -> bool {
        self.original_alphabet(side) == Alphabet::Dna5 && self.translated_alphabet() == Alphabet::AminoAcid
    }

    /// Lowercase program name.
    pub fn name(&self) -> &'static str {
        match self {
            Program::Blastn => "blastn",
            Program::Blastp => "blastp",
            Program::Blastx => "blastx",
            Program::Tblastn => "tblastn",
            Program::Tblastx => "tblastx",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name().to_uppercase())
    }
}

impl FromStr for Program {
    type Err = Error;

    fn from_str(s: &str) -> Result<Program, Error> {
        match s.to_ascii_lowercase().as_str() {
            "blastn" => Ok(Program::Blastn),
            "blastp" => Ok(Program::Blastp),
            "blastx" => Ok(Program::Blastx),
            "tblastn" => Ok(Program::Tblastn),
            "tblastx" => Ok(Program::Tblastx),
            _ => Err(Error::Config(format!("unknown program mode `{}`", s))),
        }
    }
}

/// NCBI translation tables in TCAG codon order.
const GENETIC_CODES: &[(u8, &[u8; 64])] = &[
    (1, b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (2, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSS**VVVVAAAADDEEGGGG"),
    (3, b"FFLLSSSSYY**CCWWTTTTPPPPHHQQRRRRIIMMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (4, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (5, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSSSVVVVAAAADDEEGGGG"),
    (6, b"FFLLSSSSYYQQCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (9, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG"),
    (10, b"FFLLSSSSYY**CCCWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (11, b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (12, b"FFLLSSSSYY**CC*WLLLSPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (13, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNKKSSGGVVVVAAAADDEEGGGG"),
    (14, b"FFLLSSSSYYY*CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNNKSSSSVVVVAAAADDEEGGGG"),
    (16, b"FFLLSSSSYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (21, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIMMTTTTNNNKSSSSVVVVAAAADDEEGGGG"),
    (22, b"FFLLSS*SYY*LCC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (23, b"FF*LSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
    (24, b"FFLLSSSSYY**CCWWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSSKVVVVAAAADDEEGGGG"),
    (25, b"FFLLSSSSYY**CCGWLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG"),
];

// Dna5 rank (ACGT) -> position in TCAG order
const TCAG: [usize; 4] = [2, 1, 3, 0];

/// Codon table converting Dna5 triplets into amino acid ranks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneticCode {
    id: u8,
    table: [u8; 64],
}

impl GeneticCode {
    /// Loads the NCBI translation table with id `id`.
    pub fn from_id(id: u8) -> Result<GeneticCode, Error> {
        let (_, letters) = GENETIC_CODES.iter()
            .find(|(code_id, _)| *code_id == id)
            .ok_or_else(|| Error::Config(format!("unknown genetic code {}", id)))?;

        let mut table = [AA_UNKNOWN; 64];
        for (i, c) in letters.iter().enumerate() {
            table[i] = Alphabet::AminoAcid.encode(*c);
        }
        Ok(GeneticCode { id, table })
    }

    /// NCBI id of the table.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Translates one codon of Dna5 ranks.
    ///
    /// Codons containing `N` translate to `X`.
    #[inline]
    pub fn translate_codon(&self, codon: &[u8]) -> u8 {
        if codon.iter().any(|x| *x >= NT_UNKNOWN) {
            return AA_UNKNOWN;
        }
        self.table[16 * TCAG[codon[0] as usize] + 4 * TCAG[codon[1] as usize] + TCAG[codon[2] as usize]]
    }
}

impl Default for GeneticCode {
    /// The standard code (table 1).
    fn default() -> GeneticCode {
        let (_, letters) = GENETIC_CODES[0];
        let mut table = [AA_UNKNOWN; 64];
        for (i, c) in letters.iter().enumerate() {
            table[i] = Alphabet::AminoAcid.encode(*c);
        }
        GeneticCode { id: 1, table }
    }
}

/// Reverse complement of a sequence of Dna5 ranks.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|x| if *x < NT_UNKNOWN { 3 - *x } else { NT_UNKNOWN }).collect()
}

/// Translates a sequence of Dna5 ranks in reading frame `frame`.
///
/// Frames 1, 2 and 3 start at offsets 0, 1 and 2 of `seq`; frames -1, -2
/// and -3 at the same offsets of its reverse complement. Trailing bases
/// that do not make up a full codon are dropped.
///
/// Returns [Error::InvalidFrame] for frames outside ±1..±3.
///
/// # Examples
/// ```rust
/// use dixsearch::alphabet::Alphabet;
/// use dixsearch::translate::{translate_frame, GeneticCode};
///
/// let seq = Alphabet::Dna5.encode_seq(b"ATGAAAGTTTTGTA");
/// let aa = translate_frame(&seq, 1, &GeneticCode::default()).unwrap();
/// # assert_eq!(aa, Alphabet::AminoAcid.encode_seq(b"MKVL"));
/// ```
///
pub fn translate_frame(
    seq: &[u8],
    frame: i8,
    code: &GeneticCode,
) -> Result<Vec<u8>, Error> {
    if frame == 0 || frame.abs() > 3 {
        return Err(Error::InvalidFrame(frame));
    }
    let offset = (frame.unsigned_abs() - 1) as usize;
    let strand: Vec<u8> = if frame > 0 { seq.to_vec() } else { reverse_complement(seq) };
    if strand.len() < offset + 3 {
        return Ok(Vec::new());
    }

    Ok(strand[offset..].chunks_exact(3).map(|codon| code.translate_codon(codon)).collect())
}

/// Translates or passes through the original sequences of `side`.
///
/// `original` must be encoded in `program.original_alphabet(side)`. The
/// result is in `program.translated_alphabet()`; alphabet reduction is
/// applied on top of it with a [ReducedView](crate::seqset::ReducedView).
pub fn translate_set(
    original: &SequenceSet,
    program: Program,
    side: Side,
    code: &GeneticCode,
) -> Result<TranslatedSet, Error> {
    let mut res = TranslatedSet::new(program.translated_alphabet());
    res.orig_lens = original.iter().map(|x| x.len()).collect();

    let frames: &[i8] = if program.is_translated(side) {
        &[1, 2, 3, -1, -2, -3]
    } else if program == Program::Blastn && side == Side::Query {
        &[1, -1]
    } else {
        &[0]
    };

    for (id, seq) in original.iter().enumerate() {
        for frame in frames {
            let translated = match (*frame, program.is_translated(side)) {
                (0, _) => seq.to_vec(),
                (1, false) => seq.to_vec(),
                (-1, false) => reverse_complement(seq),
                (frame, _) => translate_frame(seq, frame, code)?,
            };
            if translated.is_empty() {
                continue;
            }
            res.seqs.push(&translated)?;
            res.origins.push(SeqOrigin { id, frame: *frame });
        }
    }

    Ok(res)
}

/// Converts a half-open range on a translated sequence into 1-based BLAST
/// coordinates on the original sequence.
///
/// On the reverse strand the returned start is larger than the end.
/// `translated` tells whether the range is in amino acids.
pub fn frame_to_original(
    begin: usize,
    end: usize,
    frame: i8,
    orig_len: usize,
    translated: bool,
) -> (usize, usize) {
    let codon = if translated { 3 } else { 1 };
    let shift = if translated && frame != 0 { (frame.unsigned_abs() - 1) as usize } else { 0 };
    let first = codon * begin + shift;
    let last = codon * end + shift - 1;
    if frame < 0 {
        (orig_len - first, orig_len - last)
    } else {
        (first + 1, last + 1)
    }
}

/// Whether an amino acid rank is a stop codon.
pub fn is_stop(rank: u8) -> bool {
    rank == AA_STOP
}

/// ASCII rendering of an amino acid rank sequence.
pub fn aa_to_string(seq: &[u8]) -> String {
    seq.iter().map(|x| AMINO_ACIDS.get(*x as usize).copied().unwrap_or(b'?') as char).collect()
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;

    fn dna(s: &[u8]) -> Vec<u8> {
        Alphabet::Dna5.encode_seq(s)
    }

    #[test]
    fn translate_forward_frames() {
        let code = GeneticCode::default();
        let seq = dna(b"ATGAAAGTTTTGTAA");
        assert_eq!(aa_to_string(&translate_frame(&seq, 1, &code).unwrap()), "MKVL*");
        // Frame 2 drops one leading base and truncates the trailing two
        assert_eq!(translate_frame(&seq, 2, &code).unwrap().len(), 4);
        assert_eq!(translate_frame(&seq, 3, &code).unwrap().len(), 4);
    }

    #[test]
    fn translate_reverse_frame() {
        let code = GeneticCode::default();
        // Reverse complement of TTACAAAACTTTCAT is ATGAAAGTTTTGTAA
        let seq = dna(b"TTACAAAACTTTCAT");
        assert_eq!(aa_to_string(&translate_frame(&seq, -1, &code).unwrap()), "MKVL*");
    }

    #[test]
    fn codons_with_n_are_unknown() {
        let code = GeneticCode::default();
        let seq = dna(b"ATGNNNAAA");
        assert_eq!(aa_to_string(&translate_frame(&seq, 1, &code).unwrap()), "MXK");
    }

    #[test]
    fn invalid_frames_are_rejected() {
        let code = GeneticCode::default();
        assert!(matches!(translate_frame(&dna(b"ATG"), 0, &code), Err(Error::InvalidFrame(0))));
        assert!(matches!(translate_frame(&dna(b"ATG"), 4, &code), Err(Error::InvalidFrame(4))));
    }

    #[test]
    fn mitochondrial_code_differs_from_standard() {
        let standard = GeneticCode::from_id(1).unwrap();
        let vertebrate_mt = GeneticCode::from_id(2).unwrap();
        let tga = dna(b"TGA");
        assert!(is_stop(standard.translate_codon(&tga)));
        assert_eq!(vertebrate_mt.translate_codon(&tga), Alphabet::AminoAcid.encode(b'W'));
        assert!(GeneticCode::from_id(7).is_err());
    }

    #[test]
    fn translate_set_six_frames_skips_short_frames() {
        let mut original = SequenceSet::new();
        original.push(&dna(b"ATGAA")).unwrap();
        let got = translate_set(&original, Program::Blastx, Side::Query, &GeneticCode::default()).unwrap();
        // Frames +1 and -1 fit one codon, +2/-2 fit one, +3/-3 do not
        assert_eq!(got.len(), 4);
        assert!(got.origins.iter().all(|x| x.frame.abs() < 3));
        assert_eq!(got.orig_lens, vec![5]);
    }

    #[test]
    fn blastn_queries_are_searched_on_both_strands() {
        let mut original = SequenceSet::new();
        original.push(&dna(b"AACG")).unwrap();
        let got = translate_set(&original, Program::Blastn, Side::Query, &GeneticCode::default()).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got.get(0), dna(b"AACG").as_slice());
        assert_eq!(got.get(1), dna(b"CGTT").as_slice());
        assert_eq!(got.origin(1), SeqOrigin { id: 0, frame: -1 });
    }

    #[test]
    fn untranslated_sides_pass_through() {
        let mut original = SequenceSet::new();
        original.push(&Alphabet::AminoAcid.encode_seq(b"MKVL")).unwrap();
        let got = translate_set(&original, Program::Blastp, Side::Subject, &GeneticCode::default()).unwrap();
        assert_eq!(got.seqs, original);
        assert_eq!(got.origin(0), SeqOrigin { id: 0, frame: 0 });
    }

    #[test]
    fn coordinates_on_original_sequence() {
        // Untranslated forward
        assert_eq!(frame_to_original(0, 4, 0, 10, false), (1, 4));
        // BLASTN reverse complement
        assert_eq!(frame_to_original(0, 3, -1, 10, false), (10, 8));
        // Translated frame +2
        assert_eq!(frame_to_original(0, 1, 2, 10, true), (2, 4));
        // Translated frame -1, first codon comes from the last three bases
        assert_eq!(frame_to_original(0, 1, -1, 10, true), (10, 8));
        // Translated frame -3
        assert_eq!(frame_to_original(1, 2, -3, 12, true), (7, 5));
    }

    #[test]
    fn program_names_parse() {
        assert_eq!("BLASTX".parse::<Program>().unwrap(), Program::Blastx);
        assert!("psiblast".parse::<Program>().is_err());
        assert_eq!(Program::Tblastn.to_string(), "TBLASTN");
    }
}
