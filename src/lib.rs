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

//! dixsearch is a local sequence similarity search tool in the style of
//! [BLAST](https://blast.ncbi.nlm.nih.gov/Blast.cgi).
//!
//! Subjects are indexed once with a suffix array, an FM-index or a
//! bidirectional FM-index over their (optionally translated and
//! alphabet-reduced) sequences. Queries are cut into seeds, the seeds of a
//! block of queries are gathered into a trie, and the trie is walked
//! together with the index so that shared seed prefixes are matched only
//! once. The resulting hits are filtered and extended with banded
//! Smith-Waterman into scored local alignments.
//!
//! dixsearch supports two main operations:
//!
//! - `dixsearch index` [builds](build_database()) a subject database.
//! - `dixsearch search` [searches](search()) query sequences against a
//!   database and writes BLAST tabular, pairwise or SAM output.
//!
//! All five BLAST programs are available: BLASTN, BLASTP, BLASTX, TBLASTN
//! and TBLASTX.
//!
//! # Usage
//!
//! ## dixsearch index
//! Index a protein database for BLASTX searches with the reduced
//! Murphy-10 alphabet:
//! ```text
//! dixsearch index --program blastx --reduction 2 -d db.fasta -o db.dix
//! ```
//!
//! ## dixsearch search
//! Search translated reads against the database:
//! ```text
//! dixsearch search --program blastx --reduction 2 -q reads.fastq.gz -i db.dix -o hits.m8
//! ```
//! The output format follows from the suffix of the output file, see
//! [format].
//!
//! # Library usage
//! ```rust
//! use dixsearch::alphabet::{Alphabet, Reduction};
//! use dixsearch::db::Database;
//! use dixsearch::index::IndexOpts;
//! use dixsearch::seqset::SequenceSet;
//! use dixsearch::translate::{translate_set, GeneticCode, Program, Side};
//!
//! let subject = b"MSTNPKPQRKTKRNTNRRPQDVKFPGGGQIVGGVYLLPRRGPRLGVRATRKTSERSQPRGRR";
//! let mut subjects = SequenceSet::new();
//! subjects.push(&Alphabet::AminoAcid.encode_seq(subject)).unwrap();
//!
//! let mut index_opts = IndexOpts::default();
//! index_opts.program = Program::Blastp;
//! index_opts.reduction = Reduction::None;
//! index_opts.check_memory = false;
//! let db = Database::build(vec!["core".to_string()], &subjects, &index_opts).unwrap();
//!
//! let mut queries = SequenceSet::new();
//! queries.push(&Alphabet::AminoAcid.encode_seq(&subject[10..40])).unwrap();
//! let queries = translate_set(&queries, Program::Blastp, Side::Query, &GeneticCode::default()).unwrap();
//!
//! let mut opts = dixsearch::SearchOpts::default();
//! opts.program = Program::Blastp;
//! opts.reduction = Reduction::None;
//! let (alignments, _) = dixsearch::search(&queries, &db, &opts).unwrap();
//! # assert_eq!(alignments.len(), 1);
//! # assert_eq!((alignments[0].subj_begin, alignments[0].subj_end), (10, 40));
//! ```
//!

#![warn(missing_docs,
        missing_debug_implementations, missing_copy_implementations,
        trivial_casts, trivial_numeric_casts,
        unsafe_code,
        unstable_features,
        unused_import_braces, unused_qualifications)]

use std::path::Path;
use std::path::PathBuf;

use log::info;

pub mod alphabet;
pub mod db;
pub mod error;
pub mod extend;
pub mod format;
pub mod hits;
pub mod index;
pub mod memory;
pub mod pipeline;
pub mod scoring;
pub mod search;
pub mod seeds;
pub mod seqset;
pub mod stats;
pub mod taxonomy;
pub mod translate;
pub mod trie;

pub use error::Error;
pub use pipeline::SearchOpts;

use db::Database;
use extend::Alignment;
use index::IndexOpts;
use seqset::SequenceSet;
use seqset::TranslatedSet;
use stats::SearchStats;
use translate::GeneticCode;
use translate::Program;
use translate::Side;

/// Sequences read from one or more files with their names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamedSequences {
    /// Record names.
    pub names: Vec<String>,
    /// Encoded sequences.
    pub seqs: SequenceSet,
}

/// Reads and concatenates the records of `seq_files` in the alphabet
/// `program` reads `side` in.
///
/// Files may be FASTA or FASTQ, gzipped or not.
pub fn read_sequence_files(
    seq_files: &[PathBuf],
    program: Program,
    side: Side,
) -> Result<NamedSequences, Error> {
    let alphabet = program.original_alphabet(side);
    let mut res = NamedSequences::default();
    for file in seq_files {
        let (names, seqs) = db::read_sequences(file, alphabet)?;
        info!("Read {} sequences from {}", names.len(), file.display());
        for seq in seqs.iter() {
            res.seqs.push(seq)?;
        }
        res.names.extend(names);
    }
    Ok(res)
}

/// Builds a subject database from some fasta or fastq files.
///
/// Reads all sequence data in `seq_files`, translates it as needed by
/// `opts.program` and indexes it with the parameters in `opts` (see
/// [IndexOpts] for details). With `accession2taxid` set, the subjects are
/// assigned taxids and, given `nodes_dmp`, the taxonomy tree.
///
/// Returns the database; write it to disk with [Database::save].
pub fn build_database(
    seq_files: &[PathBuf],
    opts: &IndexOpts,
    accession2taxid: Option<&Path>,
    nodes_dmp: Option<&Path>,
) -> Result<Database, Error> {
    opts.validate()?;
    let subjects = read_sequence_files(seq_files, opts.program, Side::Subject)?;
    let mut db = Database::build(subjects.names, &subjects.seqs, opts)?;

    if let Some(path) = accession2taxid {
        info!("Mapping subject accessions to taxids with {}", path.display());
        let accessions = taxonomy::subject_accessions(&db.names);
        let mapped = taxonomy::map_accessions(taxonomy::open_text(path)?, &accessions, db.n_subjects(), path)?;
        let tree = match nodes_dmp {
            Some(nodes) => Some(taxonomy::parse_tax_tree(taxonomy::open_text(nodes)?, &mapped.present, nodes)?),
            None => None,
        };
        db.set_taxonomy(mapped, tree)?;
    }

    Ok(db)
}

/// Reads query files and translates them for `opts.program`.
pub fn read_queries(
    query_files: &[PathBuf],
    opts: &SearchOpts,
) -> Result<(Vec<String>, TranslatedSet), Error> {
    let code = GeneticCode::from_id(opts.genetic_code)?;
    let queries = read_sequence_files(query_files, opts.program, Side::Query)?;
    let translated = translate::translate_set(&queries.seqs, opts.program, Side::Query, &code)?;
    Ok((queries.names, translated))
}

/// Searches translated `queries` against `db`.
///
/// Runs the block-parallel [pipeline] with the options in `opts` (see
/// [SearchOpts] for details) and returns the alignments sorted by query
/// and E-value, together with the search counters.
pub fn search(
    queries: &TranslatedSet,
    db: &Database,
    opts: &SearchOpts,
) -> Result<(Vec<Alignment>, SearchStats), Error> {
    let pipeline = pipeline::SearchPipeline::new(opts, db)?;
    pipeline.run(queries)
}
