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
//! Subject databases: building, saving and loading.
//!
//! A database directory holds the subject names, the translated
//! (unreduced) subjects used for extension, the index over their reduced
//! text and a handful of `option:<name>` files recording how it was
//! built. See [index::persist](crate::index::persist) for the layout.
use std::path::Path;

use log::info;
use log::warn;

use crate::alphabet::Alphabet;
use crate::alphabet::Reduction;
use crate::error::Error;
use crate::index::persist;
use crate::index::IndexOpts;
use crate::index::IndexVariant;
use crate::index::SubjectIndex;
use crate::memory;
use crate::seqset::ReducedView;
use crate::seqset::SequenceSet;
use crate::seqset::TranslatedSet;
use crate::taxonomy;
use crate::taxonomy::AccessionMap;
use crate::taxonomy::TaxTree;
use crate::translate::translate_set;
use crate::translate::GeneticCode;
use crate::translate::Program;
use crate::translate::Side;

/// Reads the records of a FASTA or FASTQ file, gzipped or not.
///
/// Sequences are encoded in `alphabet`. Empty records are skipped with a
/// warning and an empty file yields no records.
pub fn read_sequences(path: &Path, alphabet: Alphabet) -> Result<(Vec<String>, SequenceSet), Error> {
    let mut names: Vec<String> = Vec::new();
    let mut seqs = SequenceSet::new();
    if std::fs::metadata(path)?.len() == 0 {
        warn!("{} contains no sequences", path.display());
        return Ok((names, seqs));
    }

    let to_error = |e: needletail::errors::ParseError| Error::Parse { path: path.to_path_buf(), detail: e.to_string() };
    let mut reader = needletail::parse_fastx_file(path).map_err(to_error)?;
    while let Some(record) = reader.next() {
        let record = record.map_err(to_error)?;
        let name = String::from_utf8_lossy(record.id()).to_string();
        let seq = record.seq();
        if seq.is_empty() {
            warn!("Skipping empty sequence `{}` in {}", name, path.display());
            continue;
        }
        seqs.push(&alphabet.encode_seq(&seq))?;
        names.push(name);
    }
    Ok((names, seqs))
}

/// Indexed subject database.
#[derive(Clone, Debug)]
pub struct Database {
    /// Names of the original subjects.
    pub names: Vec<String>,
    /// Translated, unreduced subjects.
    pub subjects: TranslatedSet,
    /// Index over the reduced subjects.
    pub index: SubjectIndex,
    /// Alphabet the subjects were read in.
    pub orig_alphabet: Alphabet,
    /// Reduction applied to the indexed text.
    pub reduction: Reduction,
    /// Genetic code used for translating the subjects.
    pub genetic_code: u8,
    /// Taxids of each original subject.
    pub staxids: Option<Vec<Vec<u32>>>,
    /// Taxonomy of the subjects.
    pub tax_tree: Option<TaxTree>,
}

impl Database {
    /// Translates and indexes the subjects `original` with names `names`.
    ///
    /// `original` is in `opts.program.original_alphabet(Side::Subject)`.
    pub fn build(names: Vec<String>, original: &SequenceSet, opts: &IndexOpts) -> Result<Database, Error> {
        opts.validate()?;
        if names.len() != original.len() {
            return Err(Error::Config(format!("got {} names for {} subjects", names.len(), original.len())));
        }
        let code = GeneticCode::from_id(opts.genetic_code)?;

        info!("Translating {} subjects for {}", original.len(), opts.program);
        let subjects = translate_set(original, opts.program, Side::Subject, &code)?;
        let view = ReducedView::new(&subjects.seqs, subjects.alphabet, opts.reduction);

        if opts.check_memory {
            let text_len = view.total_len() + view.len() + 1;
            memory::check_available(memory::estimate_index_bytes(opts.variant, text_len, view.alphabet().size(), opts.sa_sampling))?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.num_threads)
            .thread_name(|i| format!("rayon-thread-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("could not start {} threads: {}", opts.num_threads, e)))?;

        info!("Building {} index over {} symbols", opts.variant, view.total_len());
        let index = pool.install(|| SubjectIndex::build(&view, opts.variant, opts.sa_sampling))?;

        Ok(Database {
            names,
            index,
            subjects,
            orig_alphabet: opts.program.original_alphabet(Side::Subject),
            reduction: opts.reduction,
            genetic_code: opts.genetic_code,
            staxids: None,
            tax_tree: None,
        })
    }

    /// Number of original subjects.
    pub fn n_subjects(&self) -> usize {
        self.names.len()
    }

    /// Alphabet of the translated subjects.
    pub fn translated_alphabet(&self) -> Alphabet {
        self.subjects.alphabet
    }

    /// Attaches subject taxids and optionally their taxonomy tree.
    pub fn set_taxonomy(&mut self, accessions: AccessionMap, tree: Option<TaxTree>) -> Result<(), Error> {
        if accessions.staxids.len() != self.n_subjects() {
            return Err(Error::Config(format!("got taxids for {} subjects, database has {}", accessions.staxids.len(), self.n_subjects())));
        }
        self.staxids = Some(accessions.staxids);
        self.tax_tree = tree;
        Ok(())
    }

    /// Writes the database into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(dir)?;
        info!("Writing database to {}", dir.display());
        persist::save_names(&self.names, dir)?;
        persist::save_subjects(&self.subjects, dir)?;
        persist::save_index(&self.index, dir)?;

        persist::write_option(dir, "db_index_type", &self.index.variant().id().to_string())?;
        persist::write_option(dir, "alph_original", self.orig_alphabet.name())?;
        persist::write_option(dir, "alph_translated", self.subjects.alphabet.name())?;
        persist::write_option(dir, "alph_reduced", self.index.alphabet().name())?;
        persist::write_option(dir, "genetic_code", &self.genetic_code.to_string())?;
        persist::write_option(dir, "subj_seq_len_bits", "64")?;
        persist::write_option(dir, "generation", &persist::INDEX_GENERATION.to_string())?;

        if let Some(staxids) = &self.staxids {
            taxonomy::save_staxids(staxids, dir)?;
        }
        if let Some(tree) = &self.tax_tree {
            taxonomy::save_tax_tree(tree, dir)?;
        }
        Ok(())
    }

    /// Reads a database written by [Database::save].
    pub fn load(dir: &Path) -> Result<Database, Error> {
        let generation = read_number(dir, "generation")?;
        if generation != persist::INDEX_GENERATION {
            return Err(Error::Config(format!("database {} has format generation {}, expected {}: rebuild the index", dir.display(), generation, persist::INDEX_GENERATION)));
        }
        if read_number(dir, "subj_seq_len_bits")? != 64 {
            return Err(Error::Config("database sequence lengths are not 64 bits".to_string()));
        }
        let variant = IndexVariant::from_id(read_byte(dir, "db_index_type")?)?;
        let orig_alphabet = read_alphabet(dir, "alph_original")?;
        let translated = read_alphabet(dir, "alph_translated")?;
        let reduced = read_alphabet(dir, "alph_reduced")?;
        let reduction = if reduced == translated { Reduction::None } else { Reduction::Murphy10 };
        if reduction.target(translated) != reduced {
            return Err(Error::CorruptIndex(format!("cannot reduce {} to {}", translated.name(), reduced.name())));
        }
        let genetic_code = read_byte(dir, "genetic_code")?;

        info!("Loading {} index from {}", variant, dir.display());
        let names = persist::load_names(dir)?;
        let subjects = persist::load_subjects(dir)?;
        let index = persist::load_index(variant, dir)?;

        if subjects.alphabet != translated || index.alphabet() != reduced {
            return Err(Error::CorruptIndex("alphabets of the stored data do not match the option files".to_string()));
        }
        if subjects.n_original() != names.len() {
            return Err(Error::CorruptIndex(format!("{} subject names for {} subjects", names.len(), subjects.n_original())));
        }
        if index.n_subjects() != subjects.len() {
            return Err(Error::CorruptIndex(format!("index has {} subjects, sequence file {}", index.n_subjects(), subjects.len())));
        }

        let staxids = taxonomy::load_staxids(dir, names.len())?;
        let tax_tree = taxonomy::load_tax_tree(dir)?;

        Ok(Database { names, subjects, index, orig_alphabet, reduction, genetic_code, staxids, tax_tree })
    }

    /// Checks that the database can be searched with `program` and
    /// `reduction`.
    pub fn check_compatible(&self, program: Program, reduction: Reduction, genetic_code: u8) -> Result<(), Error> {
        if self.orig_alphabet != program.original_alphabet(Side::Subject) || self.subjects.alphabet != program.translated_alphabet() {
            return Err(Error::Config(format!(
                "database holds {} subjects compared as {}, {} needs {} compared as {}",
                self.orig_alphabet.name(), self.subjects.alphabet.name(), program,
                program.original_alphabet(Side::Subject).name(), program.translated_alphabet().name())));
        }
        if self.reduction != reduction {
            return Err(Error::Config(format!("database was built with alphabet reduction {}, search requested {}", self.reduction.level(), reduction.level())));
        }
        if program.is_translated(Side::Subject) && genetic_code != self.genetic_code {
            warn!("Subjects were translated with genetic code {}, queries use {}", self.genetic_code, genetic_code);
        }
        Ok(())
    }
}

fn read_number(dir: &Path, name: &str) -> Result<u64, Error> {
    let value = persist::read_option(dir, name)?;
    value.parse().map_err(|_| Error::CorruptIndex(format!("option {} has invalid value `{}`", name, value)))
}

fn read_byte(dir: &Path, name: &str) -> Result<u8, Error> {
    let value = read_number(dir, name)?;
    u8::try_from(value).map_err(|_| Error::CorruptIndex(format!("option {} has out of range value {}", name, value)))
}

fn read_alphabet(dir: &Path, name: &str) -> Result<Alphabet, Error> {
    let value = persist::read_option(dir, name)?;
    Alphabet::from_name(&value).ok_or_else(|| Error::CorruptIndex(format!("option {} has unknown alphabet `{}`", name, value)))
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut out = std::fs::File::create(&path).unwrap();
        out.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn protein_opts(variant: IndexVariant) -> IndexOpts {
        let mut opts = IndexOpts::default();
        opts.program = Program::Blastp;
        opts.reduction = Reduction::None;
        opts.variant = variant;
        opts.check_memory = false;
        opts
    }

    #[test]
    fn read_skips_empty_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(dir.path(), "subj.fa", ">a first\nMKVL\nAW\n>empty\n>b\nqqk\n");
        let (names, seqs) = read_sequences(&path, Alphabet::AminoAcid).unwrap();
        assert_eq!(names, vec!["a first".to_string(), "b".to_string()]);
        assert_eq!(seqs.get(0), Alphabet::AminoAcid.encode_seq(b"MKVLAW").as_slice());
        assert_eq!(seqs.get(1), Alphabet::AminoAcid.encode_seq(b"QQK").as_slice());
    }

    #[test]
    fn read_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(dir.path(), "empty.fa", "");
        let (names, seqs) = read_sequences(&path, Alphabet::Dna5).unwrap();
        assert!(names.is_empty());
        assert!(seqs.is_empty());
    }

    #[test]
    fn read_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(dir.path(), "bad.fa", "this is not fasta\n");
        assert!(matches!(read_sequences(&path, Alphabet::Dna5), Err(Error::Parse { .. })));
    }

    #[test]
    fn save_and_load_every_variant() {
        let mut set = SequenceSet::new();
        set.push(&Alphabet::AminoAcid.encode_seq(b"MKVLAWHH")).unwrap();
        set.push(&Alphabet::AminoAcid.encode_seq(b"KVQQ")).unwrap();
        let names = vec!["s1".to_string(), "s2".to_string()];

        for variant in [IndexVariant::SuffixArray, IndexVariant::FmIndex, IndexVariant::BiFmIndex] {
            let dir = tempfile::tempdir().unwrap();
            let db = Database::build(names.clone(), &set, &protein_opts(variant)).unwrap();
            db.save(dir.path()).unwrap();

            let loaded = Database::load(dir.path()).unwrap();
            assert_eq!(loaded.names, names);
            assert_eq!(loaded.subjects, db.subjects);
            assert_eq!(loaded.index.variant(), variant);
            assert_eq!(loaded.reduction, Reduction::None);
            assert!(loaded.staxids.is_none());
            assert!(loaded.check_compatible(Program::Blastx, Reduction::None, 1).is_ok());
            assert!(matches!(loaded.check_compatible(Program::Blastn, Reduction::None, 1), Err(Error::Config(_))));
            assert!(matches!(loaded.check_compatible(Program::Blastp, Reduction::Murphy10, 1), Err(Error::Config(_))));
        }
    }

    #[test]
    fn translated_subjects_keep_frames() {
        let mut set = SequenceSet::new();
        set.push(&Alphabet::Dna5.encode_seq(b"ATGAAAGTTCTGTAA")).unwrap();
        let mut opts = protein_opts(IndexVariant::FmIndex);
        opts.program = Program::Tblastn;
        opts.reduction = Reduction::Murphy10;
        let db = Database::build(vec!["dna".to_string()], &set, &opts).unwrap();
        assert_eq!(db.subjects.len(), 6);
        assert_eq!(db.subjects.orig_lens, vec![15]);
        assert_eq!(db.index.alphabet(), Alphabet::Murphy10);
        assert_eq!(db.orig_alphabet, Alphabet::Dna5);
    }

    #[test]
    fn load_rejects_other_generations() {
        let mut set = SequenceSet::new();
        set.push(&Alphabet::AminoAcid.encode_seq(b"MKVL")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let db = Database::build(vec!["s".to_string()], &set, &protein_opts(IndexVariant::SuffixArray)).unwrap();
        db.save(dir.path()).unwrap();

        persist::write_option(dir.path(), "generation", "0").unwrap();
        assert!(matches!(Database::load(dir.path()), Err(Error::Config(_))));
        std::fs::remove_file(dir.path().join("option:generation")).unwrap();
        assert!(matches!(Database::load(dir.path()), Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn load_rejects_out_of_range_options() {
        let mut set = SequenceSet::new();
        set.push(&Alphabet::AminoAcid.encode_seq(b"MKVL")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let db = Database::build(vec!["s".to_string()], &set, &protein_opts(IndexVariant::FmIndex)).unwrap();
        db.save(dir.path()).unwrap();

        // 257 would wrap around to the FM-index id
        persist::write_option(dir.path(), "db_index_type", "257").unwrap();
        assert!(matches!(Database::load(dir.path()), Err(Error::CorruptIndex(_))));

        persist::write_option(dir.path(), "db_index_type", "1").unwrap();
        assert!(Database::load(dir.path()).is_ok());
        persist::write_option(dir.path(), "genetic_code", "257").unwrap();
        assert!(matches!(Database::load(dir.path()), Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn taxonomy_is_saved_with_the_database() {
        let mut set = SequenceSet::new();
        set.push(&Alphabet::AminoAcid.encode_seq(b"MKVL")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::build(vec!["WP_1.1".to_string()], &set, &protein_opts(IndexVariant::FmIndex)).unwrap();
        let accessions = AccessionMap { staxids: vec![vec![562]], present: [562].into_iter().collect() };
        db.set_taxonomy(accessions, None).unwrap();
        db.save(dir.path()).unwrap();
        let loaded = Database::load(dir.path()).unwrap();
        assert_eq!(loaded.staxids, Some(vec![vec![562]]));
        assert!(loaded.tax_tree.is_none());
    }
}
