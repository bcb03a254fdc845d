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
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use random::Source;

use dixsearch::alphabet::Reduction;
use dixsearch::db::Database;
use dixsearch::index::IndexOpts;
use dixsearch::index::IndexVariant;
use dixsearch::translate::Program;

const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";

fn random_protein(source: &mut random::Default, len: usize) -> String {
    (0..len).map(|_| AMINO_ACIDS[(source.read::<u64>() % AMINO_ACIDS.len() as u64) as usize] as char).collect()
}

fn write_fasta(dir: &Path, records: &[(String, String)]) -> PathBuf {
    let path = dir.join("db.fasta");
    let mut file = std::fs::File::create(&path).unwrap();
    for (header, seq) in records {
        writeln!(file, ">{}\n{}", header, seq).unwrap();
    }
    path
}

fn write_gz(path: &Path, contents: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn subjects(seed: u64) -> Vec<(String, String)> {
    let mut source = random::Default::new([seed, 121232]);
    (0..4).map(|i| (format!("WP_{:06}.1 protein {}", i, i), random_protein(&mut source, 150 + 10 * i))).collect()
}

fn opts(program: Program, reduction: Reduction, variant: IndexVariant) -> IndexOpts {
    let mut opts = IndexOpts::default();
    opts.program = program;
    opts.reduction = reduction;
    opts.variant = variant;
    opts.check_memory = false;
    opts
}

#[test]
fn saved_database_searches_like_the_built_one() {
    let records = subjects(7);
    for variant in [IndexVariant::SuffixArray, IndexVariant::FmIndex, IndexVariant::BiFmIndex] {
        let dir = tempfile::tempdir().unwrap();
        let fasta = write_fasta(dir.path(), &records);
        let built = dixsearch::build_database(&[fasta], &opts(Program::Blastp, Reduction::Murphy10, variant), None, None).unwrap();

        let index_dir = dir.path().join("db.dix");
        built.save(&index_dir).unwrap();
        let loaded = Database::load(&index_dir).unwrap();

        assert_eq!(loaded.names, built.names);
        assert_eq!(loaded.subjects, built.subjects);
        assert_eq!(loaded.index, built.index);
        assert_eq!(loaded.reduction, Reduction::Murphy10);
        assert!(loaded.staxids.is_none());

        let mut search = dixsearch::SearchOpts::default();
        search.program = Program::Blastp;
        search.reduction = Reduction::Murphy10;
        let query = &records[2].1[30..90];
        let mut set = dixsearch::seqset::SequenceSet::new();
        set.push(&dixsearch::alphabet::Alphabet::AminoAcid.encode_seq(query.as_bytes())).unwrap();
        let queries = dixsearch::translate::translate_set(&set, Program::Blastp, dixsearch::translate::Side::Query, &Default::default()).unwrap();

        let from_built = dixsearch::search(&queries, &built, &search).unwrap();
        let from_loaded = dixsearch::search(&queries, &loaded, &search).unwrap();
        assert_eq!(from_built.0, from_loaded.0);
        assert!(from_built.0.iter().any(|x| x.subj_id == 2 && x.subj_begin == 30 && x.subj_end == 90));
    }
}

#[test]
fn taxonomy_is_stored_with_the_database() {
    let records = subjects(11);
    let dir = tempfile::tempdir().unwrap();
    let fasta = write_fasta(dir.path(), &records);

    let acc2taxid = dir.path().join("prot.accession2taxid.gz");
    write_gz(&acc2taxid, "accession\taccession.version\ttaxid\tgi\nWP_000000\tWP_000000.1\t562\t1\nWP_000002\tWP_000002.1\t1280\t2\nXP_999999\tXP_999999.1\t9606\t3\n");
    let nodes = dir.path().join("nodes.dmp");
    std::fs::write(&nodes, "1\t|\t1\t|\tno rank\t|\n2\t|\t1\t|\tsuperkingdom\t|\n561\t|\t2\t|\tgenus\t|\n562\t|\t561\t|\tspecies\t|\n1279\t|\t2\t|\tgenus\t|\n1280\t|\t1279\t|\tspecies\t|\n9606\t|\t1\t|\tspecies\t|\n").unwrap();

    let built = dixsearch::build_database(&[fasta], &opts(Program::Blastp, Reduction::None, IndexVariant::FmIndex), Some(&acc2taxid), Some(&nodes)).unwrap();
    let expected_staxids = vec![vec![562], vec![], vec![1280], vec![]];
    assert_eq!(built.staxids.as_ref().unwrap(), &expected_staxids);

    let index_dir = dir.path().join("db.dix");
    built.save(&index_dir).unwrap();
    let loaded = Database::load(&index_dir).unwrap();
    assert_eq!(loaded.staxids.unwrap(), expected_staxids);

    let tree = loaded.tax_tree.unwrap();
    assert_eq!(tree.lineage(562), vec![561, 2, 1]);
    assert_eq!(tree.lineage(1280), vec![1279, 2, 1]);
    assert!(!tree.nodes.contains_key(&9606));
}

#[test]
fn stale_generation_is_rejected() {
    let records = subjects(3);
    let dir = tempfile::tempdir().unwrap();
    let fasta = write_fasta(dir.path(), &records);
    let built = dixsearch::build_database(&[fasta], &opts(Program::Blastp, Reduction::None, IndexVariant::SuffixArray), None, None).unwrap();

    let index_dir = dir.path().join("db.dix");
    built.save(&index_dir).unwrap();
    std::fs::write(index_dir.join("option:generation"), "0\n").unwrap();

    let got = Database::load(&index_dir);
    assert!(matches!(got, Err(dixsearch::Error::Config(_))));
}

#[test]
fn missing_index_file_is_corrupt() {
    let records = subjects(5);
    let dir = tempfile::tempdir().unwrap();
    let fasta = write_fasta(dir.path(), &records);
    let built = dixsearch::build_database(&[fasta], &opts(Program::Blastp, Reduction::None, IndexVariant::FmIndex), None, None).unwrap();

    let index_dir = dir.path().join("db.dix");
    built.save(&index_dir).unwrap();
    std::fs::remove_file(index_dir.join("option:alph_reduced")).unwrap();

    let got = Database::load(&index_dir);
    assert!(matches!(got, Err(dixsearch::Error::CorruptIndex(_))));
}
