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

use dixsearch::alphabet::Reduction;
use dixsearch::db::Database;
use dixsearch::format::OutputFormat;
use dixsearch::format::Report;
use dixsearch::index::IndexOpts;
use dixsearch::index::IndexVariant;
use dixsearch::translate::Program;

// HCV core protein
const CORE: &str = "MSTNPKPQRKTKRNTNRRPQDVKFPGGGQIVGGVYLLPRRGPRLGVRATRKTSERSQPRGRRQPIPKARRPEGRTWAQPGYPWPLYGNEGLGWAGWLLSPRGSRPSWGPTDPRRRSRNLGKVIDTLTCGFADLMGYIPLVGAPLGGAARALAHGVRVLEDGVNYATGNLPGCSFSIFLLALLSCLTVPASA";

fn write_fasta(dir: &Path, name: &str, records: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for (header, seq) in records {
        writeln!(file, ">{}\n{}", header, seq).unwrap();
    }
    path
}

fn back_translate(protein: &str) -> String {
    protein.chars().map(|aa| match aa {
        'A' => "GCT", 'R' => "CGT", 'N' => "AAT", 'D' => "GAT", 'C' => "TGT",
        'Q' => "CAA", 'E' => "GAA", 'G' => "GGT", 'H' => "CAT", 'I' => "ATT",
        'L' => "CTG", 'K' => "AAA", 'M' => "ATG", 'F' => "TTT", 'P' => "CCG",
        'S' => "TCT", 'T' => "ACT", 'W' => "TGG", 'Y' => "TAT", 'V' => "GTT",
        _ => panic!("no codon for {}", aa),
    }).collect()
}

fn index_opts(program: Program, reduction: Reduction, variant: IndexVariant) -> IndexOpts {
    let mut opts = IndexOpts::default();
    opts.program = program;
    opts.reduction = reduction;
    opts.variant = variant;
    opts.check_memory = false;
    opts
}

fn search_opts(program: Program, reduction: Reduction) -> dixsearch::SearchOpts {
    let mut opts = dixsearch::SearchOpts::default();
    opts.program = program;
    opts.reduction = reduction;
    opts.seed_length = 5;
    opts.seed_offset = 2;
    opts
}

#[test]
fn blastp_exact_match_to_tabular_file() {
    let dir = tempfile::tempdir().unwrap();
    let subjects = write_fasta(dir.path(), "db.fasta", &[("core hcv core protein", CORE), ("poly", "WWWWWWWWWWWWWWWWWWWW")]);
    let queries = write_fasta(dir.path(), "queries.fasta", &[("query_1", &CORE[40..60])]);

    let db = dixsearch::build_database(&[subjects], &index_opts(Program::Blastp, Reduction::None, IndexVariant::FmIndex), None, None).unwrap();
    let index_dir = dir.path().join("db.dix");
    db.save(&index_dir).unwrap();
    let db = Database::load(&index_dir).unwrap();

    let opts = search_opts(Program::Blastp, Reduction::None);
    let (names, translated) = dixsearch::read_queries(&[queries], &opts).unwrap();
    let (alignments, stats) = dixsearch::search(&translated, &db, &opts).unwrap();
    assert_eq!(alignments.len(), 1);
    assert_eq!(stats.alignments, 1);

    let output = dir.path().join("hits.m8");
    let (format, gzip) = OutputFormat::from_path(&output).unwrap();
    assert_eq!(format, OutputFormat::Tabular);
    assert!(!gzip);

    let scheme = opts.scoring_scheme().unwrap();
    let report = Report {
        program: opts.program,
        queries: &translated,
        query_names: &names,
        db: &db,
        db_name: "db.dix",
        scheme: &scheme,
        with_taxids: false,
    };
    let mut out = dixsearch::format::create_output(&output, gzip).unwrap();
    dixsearch::format::write_report(&mut out, format, &report, &alignments).unwrap();
    out.finish().unwrap();

    let contents = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    let cols: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(cols.len(), 12);
    assert_eq!(&cols[..10], &["query_1", "core", "100.00", "20", "0", "0", "1", "20", "41", "60"]);
}

#[test]
fn zero_queries_give_zero_alignments() {
    let dir = tempfile::tempdir().unwrap();
    let subjects = write_fasta(dir.path(), "db.fasta", &[("core", CORE)]);
    let queries = dir.path().join("empty.fasta");
    std::fs::File::create(&queries).unwrap();

    let db = dixsearch::build_database(&[subjects], &index_opts(Program::Blastp, Reduction::None, IndexVariant::SuffixArray), None, None).unwrap();
    let opts = search_opts(Program::Blastp, Reduction::None);
    let (names, translated) = dixsearch::read_queries(&[queries], &opts).unwrap();
    assert!(names.is_empty());

    let (alignments, stats) = dixsearch::search(&translated, &db, &opts).unwrap();
    assert!(alignments.is_empty());
    assert_eq!(stats.alignments, 0);
}

#[test]
fn blastx_finds_the_forward_frame() {
    let dir = tempfile::tempdir().unwrap();
    let subjects = write_fasta(dir.path(), "db.fasta", &[("core", CORE)]);
    let read = back_translate(&CORE[40..60]);
    let queries = write_fasta(dir.path(), "reads.fasta", &[("read_1", &read)]);

    let db = dixsearch::build_database(&[subjects], &index_opts(Program::Blastx, Reduction::Murphy10, IndexVariant::BiFmIndex), None, None).unwrap();
    let opts = search_opts(Program::Blastx, Reduction::Murphy10);
    let (_, translated) = dixsearch::read_queries(&[queries], &opts).unwrap();
    assert_eq!(translated.n_original(), 1);
    assert_eq!(translated.len(), 6);

    let (alignments, _) = dixsearch::search(&translated, &db, &opts).unwrap();
    assert!(!alignments.is_empty());
    let best = &alignments[0];
    assert_eq!(translated.origin(best.qry_id).frame, 1);
    assert_eq!((best.subj_begin, best.subj_end), (40, 60));
    assert_eq!(best.identities, 20);
}

#[test]
fn thread_count_does_not_change_output() {
    let dir = tempfile::tempdir().unwrap();
    let subjects = write_fasta(dir.path(), "db.fasta", &[("core", CORE), ("tail", &CORE[90..]), ("head", &CORE[..110])]);
    let pieces: Vec<(String, &str)> = (0..10).map(|i| (format!("q{}", i), &CORE[i * 17..i * 17 + 22])).collect();
    let records: Vec<(&str, &str)> = pieces.iter().map(|(name, seq)| (name.as_str(), *seq)).collect();
    let queries = write_fasta(dir.path(), "queries.fasta", &records);

    let db = dixsearch::build_database(&[subjects], &index_opts(Program::Blastp, Reduction::None, IndexVariant::FmIndex), None, None).unwrap();
    let mut opts = search_opts(Program::Blastp, Reduction::None);
    opts.block_size = 3;
    let (_, translated) = dixsearch::read_queries(&[queries], &opts).unwrap();

    let single = dixsearch::search(&translated, &db, &opts).unwrap();
    opts.num_threads = 3;
    let multi = dixsearch::search(&translated, &db, &opts).unwrap();

    assert!(!single.0.is_empty());
    assert_eq!(single.0, multi.0);
    assert_eq!(single.1, multi.1);
}

#[test]
fn search_rejects_a_mismatched_database() {
    let dir = tempfile::tempdir().unwrap();
    let subjects = write_fasta(dir.path(), "db.fasta", &[("core", CORE)]);
    let db = dixsearch::build_database(&[subjects], &index_opts(Program::Blastp, Reduction::None, IndexVariant::FmIndex), None, None).unwrap();

    let queries = dixsearch::seqset::TranslatedSet::new(Program::Blastx.translated_alphabet());
    let opts = search_opts(Program::Blastx, Reduction::Murphy10);
    let got = dixsearch::search(&queries, &db, &opts);
    assert!(matches!(got, Err(dixsearch::Error::Config(_))));
}
