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
use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Index subject sequences
    Index(IndexArgs),

    // Search queries against an index
    Search(SearchArgs),
}

#[derive(Args)]
pub struct IndexArgs {
    // Input fasta or fastq subject file(s)
    #[arg(short = 'd', long = "database", required = true, num_args = 1.., help_heading = "Input")]
    pub seq_files: Vec<PathBuf>,

    // Outputs
    #[arg(short = 'o', long = "output", required = true, help_heading = "Output")]
    pub index_dir: PathBuf,

    // Search mode the index is built for
    #[arg(short = 'p', long = "program", default_value = "blastx", help_heading = "Index")]
    pub program: String,
    #[arg(short = 'r', long = "reduction", default_value_t = 2, help_heading = "Index")]
    pub reduction: u8,
    #[arg(short = 'x', long = "index-type", default_value = "fm", help_heading = "Index")]
    pub index_type: String,
    #[arg(long = "genetic-code", default_value_t = 1, help_heading = "Index")]
    pub genetic_code: u8,
    #[arg(long = "sa-sampling", default_value_t = 10, help_heading = "Index")]
    pub sa_sampling: usize,

    // Taxonomy
    #[arg(long = "accession2taxid", required = false, help_heading = "Taxonomy")]
    pub accession2taxid: Option<PathBuf>,
    #[arg(long = "nodes-dmp", required = false, requires = "accession2taxid", help_heading = "Taxonomy")]
    pub nodes_dmp: Option<PathBuf>,

    // Resources
    // // Threads
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub num_threads: usize,
    // // Skip the available memory check
    #[arg(long = "no-memory-check", default_value_t = false)]
    pub no_memory_check: bool,

    // Verbosity
    #[arg(short = 'v', long = "verbosity", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub verbosity: u8,
}

#[derive(Args)]
pub struct SearchArgs {
    // Input fasta or fastq query file(s)
    #[arg(short = 'q', long = "query", required = true, num_args = 1.., help_heading = "Input")]
    pub query_files: Vec<PathBuf>,

    // Index directory
    #[arg(short = 'i', long = "index", required = true, help_heading = "Input")]
    pub index_dir: PathBuf,

    // Outputs
    // // Format from suffix: .m0 .m8 .m9 .sam, optionally .gz
    #[arg(short = 'o', long = "output", required = true, help_heading = "Output")]
    pub output: PathBuf,
    #[arg(long = "max-matches", default_value_t = 500, help_heading = "Output")]
    pub max_matches: usize,
    #[arg(long = "staxids", default_value_t = false, help_heading = "Output")]
    pub staxids: bool,

    // Search mode
    #[arg(short = 'p', long = "program", default_value = "blastx", help_heading = "Search")]
    pub program: String,
    #[arg(short = 'r', long = "reduction", default_value_t = 2, help_heading = "Search")]
    pub reduction: u8,
    #[arg(long = "genetic-code", default_value_t = 1, help_heading = "Search")]
    pub genetic_code: u8,
    #[arg(short = 'e', long = "evalue", default_value_t = 1e-3, help_heading = "Search")]
    pub max_evalue: f64,

    // Seeding
    #[arg(long = "seed-length", default_value_t = 10, help_heading = "Seeding")]
    pub seed_length: usize,
    #[arg(long = "seed-offset", default_value_t = 5, help_heading = "Seeding")]
    pub seed_offset: usize,
    #[arg(long = "seed-delta", default_value_t = 0, help_heading = "Seeding")]
    pub seed_delta: usize,
    #[arg(long = "max-seed-hits", default_value_t = 0, help_heading = "Seeding")]
    pub max_seed_hits: usize,
    #[arg(long = "no-double-indexing", default_value_t = false, help_heading = "Seeding")]
    pub no_double_indexing: bool,

    // Hit filters
    #[arg(long = "no-filter-duplicates", default_value_t = false, help_heading = "Filters")]
    pub no_filter_duplicates: bool,
    #[arg(long = "filter-abundant", default_value_t = false, help_heading = "Filters")]
    pub filter_abundant: bool,
    #[arg(long = "abundance-threshold", default_value_t = 1000, help_heading = "Filters")]
    pub abundance_threshold: usize,
    #[arg(long = "no-merge-siblings", default_value_t = false, help_heading = "Filters")]
    pub no_merge_siblings: bool,

    // Scoring
    #[arg(long = "gap-open", required = false, help_heading = "Scoring")]
    pub gap_open: Option<i32>,
    #[arg(long = "gap-extend", required = false, help_heading = "Scoring")]
    pub gap_extend: Option<i32>,
    #[arg(long = "reward", default_value_t = 2, help_heading = "Scoring")]
    pub reward: i32,
    #[arg(long = "penalty", default_value_t = -3, allow_negative_numbers = true, help_heading = "Scoring")]
    pub penalty: i32,
    #[arg(long = "band", default_value_t = 32, help_heading = "Scoring")]
    pub band: usize,

    // Resources
    // // Threads
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub num_threads: usize,
    // // Original queries per block
    #[arg(long = "block-size", default_value_t = 256)]
    pub block_size: usize,

    // Verbosity
    #[arg(short = 'v', long = "verbosity", default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub verbosity: u8,
}
