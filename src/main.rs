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
use anyhow::Context;
use clap::Parser;
use log::error;
use log::info;
use log::warn;

use dixsearch::alphabet::Reduction;
use dixsearch::db::Database;
use dixsearch::format::OutputFormat;
use dixsearch::format::Report;
use dixsearch::index::IndexOpts;
use dixsearch::index::IndexVariant;
use dixsearch::translate::Program;

// Command-line interface
mod cli;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) -> anyhow::Result<()> {
    stderrlog::new()
        .module(module_path!())
        .quiet(false)
        .verbosity(log_max_level)
        .timestamp(stderrlog::Timestamp::Off)
        .init()
        .context("could not initialize logging")
}

fn index(args: &cli::IndexArgs) -> anyhow::Result<()> {
    let cli::IndexArgs {
        seq_files,
        index_dir,
        program,
        reduction,
        index_type,
        genetic_code,
        sa_sampling,
        accession2taxid,
        nodes_dmp,
        num_threads,
        no_memory_check,
        ..
    } = args;

    let mut opts = IndexOpts::default();
    opts.program = program.parse::<Program>()?;
    opts.reduction = Reduction::from_level(*reduction)?;
    opts.variant = index_type.parse::<IndexVariant>()?;
    opts.genetic_code = *genetic_code;
    opts.sa_sampling = *sa_sampling;
    opts.num_threads = *num_threads;
    opts.check_memory = !*no_memory_check;
    opts.validate()?;

    info!("Building {} index for {} from {} files...", opts.variant, opts.program, seq_files.len());
    let db = dixsearch::build_database(seq_files, &opts, accession2taxid.as_deref(), nodes_dmp.as_deref())
        .context("building the database failed")?;

    db.save(index_dir).with_context(|| format!("writing the database to {} failed", index_dir.display()))?;
    info!("Indexed {} subjects", db.n_subjects());
    Ok(())
}

fn search(args: &cli::SearchArgs) -> anyhow::Result<()> {
    let cli::SearchArgs {
        query_files,
        index_dir,
        output,
        max_matches,
        staxids,
        program,
        reduction,
        genetic_code,
        max_evalue,
        seed_length,
        seed_offset,
        seed_delta,
        max_seed_hits,
        no_double_indexing,
        no_filter_duplicates,
        filter_abundant,
        abundance_threshold,
        no_merge_siblings,
        gap_open,
        gap_extend,
        reward,
        penalty,
        band,
        num_threads,
        block_size,
        ..
    } = args;

    // Resolve the output format before touching any data
    let (format, gzip) = OutputFormat::from_path(output)?;

    let mut opts = dixsearch::SearchOpts::default();
    opts.program = program.parse::<Program>()?;
    opts.reduction = Reduction::from_level(*reduction)?;
    opts.genetic_code = *genetic_code;
    opts.seed_length = *seed_length;
    opts.seed_offset = *seed_offset;
    opts.seed_delta = *seed_delta;
    opts.max_seed_hits = *max_seed_hits;
    opts.double_indexing = !*no_double_indexing;
    opts.filters.filter_duplicates = !*no_filter_duplicates;
    opts.filters.filter_abundant = *filter_abundant;
    opts.filters.abundance_threshold = *abundance_threshold;
    opts.filters.merge_siblings = !*no_merge_siblings;
    opts.reward = *reward;
    opts.penalty = *penalty;
    opts.gap_open = *gap_open;
    opts.gap_extend = *gap_extend;
    opts.band = *band;
    opts.max_evalue = *max_evalue;
    opts.max_matches = *max_matches;
    opts.block_size = *block_size;
    opts.num_threads = *num_threads;
    opts.validate()?;

    let db = Database::load(index_dir).with_context(|| format!("loading the database from {} failed", index_dir.display()))?;
    if *staxids && db.staxids.is_none() {
        warn!("--staxids requested but {} has no taxids, omitting the column", index_dir.display());
    }

    info!("Reading queries from {} files...", query_files.len());
    let (query_names, queries) = dixsearch::read_queries(query_files, &opts)?;

    info!("Searching {} queries...", query_names.len());
    let (alignments, stats) = dixsearch::search(&queries, &db, &opts)?;
    info!("Found {} alignments from {} seeds in {} blocks ({} failed)",
          stats.alignments, stats.seeds, stats.blocks, stats.failed_blocks);
    info!("Hits: {} total, {} duplicate, {} abundant, {} merged, {} contained, {} over the E-value cutoff",
          stats.hits, stats.hits_duplicate, stats.hits_abundant, stats.hits_merged, stats.hits_contained, stats.rejected_evalue);

    let scheme = opts.scoring_scheme()?;
    let db_name = index_dir.display().to_string();
    let report = Report {
        program: opts.program,
        queries: &queries,
        query_names: &query_names,
        db: &db,
        db_name: &db_name,
        scheme: &scheme,
        with_taxids: *staxids,
    };

    let mut out = dixsearch::format::create_output(output, gzip)?;
    dixsearch::format::write_report(&mut out, format, &report, &alignments)?;
    out.finish().with_context(|| format!("writing {} failed", output.display()))?;
    info!("Wrote {} alignments to {}", alignments.len(), output.display());
    Ok(())
}

/// Use `dixsearch` to list the available commands or `dixsearch <command>` to run.
///
/// # Input format detection
/// The sequence data is read using
/// [needletail::parser::parse_fastx_file](https://docs.rs/needletail/latest/needletail/parser/fn.parse_fastx_file.html).
///
/// Input file format (fasta or fastq) is detected automatically and
/// the files may be compressed in a
/// [DEFLATE-based](https://en.wikipedia.org/wiki/Deflate) format (.gz
/// files).
///
fn main() {
    let cli = cli::Cli::parse();

    let verbosity = match &cli.command {
        Some(cli::Commands::Index(args)) => args.verbosity,
        Some(cli::Commands::Search(args)) => args.verbosity,
        None => return,
    };
    if let Err(e) = init_log(verbosity as usize) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }

    // Subcommands:
    let res = match &cli.command {
        Some(cli::Commands::Index(args)) => index(args),
        Some(cli::Commands::Search(args)) => search(args),
        None => Ok(()),
    };

    if let Err(e) = res {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
