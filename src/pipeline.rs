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
//! Block-parallel seed-and-extend search.
//!
//! The translated queries are split into blocks of whole original
//! queries. Blocks are dispatched one at a time to the workers of a rayon
//! thread pool; each block is searched with its own [LocalState] and adds
//! its [SearchStats] to the shared totals when it completes. A failing
//! block is logged and skipped.
use std::ops::Range;
use std::sync::Mutex;

use log::debug;
use log::info;
use log::warn;
use rayon::iter::IndexedParallelIterator;
use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator;

use crate::alphabet::Reduction;
use crate::db::Database;
use crate::error::Error;
use crate::extend::Alignment;
use crate::extend::Extender;
use crate::hits;
use crate::hits::FilterOpts;
use crate::hits::Match;
use crate::scoring::ScoringScheme;
use crate::search;
use crate::search::SeedParams;
use crate::seeds;
use crate::seeds::Seed;
use crate::seqset::ReducedView;
use crate::seqset::TranslatedSet;
use crate::stats;
use crate::stats::SearchStats;
use crate::translate::GeneticCode;
use crate::translate::Program;
use crate::trie::SeedTrie;

/// Options and parameters for [search](crate::search()).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOpts {
    /// Program mode.
    pub program: Program,
    /// Alphabet reduction, must match the database.
    pub reduction: Reduction,
    /// NCBI genetic code for translated queries.
    pub genetic_code: u8,
    /// Length of the seeds.
    pub seed_length: usize,
    /// Distance between consecutive seed starts.
    pub seed_offset: usize,
    /// Substitutions tolerated inside a seed.
    pub seed_delta: usize,
    /// Seeds with more occurrences are skipped, 0 for no limit.
    pub max_seed_hits: usize,
    /// Walk a trie of the block's seeds together with the index instead
    /// of searching every seed on its own.
    pub double_indexing: bool,
    /// Seed hit filters.
    pub filters: FilterOpts,
    /// BLASTN match score.
    pub reward: i32,
    /// BLASTN mismatch score.
    pub penalty: i32,
    /// Gap opening cost, None for the program default.
    pub gap_open: Option<i32>,
    /// Gap extension cost, None for the program default.
    pub gap_extend: Option<i32>,
    /// Diagonals searched on either side of a seed hit.
    pub band: usize,
    /// Alignments with a larger E-value are discarded.
    pub max_evalue: f64,
    /// Alignments kept per original query, 0 for no limit.
    pub max_matches: usize,
    /// Original queries per block.
    pub block_size: usize,
    /// Worker threads.
    pub num_threads: usize,
}

impl Default for SearchOpts {
    /// Default to these values:
    /// ```rust
    /// use dixsearch::alphabet::Reduction;
    /// use dixsearch::hits::FilterOpts;
    /// use dixsearch::translate::Program;
    ///
    /// let mut opts = dixsearch::SearchOpts::default();
    /// opts.program = Program::Blastx;
    /// opts.reduction = Reduction::Murphy10;
    /// opts.genetic_code = 1;
    /// opts.seed_length = 10;
    /// opts.seed_offset = 5;
    /// opts.seed_delta = 0;
    /// opts.max_seed_hits = 0;
    /// opts.double_indexing = true;
    /// opts.filters = FilterOpts::default();
    /// opts.reward = 2;
    /// opts.penalty = -3;
    /// opts.gap_open = None;
    /// opts.gap_extend = None;
    /// opts.band = 32;
    /// opts.max_evalue = 1e-3;
    /// opts.max_matches = 500;
    /// opts.block_size = 256;
    /// opts.num_threads = 1;
    /// # let expected = dixsearch::SearchOpts::default();
    /// # assert_eq!(opts, expected);
    /// ```
    ///
    fn default() -> SearchOpts {
        SearchOpts {
            program: Program::Blastx,
            reduction: Reduction::Murphy10,
            genetic_code: 1,
            seed_length: 10,
            seed_offset: 5,
            seed_delta: 0,
            max_seed_hits: 0,
            double_indexing: true,
            filters: FilterOpts::default(),
            reward: 2,
            penalty: -3,
            gap_open: None,
            gap_extend: None,
            band: 32,
            max_evalue: 1e-3,
            max_matches: 500,
            block_size: 256,
            num_threads: 1,
        }
    }
}

impl SearchOpts {
    /// Gap opening and extension costs after applying program defaults:
    /// 11/1 for BLOSUM62 and 5/2 for BLASTN.
    pub fn gap_costs(&self) -> (i32, i32) {
        let (open, extend) = match self.program {
            Program::Blastn => (5, 2),
            _ => (11, 1),
        };
        (self.gap_open.unwrap_or(open), self.gap_extend.unwrap_or(extend))
    }

    /// Scoring scheme of the search.
    pub fn scoring_scheme(&self) -> Result<ScoringScheme, Error> {
        let (open, extend) = self.gap_costs();
        ScoringScheme::new(self.program, self.reward, self.penalty, open, extend)
    }

    /// Checks the options for contradictions.
    pub fn validate(&self) -> Result<(), Error> {
        if self.num_threads == 0 {
            return Err(Error::Config("number of threads must be at least 1".to_string()));
        }
        if self.block_size == 0 {
            return Err(Error::Config("query block size must be at least 1".to_string()));
        }
        if self.seed_length == 0 || self.seed_offset == 0 {
            return Err(Error::Config(format!("seed length ({}) and offset ({}) must be at least 1", self.seed_length, self.seed_offset)));
        }
        if self.seed_delta >= self.seed_length {
            return Err(Error::Config(format!("seed delta ({}) must be smaller than the seed length ({})", self.seed_delta, self.seed_length)));
        }
        if self.max_evalue.is_nan() || self.max_evalue <= 0.0 {
            return Err(Error::Config(format!("E-value cutoff must be positive, got {}", self.max_evalue)));
        }
        if self.program.translated_alphabet() == crate::alphabet::Alphabet::Dna5 && self.reduction != Reduction::None {
            return Err(Error::Config(format!("alphabet reduction is not available for {}", self.program)));
        }
        GeneticCode::from_id(self.genetic_code)?;
        self.scoring_scheme()?;
        Ok(())
    }
}

/// Working data of one query block.
#[derive(Clone, Debug, Default)]
pub struct LocalState {
    /// Seeds of the block, empty in per-seed mode.
    pub seeds: Vec<Seed>,
    /// Trie over `seeds`.
    pub trie: Option<SeedTrie>,
    /// Seed hits left after filtering.
    pub matches: Vec<Match>,
    /// Alignments of the block.
    pub alignments: Vec<Alignment>,
    /// Counters of the block.
    pub stats: SearchStats,
}

/// Search configuration resolved against a database.
#[derive(Debug)]
pub struct SearchPipeline<'a> {
    opts: &'a SearchOpts,
    db: &'a Database,
    scheme: ScoringScheme,
    seed_params: SeedParams,
}

impl<'a> SearchPipeline<'a> {
    /// Validates `opts` and checks that `db` can be searched with them.
    pub fn new(opts: &'a SearchOpts, db: &'a Database) -> Result<SearchPipeline<'a>, Error> {
        opts.validate()?;
        db.check_compatible(opts.program, opts.reduction, opts.genetic_code)?;
        let scheme = opts.scoring_scheme()?;
        if scheme.gaps.open() == 0 {
            warn!("Gap opening cost 0 uses linear gap costs; searches will be slower and statistics approximate");
        }
        let seed_params = SeedParams { seed_delta: opts.seed_delta, max_seed_hits: opts.max_seed_hits };
        Ok(SearchPipeline { opts, db, scheme, seed_params })
    }

    /// Scoring scheme in use.
    pub fn scheme(&self) -> &ScoringScheme {
        &self.scheme
    }

    /// Splits `queries` into ranges of translated ids covering at most
    /// `block_size` original queries each.
    pub fn blocks(&self, queries: &TranslatedSet) -> Vec<Range<usize>> {
        let mut res: Vec<Range<usize>> = Vec::new();
        let mut start = 0;
        for i in 1..=queries.len() {
            let boundary = i == queries.len()
                || (queries.origin(i).id != queries.origin(i - 1).id
                    && queries.origin(i).id / self.opts.block_size != queries.origin(start).id / self.opts.block_size);
            if boundary {
                res.push(start..i);
                start = i;
            }
        }
        res
    }

    /// Searches all `queries` against the database.
    ///
    /// Returns the alignments sorted by original query, E-value, subject
    /// and query start, together with the merged counters.
    pub fn run(&self, queries: &TranslatedSet) -> Result<(Vec<Alignment>, SearchStats), Error> {
        if queries.alphabet != self.db.translated_alphabet() {
            return Err(Error::Config(format!("queries are in {} but the database in {}", queries.alphabet.name(), self.db.translated_alphabet().name())));
        }
        let blocks = self.blocks(queries);
        let totals: Mutex<SearchStats> = Mutex::new(SearchStats::default());
        info!("Searching {} queries in {} blocks with {} threads", queries.n_original(), blocks.len(), self.opts.num_threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.num_threads)
            .thread_name(|i| format!("rayon-thread-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("could not start {} threads: {}", self.opts.num_threads, e)))?;

        let results: Vec<Option<Vec<Alignment>>> = pool.install(|| {
            blocks.par_iter().enumerate().with_max_len(1).map(|(block_id, block)| {
                match self.process_block(queries, block_id, block.clone()) {
                    Ok(local) => {
                        debug!("Block {}: {} seeds, {} hits, {} alignments", block_id, local.stats.seeds, local.stats.hits, local.alignments.len());
                        let mut guard = match totals.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        *guard += &local.stats;
                        Some(local.alignments)
                    },
                    Err(e) => {
                        warn!("Skipping query block {}: {}", block_id, e);
                        None
                    },
                }
            }).collect()
        });

        let mut stats = match totals.into_inner() {
            Ok(stats) => stats,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats.failed_blocks = results.iter().filter(|x| x.is_none()).count();
        if !blocks.is_empty() && stats.failed_blocks == blocks.len() {
            return Err(Error::AllBlocksFailed(blocks.len()));
        }

        let mut alignments: Vec<Alignment> = results.into_iter().flatten().flatten().collect();
        alignments.sort_by(|a, b| {
            queries.origin(a.qry_id).id.cmp(&queries.origin(b.qry_id).id)
                .then(a.evalue.total_cmp(&b.evalue))
                .then(a.subj_id.cmp(&b.subj_id))
                .then(a.qry_begin.cmp(&b.qry_begin))
                .then(a.qry_id.cmp(&b.qry_id))
                .then(a.subj_begin.cmp(&b.subj_begin))
        });
        info!("Found {} alignments", alignments.len());
        Ok((alignments, stats))
    }

    /// Seeds, searches, filters and extends one block.
    pub fn process_block(&self, queries: &TranslatedSet, block_id: usize, block: Range<usize>) -> Result<LocalState, Error> {
        let mut local = LocalState::default();
        local.stats.blocks = 1;
        local.stats.queries = block.clone().map(|x| queries.origin(x).id).collect::<std::collections::BTreeSet<usize>>().len();

        let view = ReducedView::new(&queries.seqs, queries.alphabet, self.opts.reduction);
        let found = if self.opts.double_indexing {
            local.seeds = seeds::generate(&view, block.clone(), self.opts.seed_length, self.opts.seed_offset);
            let trie = SeedTrie::build(&local.seeds, &view);
            let found = search::search_trie(&self.db.index, &trie, &local.seeds, self.seed_params)?;
            local.trie = Some(trie);
            found
        } else {
            search::search_per_seed(&self.db.index, &view, block.clone(), self.opts.seed_length, self.opts.seed_offset, self.seed_params)?
        };
        local.stats.seeds = found.seeds;
        local.stats.seeds_too_frequent = found.too_frequent;
        local.stats.hits = found.matches.len();

        let (matches, counts) = hits::reduce(found.matches, &self.opts.filters);
        local.stats.hits_duplicate = counts.duplicates;
        local.stats.hits_abundant = counts.abundant;
        local.stats.hits_merged = counts.merged;
        local.matches = matches;

        self.extend_block(queries, block_id, &mut local)?;
        self.cap_per_query(queries, &mut local);
        local.stats.alignments = local.alignments.len();
        Ok(local)
    }

    fn extend_block(&self, queries: &TranslatedSet, block_id: usize, local: &mut LocalState) -> Result<(), Error> {
        let subjects = &self.db.subjects;
        let db_len = subjects.seqs.total_len();
        let extender = Extender::new(&self.scheme, self.opts.band, self.opts.max_evalue);

        for pair in local.matches.chunk_by(|a, b| a.qry_id == b.qry_id && a.subj_id == b.subj_id) {
            let (qry_id, subj_id) = (pair[0].qry_id, pair[0].subj_id);
            if qry_id >= queries.len() || subj_id >= subjects.len() {
                return Err(Error::Block { block: block_id, detail: format!("hit on query {} subject {} is out of range", qry_id, subj_id) });
            }
            let query = queries.get(qry_id);
            let subject = subjects.get(subj_id);
            let space = stats::search_space(&self.scheme.karlin, query.len(), db_len, subjects.len());

            let mut produced: Vec<Alignment> = Vec::new();
            for hit in pair {
                if hit.qry_end() > query.len() || hit.subj_end() > subject.len() {
                    return Err(Error::Block { block: block_id, detail: format!("hit {:?} extends past its sequences", hit) });
                }
                if produced.iter().any(|x| x.covers(hit, self.opts.band)) {
                    local.stats.hits_contained += 1;
                    continue;
                }
                local.stats.extensions += 1;
                match extender.extend_match(hit, query, subject, space) {
                    Some(aln) => {
                        let seen = produced.iter().any(|x| {
                            (x.qry_begin, x.qry_end, x.subj_begin, x.subj_end, x.score) == (aln.qry_begin, aln.qry_end, aln.subj_begin, aln.subj_end, aln.score)
                        });
                        if !seen {
                            produced.push(aln);
                        }
                    },
                    None => local.stats.rejected_evalue += 1,
                }
            }
            local.alignments.append(&mut produced);
        }
        Ok(())
    }

    // Keeps the best `max_matches` alignments of each original query
    fn cap_per_query(&self, queries: &TranslatedSet, local: &mut LocalState) {
        if self.opts.max_matches == 0 {
            return;
        }
        local.alignments.sort_by(|a, b| {
            queries.origin(a.qry_id).id.cmp(&queries.origin(b.qry_id).id)
                .then(a.evalue.total_cmp(&b.evalue))
                .then(b.score.cmp(&a.score))
                .then(a.subj_id.cmp(&b.subj_id))
                .then(a.qry_id.cmp(&b.qry_id))
                .then(a.qry_begin.cmp(&b.qry_begin))
        });
        let mut kept: Vec<Alignment> = Vec::with_capacity(local.alignments.len());
        for group in local.alignments.chunk_by(|a, b| queries.origin(a.qry_id).id == queries.origin(b.qry_id).id) {
            kept.extend_from_slice(&group[..group.len().min(self.opts.max_matches)]);
        }
        local.alignments = kept;
    }
}
