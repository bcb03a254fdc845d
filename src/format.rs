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
//! Writing alignments in BLAST and SAM formats.
//!
//! The format is chosen by the suffix of the output path after an
//! optional `.gz`:
//!
//! | suffix | format |
//! |---|---|
//! | `.m0` | BLAST pairwise |
//! | `.m8` | BLAST tabular |
//! | `.m9` | BLAST tabular with comment lines |
//! | `.sam` | SAM |
//!
//! Coordinates are reported on the original sequences, 1-based and with
//! the start after the end on the reverse strand.
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use crate::db::Database;
use crate::error::Error;
use crate::extend::Alignment;
use crate::extend::EditOp;
use crate::scoring::ScoringScheme;
use crate::seqset::TranslatedSet;
use crate::taxonomy::accession;
use crate::translate::frame_to_original;
use crate::translate::Program;
use crate::translate::Side;

/// Columns of the tabular formats.
pub const TABULAR_FIELDS: [&str; 12] = [
    "qseqid", "sseqid", "pident", "length", "mismatch", "gapopen",
    "qstart", "qend", "sstart", "send", "evalue", "bitscore",
];

const PAIRWISE_WIDTH: usize = 60;

/// Output file formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// BLAST pairwise (`.m0`).
    Pairwise,
    /// BLAST tabular (`.m8`).
    Tabular,
    /// BLAST tabular with comments (`.m9`).
    TabularComments,
    /// Sequence Alignment/Map (`.sam`).
    Sam,
}

impl OutputFormat {
    /// Format and gzip compression selected by the suffix of `path`.
    ///
    /// `.bam` and `.bz2` are recognised but return
    /// [Error::UnsupportedFeature]; other suffixes are [Error::Config].
    ///
    /// # Examples
    /// ```rust
    /// use std::path::Path;
    /// use dixsearch::format::OutputFormat;
    ///
    /// let (format, gzip) = OutputFormat::from_path(Path::new("hits.m8.gz")).unwrap();
    /// assert_eq!(format, OutputFormat::Tabular);
    /// assert!(gzip);
    /// ```
    ///
    pub fn from_path(path: &Path) -> Result<(OutputFormat, bool), Error> {
        let name = path.file_name().map(|x| x.to_string_lossy().to_string()).unwrap_or_default();
        if name.ends_with(".bz2") {
            return Err(Error::UnsupportedFeature(format!("bzip2 compressed output ({})", name)));
        }
        let (stem, gzip) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (name.as_str(), false),
        };
        let format = match stem.rsplit_once('.').map(|x| x.1) {
            Some("m0") => OutputFormat::Pairwise,
            Some("m8") => OutputFormat::Tabular,
            Some("m9") => OutputFormat::TabularComments,
            Some("sam") => OutputFormat::Sam,
            Some("bam") => return Err(Error::UnsupportedFeature("BAM output".to_string())),
            _ => return Err(Error::Config(format!("cannot tell the output format of `{}`; use .m0, .m8, .m9 or .sam", name))),
        };
        Ok((format, gzip))
    }
}

/// Output file, plain or gzip-compressed.
///
/// Call [Output::finish] when done: dropping a gzip output discards any
/// error from writing the trailer.
pub enum Output {
    /// Uncompressed file.
    Plain(BufWriter<File>),
    /// Gzip-compressed file.
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
}

impl Output {
    /// Flushes all data, writing the gzip trailer if compressed.
    pub fn finish(self) -> Result<(), Error> {
        match self {
            Output::Plain(mut conn) => conn.flush()?,
            Output::Gzip(encoder) => encoder.finish()?.flush()?,
        }
        Ok(())
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Output::Plain(conn) => conn.write(buf),
            Output::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Output::Plain(conn) => conn.flush(),
            Output::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Opens `path` for writing, through a gzip encoder if `gzip` is set.
pub fn create_output(path: &Path, gzip: bool) -> Result<Output, Error> {
    let conn = BufWriter::new(File::create(path)?);
    if gzip {
        Ok(Output::Gzip(flate2::write::GzEncoder::new(conn, flate2::Compression::default())))
    } else {
        Ok(Output::Plain(conn))
    }
}

/// Everything needed to describe alignments besides the alignments.
#[derive(Copy, Clone, Debug)]
pub struct Report<'a> {
    /// Program the search ran as.
    pub program: Program,
    /// Searched queries.
    pub queries: &'a TranslatedSet,
    /// Names of the original queries.
    pub query_names: &'a [String],
    /// Searched database.
    pub db: &'a Database,
    /// Database name shown in headers.
    pub db_name: &'a str,
    /// Scoring used for the alignments.
    pub scheme: &'a ScoringScheme,
    /// Add the `staxids` column if the database has taxids.
    pub with_taxids: bool,
}

impl Report<'_> {
    fn qry_orig(&self, aln: &Alignment) -> usize {
        self.queries.origin(aln.qry_id).id
    }

    fn subj_orig(&self, aln: &Alignment) -> usize {
        self.db.subjects.origin(aln.subj_id).id
    }

    fn qry_coords(&self, begin: usize, end: usize, qry_id: usize) -> (usize, usize) {
        let origin = self.queries.origin(qry_id);
        frame_to_original(begin, end, origin.frame, self.queries.orig_lens[origin.id], self.program.is_translated(Side::Query))
    }

    fn subj_coords(&self, begin: usize, end: usize, subj_id: usize) -> (usize, usize) {
        let origin = self.db.subjects.origin(subj_id);
        frame_to_original(begin, end, origin.frame, self.db.subjects.orig_lens[origin.id], self.program.is_translated(Side::Subject))
    }

    fn taxids(&self, aln: &Alignment) -> Option<String> {
        if !self.with_taxids {
            return None;
        }
        let staxids = self.db.staxids.as_ref()?;
        let ids = &staxids[self.subj_orig(aln)];
        if ids.is_empty() {
            return Some("N/A".to_string());
        }
        Some(ids.iter().map(|x| x.to_string()).collect::<Vec<String>>().join(";"))
    }

    fn has_taxids(&self) -> bool {
        self.with_taxids && self.db.staxids.is_some()
    }
}

fn scientific(value: f64, digits: usize) -> String {
    let formatted = format!("{:.*e}", digits, value);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
        },
        None => formatted,
    }
}

/// Formats an E-value the way BLAST does.
pub fn format_evalue(evalue: f64) -> String {
    if evalue < 1e-180 {
        "0.0".to_string()
    } else if evalue < 1e-99 {
        scientific(evalue, 0)
    } else if evalue < 0.0009995 {
        scientific(evalue, 2)
    } else if evalue < 0.0995 {
        format!("{:.3}", evalue)
    } else if evalue < 1.0 {
        format!("{:.2}", evalue)
    } else if evalue < 10.0 {
        format!("{:.1}", evalue)
    } else {
        format!("{:.0}", evalue)
    }
}

/// Formats a bit score the way BLAST does.
pub fn format_bit_score(bits: f64) -> String {
    if bits > 9999.0 {
        scientific(bits, 3)
    } else if bits > 99.9 {
        format!("{:.0}", bits)
    } else {
        format!("{:.1}", bits)
    }
}

/// One tabular line without the trailing newline.
pub fn tabular_row(report: &Report, aln: &Alignment) -> String {
    let (qstart, qend) = report.qry_coords(aln.qry_begin, aln.qry_end, aln.qry_id);
    let (sstart, send) = report.subj_coords(aln.subj_begin, aln.subj_end, aln.subj_id);
    let mut row = format!(
        "{}\t{}\t{:.2}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        accession(&report.query_names[report.qry_orig(aln)]),
        accession(&report.db.names[report.subj_orig(aln)]),
        aln.percent_identity(),
        aln.length(),
        aln.mismatches,
        aln.gap_opens,
        qstart, qend, sstart, send,
        format_evalue(aln.evalue),
        format_bit_score(aln.bit_score),
    );
    if let Some(taxids) = report.taxids(aln) {
        row.push('\t');
        row.push_str(&taxids);
    }
    row
}

/// Writes `alignments` as BLAST tabular output.
pub fn write_tabular<W: Write>(out: &mut W, report: &Report, alignments: &[Alignment]) -> Result<(), Error> {
    for aln in alignments {
        writeln!(out, "{}", tabular_row(report, aln))?;
    }
    Ok(())
}

// Alignments grouped by original query, including queries without hits
fn by_query<'a>(report: &Report, alignments: &'a [Alignment]) -> Vec<&'a [Alignment]> {
    let mut res: Vec<&[Alignment]> = Vec::with_capacity(report.queries.n_original());
    let mut start = 0;
    for orig in 0..report.queries.n_original() {
        let mut end = start;
        while end < alignments.len() && report.qry_orig(&alignments[end]) == orig {
            end += 1;
        }
        res.push(&alignments[start..end]);
        start = end;
    }
    res
}

/// Writes `alignments` as BLAST tabular output with comment lines.
///
/// `alignments` must be sorted by original query.
pub fn write_tabular_comments<W: Write>(out: &mut W, report: &Report, alignments: &[Alignment]) -> Result<(), Error> {
    let mut fields: Vec<&str> = vec![
        "query id", "subject id", "% identity", "alignment length", "mismatches", "gap opens",
        "q. start", "q. end", "s. start", "s. end", "evalue", "bit score",
    ];
    if report.has_taxids() {
        fields.push("subject tax ids");
    }
    for (orig, hits) in by_query(report, alignments).into_iter().enumerate() {
        writeln!(out, "# {} (dixsearch {})", report.program, env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "# Query: {}", report.query_names[orig])?;
        writeln!(out, "# Database: {}", report.db_name)?;
        if !hits.is_empty() {
            writeln!(out, "# Fields: {}", fields.join(", "))?;
        }
        writeln!(out, "# {} hits found", hits.len())?;
        write_tabular(out, report, hits)?;
    }
    writeln!(out, "# dixsearch processed {} queries", report.queries.n_original())?;
    Ok(())
}

fn frame_label(report: &Report, aln: &Alignment) -> Option<String> {
    let qry_frame = report.queries.origin(aln.qry_id).frame;
    let subj_frame = report.db.subjects.origin(aln.subj_id).frame;
    match report.program {
        Program::Blastn => Some(format!("Strand=Plus/{}", if qry_frame < 0 { "Minus" } else { "Plus" })),
        Program::Blastp => None,
        Program::Blastx => Some(format!("Frame = {:+}", qry_frame)),
        Program::Tblastn => Some(format!("Frame = {:+}", subj_frame)),
        Program::Tblastx => Some(format!("Frame = {:+}/{:+}", qry_frame, subj_frame)),
    }
}

fn percent(part: usize, total: usize) -> usize {
    if total == 0 { 0 } else { (100.0 * part as f64 / total as f64).round() as usize }
}

fn write_pairwise_alignment<W: Write>(out: &mut W, report: &Report, aln: &Alignment) -> Result<(), Error> {
    let query = report.queries.get(aln.qry_id);
    let subject = report.db.subjects.get(aln.subj_id);
    let alphabet = report.queries.alphabet;
    let len = aln.length();

    writeln!(out, " Score = {} bits ({}),  Expect = {}", format_bit_score(aln.bit_score), aln.score, format_evalue(aln.evalue))?;
    writeln!(out, " Identities = {}/{} ({}%), Positives = {}/{} ({}%), Gaps = {}/{} ({}%)",
             aln.identities, len, percent(aln.identities, len),
             aln.positives, len, percent(aln.positives, len),
             aln.gaps, len, percent(aln.gaps, len))?;
    if let Some(label) = frame_label(report, aln) {
        writeln!(out, " {}", label)?;
    }
    writeln!(out)?;

    // Columns as (query rank, subject rank)
    let mut columns: Vec<(Option<u8>, Option<u8>)> = Vec::with_capacity(len);
    let (mut i, mut j) = (aln.qry_begin, aln.subj_begin);
    for (op, n) in aln.ops.iter() {
        for _ in 0..*n {
            match op {
                EditOp::Match | EditOp::Mismatch => {
                    columns.push((Some(query[i]), Some(subject[j])));
                    i += 1;
                    j += 1;
                },
                EditOp::Insertion => { columns.push((Some(query[i]), None)); i += 1; },
                EditOp::Deletion => { columns.push((None, Some(subject[j]))); j += 1; },
            }
        }
    }

    let (mut qi, mut sj) = (aln.qry_begin, aln.subj_begin);
    for chunk in columns.chunks(PAIRWISE_WIDTH) {
        let nq = chunk.iter().filter(|x| x.0.is_some()).count();
        let ns = chunk.iter().filter(|x| x.1.is_some()).count();
        let qry_row: String = chunk.iter().map(|x| x.0.map_or('-', |c| alphabet.decode(c) as char)).collect();
        let subj_row: String = chunk.iter().map(|x| x.1.map_or('-', |c| alphabet.decode(c) as char)).collect();
        let mid_row: String = chunk.iter().map(|x| match x {
            (Some(a), Some(b)) if a == b => alphabet.decode(*a) as char,
            (Some(a), Some(b)) if report.scheme.score(*a, *b) > 0 => '+',
            _ => ' ',
        }).collect();

        let (q_start, q_end) = report.qry_coords(qi, qi + nq.max(1), aln.qry_id);
        let (s_start, s_end) = report.subj_coords(sj, sj + ns.max(1), aln.subj_id);
        writeln!(out, "Query  {:<6} {}  {}", q_start, qry_row, q_end)?;
        writeln!(out, "{:14}{}", "", mid_row)?;
        writeln!(out, "Sbjct  {:<6} {}  {}", s_start, subj_row, s_end)?;
        writeln!(out)?;
        qi += nq;
        sj += ns;
    }
    Ok(())
}

/// Writes `alignments` as BLAST pairwise output.
///
/// `alignments` must be sorted by original query.
pub fn write_pairwise<W: Write>(out: &mut W, report: &Report, alignments: &[Alignment]) -> Result<(), Error> {
    writeln!(out, "{} {} (dixsearch)", report.program, env!("CARGO_PKG_VERSION"))?;
    writeln!(out)?;
    writeln!(out, "Database: {}", report.db_name)?;
    writeln!(out, "           {} sequences; {} total letters", report.db.n_subjects(), report.db.subjects.seqs.total_len())?;
    writeln!(out)?;
    for (orig, hits) in by_query(report, alignments).into_iter().enumerate() {
        writeln!(out, "Query= {}", report.query_names[orig])?;
        writeln!(out)?;
        writeln!(out, "Length={}", report.queries.orig_lens[orig])?;
        writeln!(out)?;
        if hits.is_empty() {
            writeln!(out, " ***** No hits found *****")?;
            writeln!(out)?;
            continue;
        }
        for aln in hits {
            let subj = report.subj_orig(aln);
            writeln!(out, "> {}", report.db.names[subj])?;
            writeln!(out, "Length={}", report.db.subjects.orig_lens[subj])?;
            writeln!(out)?;
            write_pairwise_alignment(out, report, aln)?;
        }
    }
    Ok(())
}

/// Writes `alignments` as SAM.
///
/// The first alignment of each query is primary and the rest are
/// flagged secondary. For translated programs the CIGAR string counts
/// residues while `POS` is a nucleotide position.
pub fn write_sam<W: Write>(out: &mut W, report: &Report, alignments: &[Alignment]) -> Result<(), Error> {
    writeln!(out, "@HD\tVN:1.6\tSO:unsorted")?;
    for (name, len) in report.db.names.iter().zip(report.db.subjects.orig_lens.iter()) {
        writeln!(out, "@SQ\tSN:{}\tLN:{}", accession(name), len)?;
    }
    writeln!(out, "@PG\tID:dixsearch\tPN:dixsearch\tVN:{}", env!("CARGO_PKG_VERSION"))?;

    let alphabet = report.queries.alphabet;
    for hits in by_query(report, alignments) {
        for (rank, aln) in hits.iter().enumerate() {
            let qry_frame = report.queries.origin(aln.qry_id).frame;
            let subj_frame = report.db.subjects.origin(aln.subj_id).frame;
            let reverse = (qry_frame < 0) != (subj_frame < 0);
            let flag = if reverse { 16 } else { 0 } | if rank > 0 { 256 } else { 0 };

            let (sstart, send) = report.subj_coords(aln.subj_begin, aln.subj_end, aln.subj_id);
            let mut ops: Vec<(char, usize)> = Vec::new();
            for (op, n) in aln.ops.iter() {
                match ops.last_mut() {
                    Some((last, count)) if *last == op.cigar() => *count += n,
                    _ => ops.push((op.cigar(), *n)),
                }
            }
            if subj_frame < 0 {
                ops.reverse();
            }
            let cigar: String = ops.iter().map(|(op, n)| format!("{}{}", n, op)).collect();
            let seq: String = if rank == 0 {
                report.queries.get(aln.qry_id)[aln.qry_begin..aln.qry_end].iter().map(|x| alphabet.decode(*x) as char).collect()
            } else {
                "*".to_string()
            };

            writeln!(out, "{}\t{}\t{}\t{}\t255\t{}\t*\t0\t0\t{}\t*\tAS:i:{}\tNM:i:{}\tZE:f:{}\tZB:f:{:.1}",
                     accession(&report.query_names[report.qry_orig(aln)]),
                     flag,
                     accession(&report.db.names[report.subj_orig(aln)]),
                     sstart.min(send),
                     cigar,
                     seq,
                     aln.score,
                     aln.mismatches + aln.gaps,
                     scientific(aln.evalue, 2),
                     aln.bit_score)?;
        }
    }
    Ok(())
}

/// Writes `alignments` in `format`.
pub fn write_report<W: Write>(out: &mut W, format: OutputFormat, report: &Report, alignments: &[Alignment]) -> Result<(), Error> {
    match format {
        OutputFormat::Pairwise => write_pairwise(out, report, alignments)?,
        OutputFormat::Tabular => write_tabular(out, report, alignments)?,
        OutputFormat::TabularComments => write_tabular_comments(out, report, alignments)?,
        OutputFormat::Sam => write_sam(out, report, alignments)?,
    }
    out.flush()?;
    Ok(())
}
