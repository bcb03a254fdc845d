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
//! Subject taxonomy.
//!
//! Taxonomic ids are attached to subjects while indexing by looking up
//! the subject accessions in an NCBI `accession2taxid` file. The NCBI
//! `nodes.dmp` tree is trimmed to the taxa present in the database and
//! their ancestors. Both are stored next to the index and the taxids can
//! be reported in the `staxids` output column.
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use log::info;
use log::warn;

use crate::error::Error;

/// File holding the taxids of each subject.
pub const STAXIDS_FILE: &str = "staxids";
/// File holding the trimmed taxonomy tree.
pub const TAX_PARENTS_FILE: &str = "tax_parents";

/// Taxids of the subjects and the set of taxids that occur.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessionMap {
    /// Taxids of each original subject.
    pub staxids: Vec<Vec<u32>>,
    /// Every taxid assigned to at least one subject.
    pub present: BTreeSet<u32>,
}

/// A node of the taxonomy tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaxNode {
    /// Parent taxid, equal to the node's own id at the root.
    pub parent: u32,
    /// Rank such as `species`.
    pub rank: String,
}

/// Trimmed taxonomy tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaxTree {
    /// Nodes by taxid.
    pub nodes: BTreeMap<u32, TaxNode>,
}

impl TaxTree {
    /// Ancestors of `taxid` from its parent up to the root.
    pub fn lineage(&self, taxid: u32) -> Vec<u32> {
        let mut res = Vec::new();
        let mut current = taxid;
        while let Some(node) = self.nodes.get(&current) {
            if node.parent == current || res.len() > self.nodes.len() {
                break;
            }
            res.push(node.parent);
            current = node.parent;
        }
        res
    }
}

fn parse_error(source: &Path, line: usize, detail: String) -> Error {
    Error::Parse { path: source.to_path_buf(), detail: format!("line {}: {}", line, detail) }
}

/// Opens `path` for reading, decompressing `.gz` files.
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>, Error> {
    let conn = std::fs::File::open(path)?;
    if path.extension().is_some_and(|x| x == "gz") {
        Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(conn))))
    } else {
        Ok(Box::new(BufReader::new(conn)))
    }
}

/// Accession of a FASTA header: its first word.
pub fn accession(header: &str) -> &str {
    header.split_whitespace().next().unwrap_or("")
}

/// Maps the accessions of `names`, with and without version suffix, to
/// subject ids.
pub fn subject_accessions(names: &[String]) -> HashMap<String, Vec<usize>> {
    let mut res: HashMap<String, Vec<usize>> = HashMap::new();
    for (id, name) in names.iter().enumerate() {
        let acc = accession(name);
        res.entry(acc.to_string()).or_default().push(id);
        if let Some((unversioned, _)) = acc.rsplit_once('.') {
            res.entry(unversioned.to_string()).or_default().push(id);
        }
    }
    res
}

/// Reads an `accession2taxid` mapping from `reader`.
///
/// Accepts the NCBI four column layout (`accession accession.version
/// taxid gi`) with its header line, or plain `accession taxid` pairs.
/// Only the accessions in `subjects` are kept; `source` names the input
/// in error messages.
pub fn map_accessions<R: BufRead>(
    reader: R,
    subjects: &HashMap<String, Vec<usize>>,
    n_subjects: usize,
    source: &Path,
) -> Result<AccessionMap, Error> {
    let mut res = AccessionMap { staxids: vec![Vec::new(); n_subjects], present: BTreeSet::new() };

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.is_empty() || (line_no == 0 && cols[0] == "accession") {
            continue;
        }
        let (keys, taxid): (&[&str], &str) = match cols.len() {
            2 => (&cols[..1], cols[1]),
            n if n >= 3 => (&cols[..2], cols[2]),
            _ => return Err(parse_error(source, line_no + 1, format!("expected at least two columns, got `{}`", line))),
        };
        let Some(ids) = keys.iter().rev().find_map(|key| subjects.get(*key)) else {
            continue;
        };
        let taxid: u32 = taxid.parse().map_err(|_| parse_error(source, line_no + 1, format!("invalid taxid `{}`", taxid)))?;
        for id in ids {
            if !res.staxids[*id].contains(&taxid) {
                res.staxids[*id].push(taxid);
            }
        }
        res.present.insert(taxid);
    }

    let missing = res.staxids.iter().filter(|x| x.is_empty()).count();
    if missing > 0 {
        warn!("{} of {} subjects have no taxid", missing, n_subjects);
    }
    Ok(res)
}

/// Reads the NCBI `nodes.dmp` tree from `reader`, keeping the taxa in
/// `present` and all their ancestors.
pub fn parse_tax_tree<R: BufRead>(
    reader: R,
    present: &BTreeSet<u32>,
    source: &Path,
) -> Result<TaxTree, Error> {
    let mut all: HashMap<u32, TaxNode> = HashMap::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split('|').map(|x| x.trim()).collect();
        if cols.len() < 3 {
            return Err(parse_error(source, line_no + 1, format!("expected `taxid | parent | rank`, got `{}`", line)));
        }
        let taxid: u32 = cols[0].parse().map_err(|_| parse_error(source, line_no + 1, format!("invalid taxid `{}`", cols[0])))?;
        let parent: u32 = cols[1].parse().map_err(|_| parse_error(source, line_no + 1, format!("invalid parent `{}`", cols[1])))?;
        all.insert(taxid, TaxNode { parent, rank: cols[2].to_string() });
    }

    let mut tree = TaxTree::default();
    for taxid in present {
        let mut current = *taxid;
        loop {
            if tree.nodes.contains_key(&current) {
                break;
            }
            let Some(node) = all.get(&current) else {
                warn!("taxid {} is not in the taxonomy tree", current);
                break;
            };
            tree.nodes.insert(current, node.clone());
            if node.parent == current {
                break;
            }
            current = node.parent;
        }
    }
    info!("Kept {} of {} taxonomy nodes", tree.nodes.len(), all.len());
    Ok(tree)
}

/// Writes one `;`-separated taxid list per subject.
pub fn save_staxids(staxids: &[Vec<u32>], dir: &Path) -> Result<(), Error> {
    let mut out = BufWriter::new(std::fs::File::create(dir.join(STAXIDS_FILE))?);
    for ids in staxids {
        let ids: Vec<String> = ids.iter().map(|x| x.to_string()).collect();
        writeln!(out, "{}", ids.join(";"))?;
    }
    out.flush()?;
    Ok(())
}

/// Reads the subject taxids if the database has them.
pub fn load_staxids(dir: &Path, n_subjects: usize) -> Result<Option<Vec<Vec<u32>>>, Error> {
    let path: PathBuf = dir.join(STAXIDS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    let mut res = Vec::with_capacity(n_subjects);
    for line in contents.lines() {
        let ids = line.split(';')
            .filter(|x| !x.is_empty())
            .map(|x| x.parse::<u32>())
            .collect::<Result<Vec<u32>, _>>()
            .map_err(|e| Error::CorruptIndex(format!("{}: {}", path.display(), e)))?;
        res.push(ids);
    }
    if res.len() != n_subjects {
        return Err(Error::CorruptIndex(format!("{} has {} lines for {} subjects", path.display(), res.len(), n_subjects)));
    }
    Ok(Some(res))
}

/// Writes the tree as `taxid\tparent\trank` lines.
pub fn save_tax_tree(tree: &TaxTree, dir: &Path) -> Result<(), Error> {
    let mut out = BufWriter::new(std::fs::File::create(dir.join(TAX_PARENTS_FILE))?);
    for (taxid, node) in tree.nodes.iter() {
        writeln!(out, "{}\t{}\t{}", taxid, node.parent, node.rank)?;
    }
    out.flush()?;
    Ok(())
}

/// Reads the tree if the database has one.
pub fn load_tax_tree(dir: &Path) -> Result<Option<TaxTree>, Error> {
    let path = dir.join(TAX_PARENTS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    let mut tree = TaxTree::default();
    for line in contents.lines() {
        let cols: Vec<&str> = line.splitn(3, '\t').collect();
        let parsed = match cols.as_slice() {
            [taxid, parent, rank] => taxid.parse::<u32>().ok().zip(parent.parse::<u32>().ok()).map(|x| (x, rank.to_string())),
            _ => None,
        };
        let ((taxid, parent), rank) = parsed.ok_or_else(|| Error::CorruptIndex(format!("{}: invalid line `{}`", path.display(), line)))?;
        tree.nodes.insert(taxid, TaxNode { parent, rank });
    }
    Ok(Some(tree))
}

////////////////////////////////////////////////////////////////////////////////
// Tests
//
#[cfg(test)]
mod tests {
    use super::*;

    const NODES: &str = "1\t|\t1\t|\tno rank\t|\t\t|\n\
                         2\t|\t131567\t|\tsuperkingdom\t|\t\t|\n\
                         131567\t|\t1\t|\tno rank\t|\t\t|\n\
                         561\t|\t543\t|\tgenus\t|\t\t|\n\
                         543\t|\t91347\t|\tfamily\t|\t\t|\n\
                         91347\t|\t2\t|\torder\t|\t\t|\n\
                         562\t|\t561\t|\tspecies\t|\t\t|\n\
                         9606\t|\t9605\t|\tspecies\t|\t\t|\n";

    fn names() -> Vec<String> {
        vec!["WP_000001.1 thing".to_string(), "WP_000002.3".to_string(), "XP_9".to_string()]
    }

    #[test]
    fn ncbi_accession2taxid_layout() {
        let subjects = subject_accessions(&names());
        let data = "accession\taccession.version\ttaxid\tgi\n\
                    WP_000001\tWP_000001.1\t562\t1\n\
                    WP_000002\tWP_000002.2\t561\t2\n\
                    WP_999999\tWP_999999.1\t9606\t3\n";
        let got = map_accessions(data.as_bytes(), &subjects, 3, Path::new("test")).unwrap();
        assert_eq!(got.staxids, vec![vec![562], vec![561], vec![]]);
        assert_eq!(got.present.iter().copied().collect::<Vec<u32>>(), vec![561, 562]);
    }

    #[test]
    fn two_column_layout() {
        let subjects = subject_accessions(&names());
        let data = "XP_9 9606\nWP_000002.3 562\n";
        let got = map_accessions(data.as_bytes(), &subjects, 3, Path::new("test")).unwrap();
        assert_eq!(got.staxids, vec![vec![], vec![562], vec![9606]]);
    }

    #[test]
    fn invalid_taxid_is_a_parse_error() {
        let subjects = subject_accessions(&names());
        let got = map_accessions("XP_9 human\n".as_bytes(), &subjects, 3, Path::new("test"));
        assert!(matches!(got, Err(Error::Parse { .. })));
    }

    #[test]
    fn tree_keeps_present_taxa_and_ancestors() {
        let present: BTreeSet<u32> = [562].into_iter().collect();
        let tree = parse_tax_tree(NODES.as_bytes(), &present, Path::new("nodes.dmp")).unwrap();
        let kept: Vec<u32> = tree.nodes.keys().copied().collect();
        assert_eq!(kept, vec![1, 2, 543, 561, 562, 91347, 131567]);
        assert_eq!(tree.nodes[&562].rank, "species");
        assert_eq!(tree.lineage(562), vec![561, 543, 91347, 2, 131567, 1]);
    }

    #[test]
    fn files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let staxids = vec![vec![562, 561], vec![], vec![9606]];
        save_staxids(&staxids, dir.path()).unwrap();
        assert_eq!(load_staxids(dir.path(), 3).unwrap(), Some(staxids));
        assert!(load_staxids(dir.path(), 4).is_err());

        let present: BTreeSet<u32> = [562].into_iter().collect();
        let tree = parse_tax_tree(NODES.as_bytes(), &present, Path::new("nodes.dmp")).unwrap();
        save_tax_tree(&tree, dir.path()).unwrap();
        assert_eq!(load_tax_tree(dir.path()).unwrap(), Some(tree));
    }

    #[test]
    fn missing_files_are_not_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_staxids(dir.path(), 1).unwrap(), None);
        assert_eq!(load_tax_tree(dir.path()).unwrap(), None);
    }
}
