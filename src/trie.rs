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
//! Prefix tree over the seeds of a query block.
//!
//! Nodes live in one arena vector and refer to each other by index. A
//! node with a non-empty seed list is the terminus of those seeds; the
//! seed lists hold indices into the block's seed vector.
use crate::seeds::Seed;
use crate::seqset::ReducedView;

/// Index of the root node.
pub const ROOT: usize = 0;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct TrieNode {
    // Sorted by symbol
    children: Vec<(u8, usize)>,
    seeds: Vec<usize>,
}

/// Arena-allocated seed trie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedTrie {
    nodes: Vec<TrieNode>,
}

impl SeedTrie {
    /// Builds the trie of `seeds` over the reduced `queries`.
    ///
    /// Seeds are inserted in the order of their symbols so the arena does
    /// not depend on the order of `seeds`.
    pub fn build(seeds: &[Seed], queries: &ReducedView) -> SeedTrie {
        let symbols: Vec<Vec<u8>> = seeds.iter()
            .map(|seed| (seed.offset..seed.offset + seed.length).map(|pos| queries.symbol(seed.qry_id, pos)).collect())
            .collect();
        let mut order: Vec<usize> = (0..seeds.len()).collect();
        order.sort_by(|a, b| symbols[*a].cmp(&symbols[*b]).then(a.cmp(b)));

        let mut trie = SeedTrie { nodes: vec![TrieNode::default()] };
        for seed_idx in order {
            let mut node = ROOT;
            for sym in symbols[seed_idx].iter() {
                node = trie.child_or_insert(node, *sym);
            }
            trie.nodes[node].seeds.push(seed_idx);
        }
        trie
    }

    fn child_or_insert(&mut self, node: usize, sym: u8) -> usize {
        let children = &self.nodes[node].children;
        match children.binary_search_by(|(c, _)| c.cmp(&sym)) {
            Ok(i) => children[i].1,
            Err(i) => {
                let child = self.nodes.len();
                self.nodes.push(TrieNode::default());
                self.nodes[node].children.insert(i, (sym, child));
                child
            },
        }
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the trie holds no seeds.
    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].children.is_empty() && self.nodes[ROOT].seeds.is_empty()
    }

    /// Children of `node` as (symbol, child) sorted by symbol.
    pub fn children(&self, node: usize) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.nodes[node].children.iter().copied()
    }

    /// Seeds ending at `node`.
    pub fn seeds(&self, node: usize) -> &[usize] {
        &self.nodes[node].seeds
    }

    /// Follows `symbols` from the root and returns the seeds ending there.
    pub fn find(&self, symbols: &[u8]) -> Option<&[usize]> {
        let mut node = ROOT;
        for sym in symbols {
            let children = &self.nodes[node].children;
            let i = children.binary_search_by(|(c, _)| c.cmp(sym)).ok()?;
            node = children[i].1;
        }
        Some(self.seeds(node))
    }

    /// Nodes that terminate at least one seed.
    pub fn termini(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|x| !self.nodes[*x].seeds.is_empty())
    }
}
