//! Folder hierarchy aggregation.
//!
//! Folds a flat list of [`FileRecord`]s into one [`FolderNode`] per folder
//! chain prefix, so the tree is connected from the root down to every leaf
//! even where intermediate folders hold no files of their own.

use crate::tidy::record::{CHAIN_SEPARATOR, FileRecord, join_chain, sanitize_chain};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const CONTINUATION: &str = "│   ";
const BLANK: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub chain: String,
    pub name: String,
    pub depth: usize,
    /// Files whose chain equals this node's chain exactly.
    pub file_count: usize,
    pub extensions: BTreeMap<String, usize>,
    pub children: BTreeSet<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

impl FolderNode {
    fn new(chain: &str, name: &str, depth: usize) -> Self {
        Self {
            chain: chain.to_string(),
            name: name.to_string(),
            depth,
            file_count: 0,
            extensions: BTreeMap::new(),
            children: BTreeSet::new(),
            min_date: None,
            max_date: None,
        }
    }

    fn absorb(&mut self, record: &FileRecord) {
        self.file_count += 1;
        *self.extensions.entry(record.file_ext.clone()).or_insert(0) += 1;
        self.min_date = Some(match self.min_date {
            Some(current) => current.min(record.modified),
            None => record.modified,
        });
        self.max_date = Some(match self.max_date {
            Some(current) => current.max(record.modified),
            None => record.modified,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSummary {
    pub root_name: String,
    pub node_count: usize,
    /// Sorted by chain.
    pub nodes: Vec<FolderNode>,
}

impl FolderSummary {
    pub fn get(&self, chain: &str) -> Option<&FolderNode> {
        self.nodes
            .binary_search_by(|n| n.chain.as_str().cmp(chain))
            .ok()
            .map(|idx| &self.nodes[idx])
    }

    pub fn root(&self) -> Option<&FolderNode> {
        self.get(&self.root_name)
    }

    pub fn total_files(&self) -> usize {
        self.nodes.iter().map(|n| n.file_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderOverview {
    pub total_files: usize,
    pub total_folders: usize,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub tree: String,
}

#[derive(Debug, Clone)]
pub struct FolderAggregator {
    root_name: String,
    nodes: BTreeMap<String, FolderNode>,
}

impl FolderAggregator {
    pub fn new(root_name: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(root_name.to_string(), FolderNode::new(root_name, root_name, 0));
        Self {
            root_name: root_name.to_string(),
            nodes,
        }
    }

    /// Chain a record is attributed to: its sanitized chain, or the root
    /// name alone when nothing is left.
    pub fn effective_chain(&self, record: &FileRecord) -> Vec<String> {
        let chain = sanitize_chain(&record.folder_chain);
        if chain.is_empty() {
            vec![self.root_name.clone()]
        } else {
            chain
        }
    }

    pub fn add(&mut self, record: &FileRecord) {
        let segments = self.effective_chain(record);
        for depth in 1..=segments.len() {
            let prefix = join_chain(&segments[..depth]);
            self.register(&prefix, &segments[depth - 1], depth);
        }
        let chain = join_chain(&segments);
        if let Some(node) = self.nodes.get_mut(&chain) {
            node.absorb(record);
        }
    }

    fn register(&mut self, chain: &str, name: &str, depth: usize) {
        if chain == self.root_name || self.nodes.contains_key(chain) {
            return;
        }
        self.nodes
            .insert(chain.to_string(), FolderNode::new(chain, name, depth));

        let parent = match chain.rsplit_once(CHAIN_SEPARATOR) {
            Some((parent, _)) => parent.to_string(),
            None => self.root_name.clone(),
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.insert(chain.to_string());
        }
    }

    pub fn finish(self) -> FolderSummary {
        let nodes: Vec<FolderNode> = self.nodes.into_values().collect();
        FolderSummary {
            root_name: self.root_name,
            node_count: nodes.len(),
            nodes,
        }
    }
}

pub fn aggregate(records: &[FileRecord], root_name: &str) -> FolderSummary {
    let mut aggregator = FolderAggregator::new(root_name);
    for record in records {
        aggregator.add(record);
    }
    aggregator.finish()
}

/// Depth-first tree, children in lexical chain order, one `name (count)` per line.
pub fn render_tree(summary: &FolderSummary) -> String {
    let Some(root) = summary.root() else {
        return String::new();
    };
    let mut lines = vec![format!("{} ({})", root.name, root.file_count)];
    render_children(summary, &root.children, "", &mut lines);
    lines.join("\n")
}

fn render_children(
    summary: &FolderSummary,
    children: &BTreeSet<String>,
    prefix: &str,
    lines: &mut Vec<String>,
) {
    let count = children.len();
    for (idx, chain) in children.iter().enumerate() {
        let Some(node) = summary.get(chain) else {
            continue;
        };
        let last = idx + 1 == count;
        let connector = if last { LAST_BRANCH } else { BRANCH };
        lines.push(format!("{prefix}{connector}{} ({})", node.name, node.file_count));

        let child_prefix = format!("{prefix}{}", if last { BLANK } else { CONTINUATION });
        render_children(summary, &node.children, &child_prefix, lines);
    }
}

pub fn overview(summary: &FolderSummary) -> FolderOverview {
    FolderOverview {
        total_files: summary.total_files(),
        total_folders: summary.node_count,
        earliest_date: summary.nodes.iter().filter_map(|n| n.min_date).min(),
        latest_date: summary.nodes.iter().filter_map(|n| n.max_date).max(),
        tree: render_tree(summary),
    }
}
