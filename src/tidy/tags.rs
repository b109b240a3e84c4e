use crate::tidy::folders::FolderSummary;
use crate::tidy::record::split_chain;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `{"tags": [...]}` as sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagVocabulary {
    pub tags: Vec<String>,
}

/// `{"tags": {tag: [chain, ...]}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInput {
    pub tags: BTreeMap<String, BTreeSet<String>>,
}

fn is_noise_segment(segment: &str) -> bool {
    segment.is_empty() || segment.chars().all(|c| c.is_ascii_digit())
}

pub fn extract_tags(summary: &FolderSummary) -> TagInput {
    let mut tags: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for node in summary.nodes.iter().filter(|n| n.file_count > 0) {
        for segment in split_chain(&node.chain) {
            let segment = segment.trim();
            if is_noise_segment(segment) {
                continue;
            }
            tags.entry(segment.to_string())
                .or_default()
                .insert(node.chain.clone());
        }
    }
    TagInput { tags }
}

impl TagInput {
    pub fn vocabulary(&self) -> TagVocabulary {
        TagVocabulary {
            tags: self.tags.keys().cloned().collect(),
        }
    }
}
