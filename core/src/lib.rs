//! Corpus indexing engine that turns raw documents into sparse weighted
//! term vectors.

pub mod config;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod loader;
pub mod persist;
pub mod postings;
pub mod registry;
pub mod remap;
pub mod sort;
pub mod stemmer;
pub mod task;
pub mod tokenizer;
pub mod vocab;
pub mod weighting;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use error::{Result, WvError};

pub type TokenId = u32;
pub type DocId = u32;

/// Per-document token counts, ordered by token id.
pub type TermCounts = BTreeMap<TokenId, u32>;

/// One line of the posting index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingList {
    pub token_id: TokenId,
    pub doc_ids: Vec<DocId>, // ascending, unique
}

impl PostingList {
    pub fn document_frequency(&self) -> u32 {
        self.doc_ids.len() as u32
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub document_count: u64,
    pub word_count: u64,
}
