//! Inverted index construction from the raw posting-event stream.
//!
//! Events are relabelled (lexical id order only), pushed through the
//! external sort and scanned once. Each run of equal token ids becomes one
//! posting list; the document-frequency band decides whether it survives
//! and survivors are numbered densely in scan order.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use crate::config::{IdOrder, TaskConfig};
use crate::error::{Result, WvError};
use crate::persist::{create_buffered, parse_event, write_posting, RecordReader, TaskPaths};
use crate::sort::ExternalSorter;
use crate::vocab::Vocabulary;
use crate::{DocId, PostingList, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruningPolicy {
    pub min_df: u32,
    pub max_df: u32,
    /// Set when a user dictionary is in force; nothing is pruned.
    pub keep_all: bool,
}

impl PruningPolicy {
    pub fn keeps(&self, df: u32) -> bool {
        self.keep_all || (self.min_df <= df && df <= self.max_df)
    }
}

/// Old token id -> new token id for the survivors of pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapTable {
    map: Vec<Option<TokenId>>,
    survivors: usize,
}

impl RemapTable {
    pub fn new(vocabulary_size: usize) -> Self {
        Self { map: vec![None; vocabulary_size], survivors: 0 }
    }

    fn insert(&mut self, old: TokenId, new: TokenId) {
        if let Some(slot) = self.map.get_mut(old as usize) {
            if slot.replace(new).is_none() {
                self.survivors += 1;
            }
        }
    }

    pub fn get(&self, old: TokenId) -> Option<TokenId> {
        self.map.get(old as usize).copied().flatten()
    }

    pub fn survivors(&self) -> usize {
        self.survivors
    }

    /// Old ids of the survivors, indexed by new id.
    pub fn survivors_by_new_id(&self) -> Vec<TokenId> {
        let mut pairs: Vec<(TokenId, TokenId)> = self
            .map
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.map(|n| (n, old as TokenId)))
            .collect();
        pairs.sort_unstable();
        pairs.into_iter().map(|(_, old)| old).collect()
    }
}

struct PostingEmitter {
    writer: BufWriter<File>,
    policy: PruningPolicy,
    table: RemapTable,
    /// Sort key -> original id; `None` when keys are original ids.
    key_to_old: Option<Vec<TokenId>>,
    next_id: TokenId,
    emitted: usize,
    pruned: usize,
}

impl PostingEmitter {
    fn emit(&mut self, key: TokenId, doc_ids: Vec<DocId>) -> Result<()> {
        debug_assert!(doc_ids.windows(2).all(|w| w[0] < w[1]));
        let df = doc_ids.len() as u32;
        if !self.policy.keeps(df) {
            self.pruned += 1;
            return Ok(());
        }
        let old = match &self.key_to_old {
            Some(order) => order[key as usize],
            None => key,
        };
        let new = if self.policy.keep_all {
            old
        } else {
            let id = self.next_id;
            self.next_id += 1;
            id
        };
        self.table.insert(old, new);
        write_posting(&mut self.writer, &PostingList { token_id: new, doc_ids })?;
        self.emitted += 1;
        Ok(())
    }
}

/// Builds `<task>.ii` from `<task>.tmp` and returns the id remapping.
/// The event file is removed once the index is written.
pub fn build_postings(paths: &TaskPaths, config: &TaskConfig, vocab: &Vocabulary) -> Result<RemapTable> {
    let events_path = paths.events();
    if !events_path.is_file() {
        return Err(WvError::precondition(format!(
            "posting events {} not found; ingest the corpus first",
            events_path.display()
        )));
    }

    let ranks = (!vocab.is_fixed() && config.id_order == IdOrder::Lexical).then(|| vocab.lexical_ranks());
    let key_to_old = ranks.as_ref().map(|rank| {
        let mut order = vec![0; rank.len()];
        for (old, r) in rank.iter().enumerate() {
            order[*r as usize] = old as TokenId;
        }
        order
    });

    let mut sorter = ExternalSorter::new(paths, config.sort_buffer, config.merge_fan_in);
    let mut raw_events = 0u64;
    for (line, event) in RecordReader::open(&events_path, parse_event)?.enumerate() {
        let (tid, did) = event?;
        if tid as usize >= vocab.len() {
            let err = WvError::malformed(&events_path, line + 1, format!("token id {tid} outside vocabulary"));
            tracing::warn!(%err, "skipping record");
            continue;
        }
        let key = match &ranks {
            Some(rank) => rank[tid as usize],
            None => tid,
        };
        sorter.push((key, did))?;
        raw_events += 1;
    }

    let mut emitter = PostingEmitter {
        writer: create_buffered(&paths.postings())?,
        policy: PruningPolicy {
            min_df: config.min_df,
            max_df: config.max_df,
            keep_all: vocab.is_fixed(),
        },
        table: RemapTable::new(vocab.len()),
        key_to_old,
        next_id: 0,
        emitted: 0,
        pruned: 0,
    };

    let mut current: Option<(TokenId, Vec<DocId>)> = None;
    for event in sorter.finish()? {
        let (key, did) = event?;
        if let Some((k, docs)) = current.as_mut() {
            if *k == key {
                docs.push(did);
                continue;
            }
        }
        if let Some((k, docs)) = current.take() {
            emitter.emit(k, docs)?;
        }
        current = Some((key, vec![did]));
    }
    if let Some((k, docs)) = current {
        emitter.emit(k, docs)?;
    }
    emitter.writer.flush()?;
    fs::remove_file(&events_path)?;

    tracing::info!(
        raw_events,
        survivors = emitter.emitted,
        pruned = emitter.pruned,
        "posting index built"
    );
    Ok(emitter.table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_band_is_inclusive() {
        let p = PruningPolicy { min_df: 2, max_df: 3, keep_all: false };
        assert!(!p.keeps(1));
        assert!(p.keeps(2));
        assert!(p.keeps(3));
        assert!(!p.keeps(4));
        assert!(PruningPolicy { keep_all: true, ..p }.keeps(100));
    }

    #[test]
    fn remap_table_inverts_by_new_id() {
        let mut t = RemapTable::new(4);
        t.insert(3, 0);
        t.insert(1, 1);
        assert_eq!(t.survivors(), 2);
        assert_eq!(t.get(0), None);
        assert_eq!(t.get(3), Some(0));
        assert_eq!(t.survivors_by_new_id(), vec![3, 1]);
    }
}
