//! Applies a [`RemapTable`] to the artifacts written during ingestion.

use std::fs;
use std::io::{ErrorKind, Write};

use crate::error::Result;
use crate::persist::{create_buffered, read_term_freqs, save_vocabulary, write_tf_line, TaskPaths};
use crate::postings::RemapTable;
use crate::vocab::Vocabulary;
use crate::TermCounts;

/// Rewrites the term-frequency store with surviving ids only, renumbered and
/// sorted by new id. Returns the corpus word count over retained entries.
pub fn rewrite_term_freqs(paths: &TaskPaths, table: &RemapTable) -> Result<u64> {
    let old_path = paths.term_freq();
    let new_path = old_path.with_extension("tf.new");
    let mut w = create_buffered(&new_path)?;
    let mut word_count = 0u64;
    let mut docs = 0u64;
    for record in read_term_freqs(paths)? {
        let (doc_id, counts) = record?;
        let remapped: TermCounts = counts
            .into_iter()
            .filter_map(|(tid, count)| table.get(tid).map(|new| (new, count)))
            .collect();
        word_count += remapped.values().map(|c| *c as u64).sum::<u64>();
        write_tf_line(&mut w, doc_id, &remapped)?;
        docs += 1;
    }
    w.flush()?;
    drop(w);
    fs::rename(&new_path, &old_path)?;
    tracing::debug!(docs, word_count, "term-frequency store rewritten");
    Ok(word_count)
}

/// Writes the vocabulary listing in new-id order. Fixed dictionaries are
/// already known to the caller and produce no listing; a listing left by an
/// earlier run of the same task is removed.
pub fn dump_vocabulary(paths: &TaskPaths, vocab: &Vocabulary, table: &RemapTable) -> Result<bool> {
    if vocab.is_fixed() {
        match fs::remove_file(paths.vocabulary()) {
            Ok(()) => tracing::debug!(path = %paths.vocabulary().display(), "removed stale vocabulary listing"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        return Ok(false);
    }
    let olds = table.survivors_by_new_id();
    save_vocabulary(paths, olds.iter().filter_map(|old| vocab.token(*old)))?;
    Ok(true)
}
