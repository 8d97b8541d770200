//! Document ingestion: loader -> filter -> tokenizer -> normalizer ->
//! stemmer, one document at a time, into the three append-only stores.

use std::fs::File;
use std::io::{BufWriter, Write};

use crate::error::Result;
use crate::filter::{InputFilter, TokenNormalizer};
use crate::loader::Loader;
use crate::persist::{create_buffered, write_doc_info, write_event, write_tf_line, TaskPaths};
use crate::stemmer::Stemmer;
use crate::tokenizer::Tokenizer;
use crate::vocab::Vocabulary;
use crate::{CorpusStats, DocId, TermCounts};

/// Per-document scratch state; lives until its records are flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocId,
    pub uri: String,
    pub term_counts: TermCounts,
}

impl Document {
    pub fn new(id: DocId, uri: String) -> Self {
        Self { id, uri, term_counts: TermCounts::new() }
    }

    pub fn word_count(&self) -> u64 {
        self.term_counts.values().map(|c| *c as u64).sum()
    }
}

/// The fixed text-processing chain applied to every document.
pub struct Analyzer {
    pub filter: Box<dyn InputFilter>,
    pub tokenizer: Box<dyn Tokenizer>,
    pub normalizer: Box<dyn TokenNormalizer>,
    pub stemmer: Box<dyn Stemmer>,
}

impl Analyzer {
    /// Counts the terms of `content` into `doc`.
    pub fn analyze(&self, content: &str, vocab: &mut Vocabulary, doc: &mut Document) {
        let filtered = self.filter.apply(content);
        for token in self.tokenizer.tokenize(&filtered) {
            let token = self.normalizer.apply(&token);
            if token.is_empty() { continue; }
            let token = self.stemmer.stem(&token);
            if token.is_empty() { continue; }
            if let Some(tid) = vocab.resolve(token) {
                *doc.term_counts.entry(tid).or_insert(0) += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Opened,
    /// The loader could not open its source; the run indexed nothing from it.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub stats: CorpusStats,
    pub source: SourceStatus,
}

/// Append-only term-frequency, document-metadata and posting-event stores.
pub struct IngestWriters {
    tf: BufWriter<File>,
    doc_info: BufWriter<File>,
    events: BufWriter<File>,
}

impl IngestWriters {
    pub fn create(paths: &TaskPaths) -> Result<Self> {
        paths.ensure_root()?;
        Ok(Self {
            tf: create_buffered(&paths.term_freq())?,
            doc_info: create_buffered(&paths.doc_info())?,
            events: create_buffered(&paths.events())?,
        })
    }

    /// Writes and flushes every record of one finished document.
    pub fn record(&mut self, doc: &Document) -> Result<()> {
        write_tf_line(&mut self.tf, doc.id, &doc.term_counts)?;
        self.tf.flush()?;
        write_doc_info(&mut self.doc_info, doc.id, &doc.uri)?;
        self.doc_info.flush()?;
        for tid in doc.term_counts.keys() {
            write_event(&mut self.events, *tid, doc.id)?;
        }
        self.events.flush()?;
        Ok(())
    }
}

/// Runs every item of `loader` through `analyzer` into the task's stores.
pub fn ingest(
    paths: &TaskPaths,
    loader: &mut dyn Loader,
    analyzer: &Analyzer,
    vocab: &mut Vocabulary,
) -> Result<IngestReport> {
    let mut writers = IngestWriters::create(paths)?;
    let mut stats = CorpusStats::default();

    let source = match loader.open() {
        Ok(()) => SourceStatus::Opened,
        Err(err) => {
            tracing::error!(source = %loader.source(), %err, "source unavailable, indexing nothing");
            SourceStatus::Unavailable(err.to_string())
        }
    };

    let mut next_doc_id: DocId = 0;
    for (uri, content) in loader.items() {
        let mut doc = Document::new(next_doc_id, uri);
        analyzer.analyze(&content, vocab, &mut doc);
        writers.record(&doc)?;
        stats.document_count += 1;
        stats.word_count += doc.word_count();
        next_doc_id += 1;
    }
    loader.close();

    tracing::info!(num_docs = stats.document_count, num_terms = vocab.len(), "ingested documents");
    Ok(IngestReport { stats, source })
}
