//! Final vector weighting over the remapped term-frequency store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::error::{Result, WvError};
use crate::persist::{create_buffered, load_corpus_stats, load_document_frequencies, read_term_freqs, TaskPaths};
use crate::{DocId, TermCounts, TokenId};

/// TF-IDF weights at or below this magnitude are dropped.
pub const MIN_WEIGHT: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightingMethod {
    #[serde(rename = "TF")]
    Tf,
    #[serde(rename = "TFIDF")]
    TfIdf,
}

impl FromStr for WeightingMethod {
    type Err = WvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TF" => Ok(WeightingMethod::Tf),
            "TFIDF" | "TF-IDF" => Ok(WeightingMethod::TfIdf),
            other => Err(WvError::config(format!("weighting method `{other}` is not implemented"))),
        }
    }
}

impl fmt::Display for WeightingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingMethod::Tf => f.write_str("TF"),
            WeightingMethod::TfIdf => f.write_str("TFIDF"),
        }
    }
}

/// Turns one document's raw counts into weights sorted by token id.
pub trait Weighting {
    fn weigh(&self, counts: &TermCounts) -> Vec<(TokenId, f64)>;
}

/// Counts scaled to unit L2 length.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermFrequency;

impl Weighting for TermFrequency {
    fn weigh(&self, counts: &TermCounts) -> Vec<(TokenId, f64)> {
        let length = counts.values().map(|c| (*c as f64).powi(2)).sum::<f64>().sqrt();
        if length == 0.0 {
            return Vec::new();
        }
        counts.iter().map(|(tid, c)| (*tid, *c as f64 / length)).collect()
    }
}

/// Length-normalized term frequency times `ln(D / df)`, scaled to unit length.
#[derive(Debug, Clone)]
pub struct TfIdf {
    document_count: f64,
    df: HashMap<TokenId, u32>,
}

impl TfIdf {
    pub fn new(document_count: u64, df: HashMap<TokenId, u32>) -> Self {
        Self { document_count: document_count as f64, df }
    }

    /// Reads corpus metadata and the posting index of a finished task.
    pub fn load(paths: &TaskPaths) -> Result<Self> {
        let stats = load_corpus_stats(paths)?;
        let df = load_document_frequencies(paths)?;
        Ok(Self::new(stats.document_count, df))
    }

    pub fn idf(&self, tid: TokenId) -> Option<f64> {
        match self.df.get(&tid) {
            Some(df) if *df > 0 => Some((self.document_count / *df as f64).ln()),
            _ => None,
        }
    }
}

impl Weighting for TfIdf {
    fn weigh(&self, counts: &TermCounts) -> Vec<(TokenId, f64)> {
        let total: f64 = counts.values().map(|c| *c as f64).sum();
        if total == 0.0 {
            return Vec::new();
        }
        // terms pruned from the index have no idf and are skipped
        let scores: Vec<(TokenId, f64)> = counts
            .iter()
            .filter_map(|(tid, c)| self.idf(*tid).map(|idf| (*tid, *c as f64 / total * idf)))
            .collect();
        let length = scores.iter().map(|(_, s)| s * s).sum::<f64>().sqrt();
        if length == 0.0 {
            return Vec::new();
        }
        scores
            .into_iter()
            .map(|(tid, s)| (tid, s / length))
            .filter(|(_, w)| w.abs() > MIN_WEIGHT)
            .collect()
    }
}

pub fn write_vector_line<W: Write>(w: &mut W, doc_id: DocId, weights: &[(TokenId, f64)]) -> Result<()> {
    write!(w, "{doc_id}")?;
    for (tid, weight) in weights {
        write!(w, " {tid}:{weight:.6}")?;
    }
    writeln!(w)?;
    Ok(())
}

/// Writes `<task>.wv`, one line per document. Returns the number of lines.
pub fn create_vectors(paths: &TaskPaths, method: WeightingMethod) -> Result<u64> {
    if !paths.term_freq().is_file() {
        return Err(WvError::precondition(format!(
            "term-frequency store {} not found; index the corpus first",
            paths.term_freq().display()
        )));
    }
    let strategy: Box<dyn Weighting> = match method {
        WeightingMethod::Tf => Box::new(TermFrequency),
        WeightingMethod::TfIdf => Box::new(TfIdf::load(paths)?),
    };

    let mut w = create_buffered(&paths.vectors())?;
    let mut docs = 0u64;
    for record in read_term_freqs(paths)? {
        let (doc_id, counts) = record?;
        write_vector_line(&mut w, doc_id, &strategy.weigh(&counts))?;
        docs += 1;
    }
    w.flush()?;
    tracing::info!(%method, docs, output = %paths.vectors().display(), "vectors written");
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(TokenId, u32)]) -> TermCounts {
        pairs.iter().copied().collect()
    }

    #[test]
    fn tf_is_unit_length() {
        let w = TermFrequency.weigh(&counts(&[(0, 1), (1, 1)]));
        assert_eq!(w.len(), 2);
        assert!((w[0].1 - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        assert!(TermFrequency.weigh(&TermCounts::new()).is_empty());
    }

    #[test]
    fn tfidf_skips_unindexed_and_ubiquitous_terms() {
        let df = HashMap::from([(0, 1), (1, 3)]);
        let model = TfIdf::new(3, df);
        // token 1 is in every document (idf 0), token 2 was pruned
        let w = model.weigh(&counts(&[(0, 2), (1, 5), (2, 4)]));
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].0, 0);
        assert!((w[0].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tfidf_of_document_without_informative_terms_is_empty() {
        let model = TfIdf::new(2, HashMap::from([(0, 2)]));
        assert!(model.weigh(&counts(&[(0, 3)])).is_empty());
    }

    #[test]
    fn tfidf_cutoff_applies_to_normalized_weights() {
        let df = HashMap::from([(0, 5), (1, 5), (2, 10)]);
        let model = TfIdf::new(10, df);
        // raw scores are ~7e-7 each, yet both survive once scaled to unit length
        let w = model.weigh(&counts(&[(0, 1), (1, 1), (2, 1_000_000)]));
        assert_eq!(w.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![0, 1]);
        for (_, weight) in &w {
            assert!((weight - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        }
    }

    #[test]
    fn tfidf_does_not_renormalize_after_cutoff() {
        let model = TfIdf::new(10, HashMap::from([(0, 5), (1, 5)]));
        // token 1 normalizes to ~1e-6 and is dropped; token 0 keeps its share
        let w = model.weigh(&counts(&[(0, 1_000_000), (1, 1)]));
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].0, 0);
        let expected = 1e6 / (1e12f64 + 1.0).sqrt();
        assert_eq!(w[0].1, expected);
        assert!(w[0].1 < 1.0);
    }

    #[test]
    fn unknown_method_is_config_error() {
        assert_eq!("tfidf".parse::<WeightingMethod>().unwrap(), WeightingMethod::TfIdf);
        assert!(matches!("BM25".parse::<WeightingMethod>(), Err(WvError::Configuration(_))));
    }

    #[test]
    fn vector_line_format() {
        let mut out = Vec::new();
        write_vector_line(&mut out, 4, &[(0, 0.5), (3, 0.25)]).unwrap();
        write_vector_line(&mut out, 5, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "4 0:0.500000 3:0.250000\n5\n");
    }
}
