//! One indexing task: ingestion, posting construction, remapping and
//! vector weighting over a shared set of artifacts.

use crate::config::TaskConfig;
use crate::error::{Result, WvError};
use crate::ingest::{ingest, Analyzer, SourceStatus};
use crate::loader::Loader;
use crate::persist::{save_corpus_stats, save_manifest, TaskManifest, TaskPaths};
use crate::registry::PipelineSpec;
use crate::postings::build_postings;
use crate::remap::{dump_vocabulary, rewrite_term_freqs};
use crate::vocab::Vocabulary;
use crate::weighting::{create_vectors, WeightingMethod};
use crate::CorpusStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub stats: CorpusStats,
    pub source: SourceStatus,
    /// Distinct tokens seen (dynamic) or dictionary size (fixed).
    pub vocabulary_size: usize,
    pub survivors: usize,
}

pub struct Task {
    config: TaskConfig,
    paths: TaskPaths,
}

impl Task {
    pub fn new(config: TaskConfig) -> Result<Self> {
        config.validate()?;
        let paths = TaskPaths::new(&config.output_folder, &config.task_name);
        Ok(Self { config, paths })
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn paths(&self) -> &TaskPaths {
        &self.paths
    }

    fn vocabulary(&self) -> Result<Vocabulary> {
        match &self.config.user_dict {
            Some(path) => {
                let encoding = crate::encoding::resolve_line_oriented(&self.config.encoding)?;
                Vocabulary::from_user_dict(path, encoding).map_err(|e| {
                    WvError::config(format!("cannot read user dictionary {}: {e}", path.display()))
                })
            }
            None => Ok(Vocabulary::dynamic()),
        }
    }

    /// Produces `.tf .docinfo .ii .dic .corpus` for the corpus behind `loader`.
    pub fn index_corpus(&self, loader: &mut dyn Loader, analyzer: &Analyzer) -> Result<IndexReport> {
        let mut vocab = self.vocabulary()?;
        let report = ingest(&self.paths, loader, analyzer, &mut vocab)?;

        let table = build_postings(&self.paths, &self.config, &vocab)?;
        let word_count = rewrite_term_freqs(&self.paths, &table)?;
        dump_vocabulary(&self.paths, &vocab, &table)?;

        let stats = CorpusStats { document_count: report.stats.document_count, word_count };
        save_corpus_stats(&self.paths, &stats)?;
        tracing::info!(
            task = %self.config.task_name,
            num_docs = stats.document_count,
            word_count,
            survivors = table.survivors(),
            "index build complete"
        );
        Ok(IndexReport {
            stats,
            source: report.source,
            vocabulary_size: vocab.len(),
            survivors: table.survivors(),
        })
    }

    /// Produces `.wv` from an indexed task.
    pub fn create_vectors(&self, method: WeightingMethod) -> Result<u64> {
        create_vectors(&self.paths, method)
    }

    /// Records config, components and counts of a finished run in
    /// `<task>.manifest.json`.
    pub fn write_manifest(
        &self,
        report: &IndexReport,
        components: &PipelineSpec,
        weighting: WeightingMethod,
        created_at: String,
    ) -> Result<TaskManifest> {
        let manifest = TaskManifest {
            created_at,
            version: 1,
            config: self.config.clone(),
            components: components.clone(),
            weighting,
            stats: report.stats,
            vocabulary_size: report.survivors,
        };
        save_manifest(&self.paths, &manifest)?;
        Ok(manifest)
    }
}
