//! Named factories for the pluggable pipeline components.

use serde::{Deserialize, Serialize};

use crate::config::{ComponentSpec, Params};
use crate::encoding::DEFAULT_ENCODING;
use crate::error::{Result, WvError};
use crate::filter::{DummyInputFilter, DummyWordFilter, InputFilter, LowercaseFilter, StopWordFilter, TagRemoverFilter, TokenNormalizer};
use crate::ingest::Analyzer;
use crate::loader::{DirectoryLoader, Loader, LocalFileLoader, LocalFilelistLoader, LocalKVFileLoader, TextLoader};
use crate::stemmer::{DummyStemmer, SnowballStemmer, Stemmer};
use crate::tokenizer::{ChunkTokenizer, NGramTokenizer, Tokenizer, WordTokenizer};

type Factory<T> = fn(&Params) -> Result<Box<T>>;

pub struct Registry<T: ?Sized + 'static> {
    kind: &'static str,
    entries: &'static [(&'static str, Factory<T>)],
}

impl<T: ?Sized + 'static> Registry<T> {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn build(&self, spec: &ComponentSpec) -> Result<Box<T>> {
        self.build_with_defaults(spec, &[])
    }

    /// Like [`build`](Self::build), filling in options the spec leaves unset.
    pub fn build_with_defaults(&self, spec: &ComponentSpec, defaults: &[(&str, &str)]) -> Result<Box<T>> {
        let factory = self
            .entries
            .iter()
            .find(|(name, _)| *name == spec.name)
            .map(|(_, factory)| factory)
            .ok_or_else(|| {
                let known: Vec<&str> = self.names().collect();
                WvError::config(format!("unknown {} `{}` (known: {})", self.kind, spec.name, known.join(", ")))
            })?;
        let mut params = Params::parse(&spec.options)?;
        for (key, value) in defaults {
            params.set_default(key, value);
        }
        factory(&params)
    }
}

pub static LOADERS: Registry<dyn Loader> = Registry {
    kind: "loader",
    entries: &[
        ("LocalFileLoader", |p| Ok(Box::new(LocalFileLoader::from_params(p)?))),
        ("LocalFilelistLoader", |p| Ok(Box::new(LocalFilelistLoader::from_params(p)?))),
        ("LocalKVFileLoader", |p| Ok(Box::new(LocalKVFileLoader::from_params(p)?))),
        ("DirectoryLoader", |p| Ok(Box::new(DirectoryLoader::from_params(p)?))),
        ("TextLoader", |p| Ok(Box::new(TextLoader::from_params(p)?))),
    ],
};

pub static INPUT_FILTERS: Registry<dyn InputFilter> = Registry {
    kind: "input filter",
    entries: &[
        ("DummyInputFilter", |_| Ok(Box::new(DummyInputFilter))),
        ("TagRemoverFilter", |_| Ok(Box::new(TagRemoverFilter))),
    ],
};

pub static TOKENIZERS: Registry<dyn Tokenizer> = Registry {
    kind: "tokenizer",
    entries: &[
        ("ChunkTokenizer", |_| Ok(Box::new(ChunkTokenizer))),
        ("NGramTokenizer", |p| Ok(Box::new(NGramTokenizer::from_params(p)?))),
        ("CharTokenizer", |_| Ok(Box::new(NGramTokenizer::new(1)))),
        ("WordTokenizer", |_| Ok(Box::new(WordTokenizer))),
    ],
};

pub static NORMALIZERS: Registry<dyn TokenNormalizer> = Registry {
    kind: "word filter",
    entries: &[
        ("DummyWordFilter", |_| Ok(Box::new(DummyWordFilter))),
        ("LowercaseFilter", |_| Ok(Box::new(LowercaseFilter))),
        ("StopWordFilter", |p| Ok(Box::new(StopWordFilter::from_params(p)))),
    ],
};

pub static STEMMERS: Registry<dyn Stemmer> = Registry {
    kind: "stemmer",
    entries: &[
        ("DummyStemmer", |_| Ok(Box::new(DummyStemmer))),
        ("PorterStemmer", |_| Ok(Box::new(SnowballStemmer::english()))),
        ("SnowballStemmer", |p| Ok(Box::new(SnowballStemmer::from_params(p)?))),
    ],
};

/// Component selection for one run. Only the loader has no default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub loader: ComponentSpec,
    pub input_filter: ComponentSpec,
    pub tokenizer: ComponentSpec,
    pub word_filter: ComponentSpec,
    pub stemmer: ComponentSpec,
    /// Source encoding, unless the loader options give their own.
    pub encoding: String,
}

impl PipelineSpec {
    pub fn new(loader: ComponentSpec) -> Self {
        Self {
            loader,
            input_filter: ComponentSpec::new("DummyInputFilter", ""),
            tokenizer: ComponentSpec::new("CharTokenizer", ""),
            word_filter: ComponentSpec::new("DummyWordFilter", ""),
            stemmer: ComponentSpec::new("DummyStemmer", ""),
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }

    /// Resolves every component; fails before any source is touched.
    pub fn build(&self) -> Result<(Box<dyn Loader>, Analyzer)> {
        if self.loader.name.is_empty() {
            return Err(WvError::config("a loader is required"));
        }
        let loader = LOADERS.build_with_defaults(&self.loader, &[("encoding", &self.encoding)])?;
        let analyzer = Analyzer {
            filter: INPUT_FILTERS.build(&self.input_filter)?,
            tokenizer: TOKENIZERS.build(&self.tokenizer)?,
            normalizer: NORMALIZERS.build(&self.word_filter)?,
            stemmer: STEMMERS.build(&self.stemmer)?,
        };
        Ok((loader, analyzer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_named_components() {
        let t = TOKENIZERS.build(&ComponentSpec::new("NGramTokenizer", "n=3")).unwrap();
        assert_eq!(t.tokenize("abcd").collect::<Vec<_>>(), vec!["abc", "bcd"]);
        let s = STEMMERS.build(&ComponentSpec::new("SnowballStemmer", r#"{"language": "english"}"#)).unwrap();
        assert_eq!(s.stem("running"), "run");
    }

    #[test]
    fn unknown_name_lists_alternatives() {
        let err = TOKENIZERS.build(&ComponentSpec::new("MMSegTokenizer", "")).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("MMSegTokenizer"));
        assert!(msg.contains("ChunkTokenizer"));
    }

    #[test]
    fn loader_requires_source() {
        let spec = PipelineSpec::new(ComponentSpec::new("LocalFileLoader", ""));
        assert!(matches!(spec.build(), Err(WvError::Configuration(_))));
    }

    #[test]
    fn pipeline_encoding_reaches_the_loader() {
        let mut spec = PipelineSpec::new(ComponentSpec::new("LocalFileLoader", "src=corpus.txt"));
        spec.encoding = "no-such-charset".into();
        assert!(matches!(spec.build(), Err(WvError::Configuration(_))));

        spec.loader.options = "src=corpus.txt&encoding=gbk".into();
        assert!(spec.build().is_ok());
    }
}
