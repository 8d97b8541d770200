use rust_stemmers::{Algorithm, Stemmer as SnowballImpl};

use crate::config::Params;
use crate::error::{Result, WvError};

/// Reduces a normalized token to its stem.
pub trait Stemmer {
    fn stem(&self, token: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DummyStemmer;

impl Stemmer for DummyStemmer {
    fn stem(&self, token: &str) -> String {
        token.to_string()
    }
}

/// Snowball stemmer for one language; English is the Porter2 algorithm.
pub struct SnowballStemmer {
    inner: SnowballImpl,
}

impl SnowballStemmer {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { inner: SnowballImpl::create(algorithm) }
    }

    pub fn english() -> Self {
        Self::new(Algorithm::English)
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let language = params.get("language").unwrap_or("english");
        Ok(Self::new(algorithm_for(language)?))
    }
}

fn algorithm_for(language: &str) -> Result<Algorithm> {
    let algorithm = match language.to_ascii_lowercase().as_str() {
        "arabic" => Algorithm::Arabic,
        "danish" => Algorithm::Danish,
        "dutch" => Algorithm::Dutch,
        "english" => Algorithm::English,
        "finnish" => Algorithm::Finnish,
        "french" => Algorithm::French,
        "german" => Algorithm::German,
        "greek" => Algorithm::Greek,
        "hungarian" => Algorithm::Hungarian,
        "italian" => Algorithm::Italian,
        "norwegian" => Algorithm::Norwegian,
        "portuguese" => Algorithm::Portuguese,
        "romanian" => Algorithm::Romanian,
        "russian" => Algorithm::Russian,
        "spanish" => Algorithm::Spanish,
        "swedish" => Algorithm::Swedish,
        "tamil" => Algorithm::Tamil,
        "turkish" => Algorithm::Turkish,
        other => return Err(WvError::config(format!("unsupported stemmer language `{other}`"))),
    };
    Ok(algorithm)
}

impl Stemmer for SnowballStemmer {
    fn stem(&self, token: &str) -> String {
        self.inner.stem(token).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_stems_inflections() {
        let s = SnowballStemmer::english();
        assert_eq!(s.stem("running"), "run");
        assert_eq!(s.stem("cats"), "cat");
    }

    #[test]
    fn unknown_language_is_rejected() {
        let p = Params::parse("language=klingon").unwrap();
        assert!(SnowballStemmer::from_params(&p).is_err());
    }
}
