use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Params;
use crate::error::Result;

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
}

/// Splits filtered document text into a lazy, finite sequence of tokens.
pub trait Tokenizer {
    fn tokenize<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = String> + 'a>;
}

/// Maximal runs of alphanumeric characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkTokenizer;

impl ChunkTokenizer {
    pub fn chunks(text: &str) -> impl Iterator<Item = &str> {
        text.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty())
    }
}

impl Tokenizer for ChunkTokenizer {
    fn tokenize<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
        Box::new(Self::chunks(text).map(str::to_string))
    }
}

/// Character n-grams taken inside each chunk; chunks shorter than `n` emit nothing.
#[derive(Debug, Clone, Copy)]
pub struct NGramTokenizer {
    n: usize,
}

impl NGramTokenizer {
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1) }
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let n = params.require("n", "NGramTokenizer")?;
        // unparsable sizes degrade to unigrams
        Ok(Self::new(n.trim().parse().unwrap_or(1)))
    }
}

impl Tokenizer for NGramTokenizer {
    fn tokenize<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
        let n = self.n;
        Box::new(ChunkTokenizer::chunks(text).flat_map(move |chunk| {
            let chars: Vec<char> = chunk.chars().collect();
            let grams: Vec<String> = chars.windows(n).map(|w| w.iter().collect()).collect();
            grams.into_iter()
        }))
    }
}

/// Letter-led words, as the search tokenizer reads them.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = String> + 'a> {
        Box::new(WORD_RE.find_iter(text).map(|m| m.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(t: &dyn Tokenizer, text: &str) -> Vec<String> {
        t.tokenize(text).collect()
    }

    #[test]
    fn chunks_split_on_punctuation() {
        assert_eq!(collect(&ChunkTokenizer, "cat, dog!!bird  "), vec!["cat", "dog", "bird"]);
        assert!(collect(&ChunkTokenizer, " ,.; ").is_empty());
    }

    #[test]
    fn ngrams_stay_inside_chunks() {
        let t = NGramTokenizer::new(2);
        assert_eq!(collect(&t, "abc d"), vec!["ab", "bc"]);
        let chars = NGramTokenizer::new(1);
        assert_eq!(collect(&chars, "中文"), vec!["中", "文"]);
    }

    #[test]
    fn bad_ngram_size_falls_back_to_unigrams() {
        let t = NGramTokenizer::from_params(&Params::parse("n=zero").unwrap()).unwrap();
        assert_eq!(collect(&t, "ab"), vec!["a", "b"]);
    }

    #[test]
    fn words_keep_apostrophes() {
        assert_eq!(collect(&WordTokenizer, "runner's 42 run"), vec!["runner's", "run"]);
    }
}
