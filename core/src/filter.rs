//! Content filters applied to whole documents and normalizers applied to
//! single tokens.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::config::Params;

lazy_static! {
    static ref HIDDEN_BLOCK_RE: Regex =
        Regex::new(r"(?is)<(script|style|head)\b.*?</(script|style|head)\s*>|<!--.*?-->").expect("valid regex");
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").expect("valid regex");
    static ref DEFAULT_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Transforms raw document content before tokenization.
pub trait InputFilter {
    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DummyInputFilter;

impl InputFilter for DummyInputFilter {
    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }
}

/// Keeps the visible text of HTML/XML markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagRemoverFilter;

impl InputFilter for TagRemoverFilter {
    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.contains('<') && !text.contains('&') {
            return Cow::Borrowed(text);
        }
        let visible = HIDDEN_BLOCK_RE.replace_all(text, " ");
        let stripped = TAG_RE.replace_all(&visible, " ");
        Cow::Owned(decode_entities(&stripped))
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Rewrites one token; an empty result drops the token.
pub trait TokenNormalizer {
    fn apply(&self, token: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DummyWordFilter;

impl TokenNormalizer for DummyWordFilter {
    fn apply(&self, token: &str) -> String {
        token.to_string()
    }
}

/// NFKC normalization followed by lowercasing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LowercaseFilter;

impl TokenNormalizer for LowercaseFilter {
    fn apply(&self, token: &str) -> String {
        token.nfkc().collect::<String>().to_lowercase()
    }
}

/// Lowercases and drops stopwords (English by default, or a `words` list).
#[derive(Debug, Clone, Default)]
pub struct StopWordFilter {
    custom: Option<HashSet<String>>,
}

impl StopWordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &Params) -> Self {
        let custom = params.get("words").map(|list| {
            list.split(',')
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        });
        Self { custom }
    }

    fn is_stopword(&self, token: &str) -> bool {
        match &self.custom {
            Some(words) => words.contains(token),
            None => DEFAULT_STOPWORDS.contains(token),
        }
    }
}

impl TokenNormalizer for StopWordFilter {
    fn apply(&self, token: &str) -> String {
        let lowered = LowercaseFilter.apply(token);
        if self.is_stopword(&lowered) { String::new() } else { lowered }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_hidden_blocks() {
        let html = "<html><head><title>x</title></head><body><p>cat &amp; dog</p>\
                    <script>var a = 1;</script><!-- note --></body></html>";
        let text = TagRemoverFilter.apply(html);
        let words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(words, vec!["cat", "&", "dog"]);
    }

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(TagRemoverFilter.apply("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn stopwords_are_dropped() {
        let f = StopWordFilter::new();
        assert_eq!(f.apply("The"), "");
        assert_eq!(f.apply("Café"), "café");
        let custom = StopWordFilter::from_params(&Params::parse("words=cat,Dog").unwrap());
        assert_eq!(custom.apply("dog"), "");
        assert_eq!(custom.apply("the"), "the");
    }
}
