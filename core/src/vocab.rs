use std::collections::HashMap;
use std::path::Path;

use encoding_rs::Encoding;

use crate::error::Result;
use crate::persist::load_token_list;
use crate::TokenId;

/// Token <-> id mapping for one indexing run.
///
/// A dynamic vocabulary assigns ids in first-sighting order. A fixed one is
/// loaded from a user dictionary and never grows.
#[derive(Debug, Default)]
pub struct Vocabulary {
    ids: HashMap<String, TokenId>,
    tokens: Vec<String>,
    fixed: bool,
}

impl Vocabulary {
    pub fn dynamic() -> Self {
        Self::default()
    }

    /// Loads a user dictionary: one token per line, line number is the id.
    pub fn from_user_dict(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let tokens = load_token_list(path, encoding)?;
        Ok(Self::fixed(tokens))
    }

    pub fn fixed<I: IntoIterator<Item = S>, S: Into<String>>(tokens: I) -> Self {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let ids = tokens.iter().enumerate().map(|(i, t)| (t.clone(), i as TokenId)).collect();
        Self { ids, tokens, fixed: true }
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<TokenId> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    /// Id of `token`, assigning the next id when the vocabulary is dynamic.
    /// Returns `None` for tokens outside a fixed dictionary.
    pub fn resolve(&mut self, token: String) -> Option<TokenId> {
        if let Some(id) = self.get(&token) {
            return Some(id);
        }
        if self.fixed {
            return None;
        }
        let id = self.tokens.len() as TokenId;
        self.tokens.push(token.clone());
        self.ids.insert(token, id);
        Some(id)
    }

    /// `rank[id]` is the position of token `id` in lexicographic token order.
    pub fn lexical_ranks(&self) -> Vec<TokenId> {
        let mut order: Vec<TokenId> = (0..self.tokens.len() as TokenId).collect();
        order.sort_by(|a, b| self.tokens[*a as usize].cmp(&self.tokens[*b as usize]));
        let mut rank = vec![0; order.len()];
        for (pos, id) in order.into_iter().enumerate() {
            rank[id as usize] = pos as TokenId;
        }
        rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_ids_follow_first_sighting() {
        let mut v = Vocabulary::dynamic();
        assert_eq!(v.resolve("dog".into()), Some(0));
        assert_eq!(v.resolve("cat".into()), Some(1));
        assert_eq!(v.resolve("dog".into()), Some(0));
        assert_eq!(v.token(1), Some("cat"));
    }

    #[test]
    fn fixed_dictionary_drops_unknown_tokens() {
        let mut v = Vocabulary::fixed(["cat", "dog"]);
        assert_eq!(v.resolve("dog".into()), Some(1));
        assert_eq!(v.resolve("bird".into()), None);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn lexical_ranks_order_by_text() {
        let mut v = Vocabulary::dynamic();
        for t in ["dog", "cat", "bird"] {
            v.resolve(t.into());
        }
        assert_eq!(v.lexical_ranks(), vec![2, 1, 0]);
    }
}
