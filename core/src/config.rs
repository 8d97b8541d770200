//! Task configuration and component option strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::encoding::DEFAULT_ENCODING;
use crate::error::{Result, WvError};

pub const DEFAULT_MIN_DF: u32 = 2;
pub const DEFAULT_MAX_DF: u32 = 1_000_000;
pub const DEFAULT_SORT_BUFFER: usize = 1 << 20;
pub const DEFAULT_MERGE_FAN_IN: usize = 64;

/// How surviving tokens are renumbered after pruning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdOrder {
    /// Dense renumbering in original id (first sighting) order.
    #[default]
    FirstSeen,
    /// Dense renumbering in lexicographic token order.
    Lexical,
}

impl FromStr for IdOrder {
    type Err = WvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first-seen" | "firstseen" => Ok(IdOrder::FirstSeen),
            "lexical" => Ok(IdOrder::Lexical),
            other => Err(WvError::config(format!("unknown id order `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub task_name: String,
    pub output_folder: PathBuf,
    pub min_df: u32,
    pub max_df: u32,
    pub user_dict: Option<PathBuf>,
    pub id_order: IdOrder,
    /// Events held in memory before a sorted run is spilled to disk.
    pub sort_buffer: usize,
    /// Runs merged at once; more runs than this trigger another merge pass.
    pub merge_fan_in: usize,
    /// Encoding label of the user dictionary.
    pub encoding: String,
}

impl TaskConfig {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(task_name: S, output_folder: P) -> Self {
        Self {
            task_name: task_name.into(),
            output_folder: output_folder.into(),
            min_df: DEFAULT_MIN_DF,
            max_df: DEFAULT_MAX_DF,
            user_dict: None,
            id_order: IdOrder::default(),
            sort_buffer: DEFAULT_SORT_BUFFER,
            merge_fan_in: DEFAULT_MERGE_FAN_IN,
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.task_name.trim().is_empty() {
            return Err(WvError::config("task name is required"));
        }
        if self.task_name.contains(std::path::is_separator) {
            return Err(WvError::config("task name must not contain a path separator"));
        }
        if self.output_folder.as_os_str().is_empty() {
            return Err(WvError::config("output folder is required"));
        }
        if self.min_df > self.max_df {
            return Err(WvError::config(format!(
                "min_df ({}) is greater than max_df ({})",
                self.min_df, self.max_df
            )));
        }
        if self.sort_buffer == 0 {
            return Err(WvError::config("sort buffer must hold at least one event"));
        }
        if self.merge_fan_in < 2 {
            return Err(WvError::config("merge fan-in must be at least 2"));
        }
        crate::encoding::resolve_line_oriented(&self.encoding)?;
        Ok(())
    }
}

/// A component chosen by registry name, with its raw option string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    pub options: String,
}

impl ComponentSpec {
    pub fn new<N: Into<String>, O: Into<String>>(name: N, options: O) -> Self {
        Self { name: name.into(), options: options.into() }
    }
}

/// Parsed component options.
///
/// Accepts `a=x&b=y` or a JSON object. Pairs without exactly one `=` are
/// ignored; JSON values that are not strings keep their JSON rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut map = BTreeMap::new();
        if raw.is_empty() {
            return Ok(Params(map));
        }
        if raw.starts_with('{') {
            let value: Value = serde_json::from_str(raw)
                .map_err(|e| WvError::config(format!("invalid option object `{raw}`: {e}")))?;
            let Value::Object(obj) = value else {
                return Err(WvError::config(format!("option string `{raw}` is not an object")));
            };
            for (k, v) in obj {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(k, v);
            }
        } else {
            for part in raw.split('&') {
                let mut kv = part.split('=');
                if let (Some(k), Some(v), None) = (kv.next(), kv.next(), kv.next()) {
                    map.insert(k.to_string(), v.to_string());
                }
            }
        }
        Ok(Params(map))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets `key` unless the options already name it.
    pub fn set_default(&mut self, key: &str, value: &str) {
        self.0.entry(key.to_string()).or_insert_with(|| value.to_string());
    }

    pub fn require(&self, key: &str, component: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            WvError::config(format!("required argument `{key}` missing for {component}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pair_syntax() {
        let p = Params::parse("src=a.txt&n=2&broken&x=1=2").unwrap();
        assert_eq!(p.get("src"), Some("a.txt"));
        assert_eq!(p.get("n"), Some("2"));
        assert_eq!(p.get("broken"), None);
        assert_eq!(p.get("x"), None);
    }

    #[test]
    fn parses_json_syntax() {
        let p = Params::parse(r#"{"src": "corpus.tsv", "n": 3}"#).unwrap();
        assert_eq!(p.get("src"), Some("corpus.tsv"));
        assert_eq!(p.get("n"), Some("3"));
    }

    #[test]
    fn missing_required_key_is_config_error() {
        let p = Params::parse("").unwrap();
        let err = p.require("src", "LocalFileLoader").unwrap_err();
        assert!(matches!(err, WvError::Configuration(_)));
    }

    #[test]
    fn rejects_inverted_df_band() {
        let mut cfg = TaskConfig::new("t", "/tmp/out");
        cfg.min_df = 5;
        cfg.max_df = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_encoding() {
        let mut cfg = TaskConfig::new("t", "/tmp/out");
        cfg.encoding = "no-such-charset".into();
        assert!(matches!(cfg.validate(), Err(WvError::Configuration(_))));
        cfg.encoding = "gbk".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn defaults_do_not_override_given_options() {
        let mut p = Params::parse("src=a&encoding=gbk").unwrap();
        p.set_default("encoding", "utf-8");
        p.set_default("ext", "txt");
        assert_eq!(p.get("encoding"), Some("gbk"));
        assert_eq!(p.get("ext"), Some("txt"));
    }
}
