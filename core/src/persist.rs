use crate::config::TaskConfig;
use crate::encoding::decode;
use crate::error::{Result, WvError};
use crate::registry::PipelineSpec;
use crate::weighting::WeightingMethod;
use crate::{CorpusStats, DocId, PostingList, TermCounts, TokenId};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

/// Informational summary written next to the artifacts of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskManifest {
    pub created_at: String,
    pub version: u32,
    pub config: TaskConfig,
    pub components: PipelineSpec,
    pub weighting: WeightingMethod,
    pub stats: CorpusStats,
    /// Tokens left after pruning.
    pub vocabulary_size: usize,
}

/// File names of one indexing task: `<folder>/<task>.<ext>`.
#[derive(Debug, Clone)]
pub struct TaskPaths {
    pub root: PathBuf,
    pub task: String,
}

impl TaskPaths {
    pub fn new<P: AsRef<Path>>(root: P, task: &str) -> Self {
        Self { root: root.as_ref().to_path_buf(), task: task.to_string() }
    }
    fn file(&self, ext: &str) -> PathBuf { self.root.join(format!("{}.{}", self.task, ext)) }
    pub fn term_freq(&self) -> PathBuf { self.file("tf") }
    pub fn doc_info(&self) -> PathBuf { self.file("docinfo") }
    pub fn events(&self) -> PathBuf { self.file("tmp") }
    pub fn postings(&self) -> PathBuf { self.file("ii") }
    pub fn vocabulary(&self) -> PathBuf { self.file("dic") }
    pub fn corpus(&self) -> PathBuf { self.file("corpus") }
    pub fn vectors(&self) -> PathBuf { self.file("wv") }
    pub fn manifest(&self) -> PathBuf { self.file("manifest.json") }
    pub fn sort_run(&self, pass: usize, n: usize) -> PathBuf { self.file(&format!("run.{pass}.{n}")) }

    pub fn ensure_root(&self) -> Result<()> {
        create_dir_all(&self.root)?;
        Ok(())
    }
}

pub fn create_buffered(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

// ---- term-frequency store: `docid tokid:count tokid:count ...`

pub fn write_tf_line<W: Write>(w: &mut W, doc_id: DocId, counts: &TermCounts) -> Result<()> {
    write!(w, "{doc_id}")?;
    for (tid, count) in counts {
        write!(w, " {tid}:{count}")?;
    }
    writeln!(w)?;
    Ok(())
}

pub fn parse_tf_line(line: &str) -> std::result::Result<(DocId, TermCounts), String> {
    let mut parts = line.split_whitespace();
    let doc_id = parts
        .next()
        .ok_or("empty line")?
        .parse::<DocId>()
        .map_err(|e| format!("bad document id: {e}"))?;
    let mut counts = TermCounts::new();
    for part in parts {
        let (tid, count) = part.split_once(':').ok_or_else(|| format!("bad entry `{part}`"))?;
        let tid = tid.parse::<TokenId>().map_err(|e| format!("bad token id in `{part}`: {e}"))?;
        let count = count.parse::<u32>().map_err(|e| format!("bad count in `{part}`: {e}"))?;
        let total = counts.entry(tid).or_insert(0);
        *total = total.checked_add(count).ok_or_else(|| format!("count overflow in `{part}`"))?;
    }
    Ok((doc_id, counts))
}

/// Streams a line-oriented artifact, skipping records the parser rejects.
pub struct RecordReader<T> {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    parse: fn(&str) -> std::result::Result<T, String>,
}

impl<T> RecordReader<T> {
    pub fn open(path: &Path, parse: fn(&str) -> std::result::Result<T, String>) -> Result<Self> {
        let f = File::open(path)?;
        Ok(Self { path: path.to_path_buf(), lines: BufReader::new(f).lines(), line_no: 0, parse })
    }
}

impl<T> Iterator for RecordReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() { continue; }
            match (self.parse)(&line) {
                Ok(record) => return Some(Ok(record)),
                Err(reason) => {
                    let err = WvError::malformed(&self.path, self.line_no, reason);
                    tracing::warn!(%err, "skipping record");
                }
            }
        }
    }
}

pub fn read_term_freqs(paths: &TaskPaths) -> Result<RecordReader<(DocId, TermCounts)>> {
    RecordReader::open(&paths.term_freq(), parse_tf_line)
}

// ---- document metadata: `docid,uri`

pub fn write_doc_info<W: Write>(w: &mut W, doc_id: DocId, uri: &str) -> Result<()> {
    let uri: String = uri.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect();
    writeln!(w, "{doc_id},{uri}")?;
    Ok(())
}

// ---- raw posting events: `tokid,docid`

pub fn write_event<W: Write>(w: &mut W, token_id: TokenId, doc_id: DocId) -> Result<()> {
    writeln!(w, "{token_id},{doc_id}")?;
    Ok(())
}

pub fn parse_event(line: &str) -> std::result::Result<(TokenId, DocId), String> {
    let (tid, did) = line.trim().split_once(',').ok_or("missing `,`")?;
    let tid = tid.parse::<TokenId>().map_err(|e| format!("bad token id: {e}"))?;
    let did = did.parse::<DocId>().map_err(|e| format!("bad document id: {e}"))?;
    Ok((tid, did))
}

// ---- posting index: `tokid,df,doc1,doc2,...`

pub fn write_posting<W: Write>(w: &mut W, posting: &PostingList) -> Result<()> {
    write!(w, "{},{}", posting.token_id, posting.document_frequency())?;
    for did in &posting.doc_ids {
        write!(w, ",{did}")?;
    }
    writeln!(w)?;
    Ok(())
}

pub fn parse_posting(line: &str) -> std::result::Result<PostingList, String> {
    let mut parts = line.trim().split(',');
    let token_id = parts
        .next()
        .ok_or("empty line")?
        .parse::<TokenId>()
        .map_err(|e| format!("bad token id: {e}"))?;
    let df = parts
        .next()
        .ok_or("missing document frequency")?
        .parse::<u32>()
        .map_err(|e| format!("bad document frequency: {e}"))?;
    let doc_ids = parts
        .map(|p| p.parse::<DocId>().map_err(|e| format!("bad document id: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if doc_ids.len() as u32 != df {
        return Err(format!("document frequency {df} does not match {} ids", doc_ids.len()));
    }
    Ok(PostingList { token_id, doc_ids })
}

pub fn read_postings(paths: &TaskPaths) -> Result<RecordReader<PostingList>> {
    RecordReader::open(&paths.postings(), parse_posting)
}

/// Token id -> document frequency, from the posting index.
pub fn load_document_frequencies(paths: &TaskPaths) -> Result<HashMap<TokenId, u32>> {
    if !paths.postings().is_file() {
        return Err(WvError::precondition(format!(
            "posting index {} not found; index the corpus first",
            paths.postings().display()
        )));
    }
    let mut df = HashMap::new();
    for posting in read_postings(paths)? {
        let posting = posting?;
        df.insert(posting.token_id, posting.document_frequency());
    }
    Ok(df)
}

// ---- vocabulary listing: one token per line, line number = id

pub fn save_vocabulary<'a, I: IntoIterator<Item = &'a str>>(paths: &TaskPaths, tokens: I) -> Result<()> {
    let mut w = create_buffered(&paths.vocabulary())?;
    for token in tokens {
        writeln!(w, "{token}")?;
    }
    w.flush()?;
    Ok(())
}

/// Reads a one-token-per-line listing; the 0-based line number is the id.
pub fn load_token_list(path: &Path, encoding: &'static Encoding) -> Result<Vec<String>> {
    let text = decode(&fs::read(path)?, encoding, path);
    Ok(text.lines().map(|line| line.trim().to_string()).collect())
}

// ---- corpus metadata: `key=value`

pub fn save_corpus_stats(paths: &TaskPaths, stats: &CorpusStats) -> Result<()> {
    let mut w = create_buffered(&paths.corpus())?;
    writeln!(w, "document_count={}", stats.document_count)?;
    writeln!(w, "word_count={}", stats.word_count)?;
    w.flush()?;
    Ok(())
}

pub fn load_corpus_stats(paths: &TaskPaths) -> Result<CorpusStats> {
    let path = paths.corpus();
    if !path.is_file() {
        return Err(WvError::precondition(format!(
            "corpus metadata {} not found; index the corpus first",
            path.display()
        )));
    }
    let mut document_count = None;
    let mut word_count = 0;
    for (i, line) in BufReader::new(File::open(&path)?).lines().enumerate() {
        let line = line?;
        let Some((key, value)) = line.trim().split_once('=') else { continue };
        let parsed = value.trim().parse::<u64>();
        match (key.trim(), parsed) {
            ("document_count", Ok(v)) => document_count = Some(v),
            ("word_count", Ok(v)) => word_count = v,
            (_, Err(e)) => {
                let err = WvError::malformed(&path, i + 1, e.to_string());
                tracing::warn!(%err, "skipping record");
            }
            _ => {}
        }
    }
    let document_count = document_count
        .ok_or_else(|| WvError::precondition(format!("{} has no document_count", path.display())))?;
    Ok(CorpusStats { document_count, word_count })
}

pub fn save_manifest(paths: &TaskPaths, manifest: &TaskManifest) -> Result<()> {
    let mut f = File::create(paths.manifest())?;
    let json = serde_json::to_string_pretty(manifest)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_manifest(paths: &TaskPaths) -> Result<TaskManifest> {
    let f = File::open(paths.manifest())?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tf_line_accepts_empty_document() {
        let (id, counts) = parse_tf_line("7").unwrap();
        assert_eq!(id, 7);
        assert!(counts.is_empty());
    }

    #[test]
    fn tf_line_rejects_garbage() {
        assert!(parse_tf_line("x 1:2").is_err());
        assert!(parse_tf_line("0 1-2").is_err());
    }

    #[test]
    fn tf_line_rejects_count_overflow() {
        let err = parse_tf_line("1 0:4294967295 0:1").unwrap_err();
        assert!(err.contains("overflow"));
        let (_, counts) = parse_tf_line("1 0:2 0:3").unwrap();
        assert_eq!(counts.get(&0), Some(&5));
    }

    #[test]
    fn doc_info_keeps_one_record_per_line() {
        let mut out = Vec::new();
        write_doc_info(&mut out, 2, "a,b\nc").unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(line, "2,a,b c\n");
    }

    #[test]
    fn posting_line_checks_df() {
        let p = parse_posting("3,2,0,4").unwrap();
        assert_eq!(p, PostingList { token_id: 3, doc_ids: vec![0, 4] });
        assert!(parse_posting("3,3,0,4").is_err());
    }
}
