//! Document sources. A loader yields `(uri, content)` pairs between
//! `open` and `close`; a loader that failed to open yields nothing.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8};
use walkdir::WalkDir;

use crate::config::Params;
use crate::encoding::{self, decode};
use crate::error::{Result, WvError};

/// One raw document: `(uri, content)`.
pub type LoadedItem = (String, String);

pub trait Loader {
    /// Human-readable description of the source, used in diagnostics.
    fn source(&self) -> String;

    /// Opens the source. Calling it again after success is a no-op.
    fn open(&mut self) -> Result<()>;

    fn items<'a>(&'a mut self) -> Box<dyn Iterator<Item = LoadedItem> + 'a>;

    fn close(&mut self);
}

fn unavailable(source: &Path, err: std::io::Error) -> WvError {
    WvError::SourceUnavailable { source_uri: source.display().to_string(), reason: err.to_string() }
}

/// The optional `encoding` parameter; UTF-8 when absent.
fn encoding_param(params: &Params, line_oriented: bool) -> Result<&'static Encoding> {
    match params.get("encoding") {
        Some(label) if line_oriented => encoding::resolve_line_oriented(label),
        Some(label) => encoding::resolve(label),
        None => Ok(UTF_8),
    }
}

fn read_text(path: &Path, encoding: &'static Encoding) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(decode(&bytes, encoding, path))
}

fn open_lines(src: &Path, reader: &mut Option<BufReader<File>>) -> Result<()> {
    if reader.is_none() {
        let f = File::open(src).map_err(|e| unavailable(src, e))?;
        *reader = Some(BufReader::new(f));
    }
    Ok(())
}

fn line_iter<'a>(
    reader: &'a mut Option<BufReader<File>>,
    src: &'a Path,
    encoding: &'static Encoding,
) -> impl Iterator<Item = String> + 'a {
    reader.iter_mut().flat_map(|r| r.split(b'\n')).map_while(move |line| match line {
        Ok(bytes) => Some(decode(&bytes, encoding, src)),
        Err(e) => {
            tracing::warn!(source = %src.display(), error = %e, "stopped reading source");
            None
        }
    })
}

/// A single local file, loaded as one document.
pub struct LocalFileLoader {
    src: PathBuf,
    encoding: &'static Encoding,
    opened: bool,
}

impl LocalFileLoader {
    pub fn new<P: Into<PathBuf>>(src: P) -> Self {
        Self { src: src.into(), encoding: UTF_8, opened: false }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let loader = Self::new(params.require("src", "LocalFileLoader")?);
        Ok(loader.with_encoding(encoding_param(params, false)?))
    }
}

impl Loader for LocalFileLoader {
    fn source(&self) -> String { self.src.display().to_string() }

    fn open(&mut self) -> Result<()> {
        if !self.src.is_file() {
            let err = std::io::Error::new(std::io::ErrorKind::NotFound, "not a readable file");
            return Err(unavailable(&self.src, err));
        }
        self.opened = true;
        Ok(())
    }

    fn items<'a>(&'a mut self) -> Box<dyn Iterator<Item = LoadedItem> + 'a> {
        if !self.opened {
            return Box::new(std::iter::empty());
        }
        match read_text(&self.src, self.encoding) {
            Ok(text) => Box::new(std::iter::once((self.source(), text))),
            Err(e) => {
                tracing::warn!(source = %self.src.display(), error = %e, "cannot read file");
                Box::new(std::iter::empty())
            }
        }
    }

    fn close(&mut self) { self.opened = false; }
}

/// A file listing one document path per line.
pub struct LocalFilelistLoader {
    src: PathBuf,
    encoding: &'static Encoding,
    reader: Option<BufReader<File>>,
}

impl LocalFilelistLoader {
    pub fn new<P: Into<PathBuf>>(src: P) -> Self {
        Self { src: src.into(), encoding: UTF_8, reader: None }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let loader = Self::new(params.require("src", "LocalFilelistLoader")?);
        Ok(loader.with_encoding(encoding_param(params, true)?))
    }
}

impl Loader for LocalFilelistLoader {
    fn source(&self) -> String { self.src.display().to_string() }

    fn open(&mut self) -> Result<()> { open_lines(&self.src, &mut self.reader) }

    fn items<'a>(&'a mut self) -> Box<dyn Iterator<Item = LoadedItem> + 'a> {
        let encoding = self.encoding;
        Box::new(line_iter(&mut self.reader, &self.src, encoding).filter_map(move |line| {
            let path = line.trim();
            if path.is_empty() {
                return None;
            }
            match read_text(Path::new(path), encoding) {
                Ok(text) => Some((path.to_string(), text)),
                Err(e) => {
                    tracing::warn!(path, error = %e, "skipping listed file");
                    None
                }
            }
        }))
    }

    fn close(&mut self) { self.reader = None; }
}

/// One document per line: `key<TAB>text`.
pub struct LocalKVFileLoader {
    src: PathBuf,
    encoding: &'static Encoding,
    reader: Option<BufReader<File>>,
}

impl LocalKVFileLoader {
    pub fn new<P: Into<PathBuf>>(src: P) -> Self {
        Self { src: src.into(), encoding: UTF_8, reader: None }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let loader = Self::new(params.require("src", "LocalKVFileLoader")?);
        Ok(loader.with_encoding(encoding_param(params, true)?))
    }
}

impl Loader for LocalKVFileLoader {
    fn source(&self) -> String { self.src.display().to_string() }

    fn open(&mut self) -> Result<()> { open_lines(&self.src, &mut self.reader) }

    fn items<'a>(&'a mut self) -> Box<dyn Iterator<Item = LoadedItem> + 'a> {
        Box::new(line_iter(&mut self.reader, &self.src, self.encoding).filter_map(|line| {
            let fields: Vec<&str> = line.trim().split('\t').collect();
            match fields.as_slice() {
                [key, text] => Some((key.to_string(), text.to_string())),
                _ => None,
            }
        }))
    }

    fn close(&mut self) { self.reader = None; }
}

/// Every file below a directory, in sorted path order.
pub struct DirectoryLoader {
    src: PathBuf,
    ext: Option<String>,
    encoding: &'static Encoding,
    opened: bool,
}

impl DirectoryLoader {
    pub fn new<P: Into<PathBuf>>(src: P, ext: Option<String>) -> Self {
        Self { src: src.into(), ext, encoding: UTF_8, opened: false }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        let src = params.require("src", "DirectoryLoader")?;
        let ext = params.get("ext").map(|e| e.trim_start_matches('.').to_string());
        Ok(Self::new(src, ext).with_encoding(encoding_param(params, false)?))
    }
}

impl Loader for DirectoryLoader {
    fn source(&self) -> String { self.src.display().to_string() }

    fn open(&mut self) -> Result<()> {
        fs::read_dir(&self.src).map_err(|e| unavailable(&self.src, e))?;
        self.opened = true;
        Ok(())
    }

    fn items<'a>(&'a mut self) -> Box<dyn Iterator<Item = LoadedItem> + 'a> {
        if !self.opened {
            return Box::new(std::iter::empty());
        }
        let ext = self.ext.as_deref();
        let encoding = self.encoding;
        let walk = WalkDir::new(&self.src).sort_by_file_name().into_iter().filter_map(|e| e.ok());
        Box::new(walk.filter_map(move |entry| {
            let p = entry.path();
            if !p.is_file() {
                return None;
            }
            if let Some(want) = ext {
                if p.extension().and_then(|s| s.to_str()) != Some(want) {
                    return None;
                }
            }
            match read_text(p, encoding) {
                Ok(text) => Some((p.display().to_string(), text)),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "skipping file");
                    None
                }
            }
        }))
    }

    fn close(&mut self) { self.opened = false; }
}

/// Literal text given on the command line; the text is also its uri.
/// Command-line text arrives already decoded, so `encoding` does not apply.
pub struct TextLoader {
    text: String,
}

impl TextLoader {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        Ok(Self::new(params.require("txt", "TextLoader")?))
    }
}

impl Loader for TextLoader {
    fn source(&self) -> String { "<text>".to_string() }

    fn open(&mut self) -> Result<()> { Ok(()) }

    fn items<'a>(&'a mut self) -> Box<dyn Iterator<Item = LoadedItem> + 'a> {
        Box::new(std::iter::once((self.text.clone(), self.text.clone())))
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn kv_loader_skips_bad_lines() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("docs.tsv");
        fs::write(&src, "a\tcat dog\nno tab here\nb\tdog bird\nc\tx\ty\n").unwrap();
        let mut loader = LocalKVFileLoader::new(&src);
        loader.open().unwrap();
        let items: Vec<_> = loader.items().collect();
        loader.close();
        let expected = vec![
            ("a".to_string(), "cat dog".to_string()),
            ("b".to_string(), "dog bird".to_string()),
        ];
        assert_eq!(items, expected);
    }

    #[test]
    fn missing_source_is_unavailable_and_empty() {
        let mut loader = LocalFilelistLoader::new("/definitely/not/here.lst");
        assert!(matches!(loader.open(), Err(WvError::SourceUnavailable { .. })));
        assert_eq!(loader.items().count(), 0);
    }

    #[test]
    fn filelist_skips_missing_entries() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("one.txt");
        fs::write(&doc, "hello").unwrap();
        let list = dir.path().join("list.txt");
        fs::write(&list, format!("{}\n\n/nope/missing.txt\n", doc.display())).unwrap();
        let mut loader = LocalFilelistLoader::new(&list);
        loader.open().unwrap();
        let items: Vec<_> = loader.items().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].1, "hello");
    }

    const GBK_ZHONGWEN: &[u8] = &[0xD6, 0xD0, 0xCE, 0xC4];

    fn gbk_params(src: &Path) -> Params {
        Params::parse(&format!("src={}&encoding=gbk", src.display())).unwrap()
    }

    #[test]
    fn file_loader_decodes_configured_encoding() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("doc.txt");
        fs::write(&src, GBK_ZHONGWEN).unwrap();

        let mut loader = LocalFileLoader::from_params(&gbk_params(&src)).unwrap();
        loader.open().unwrap();
        let items: Vec<_> = loader.items().collect();
        assert_eq!(items[0].1, "中文");

        let mut utf8 = LocalFileLoader::new(&src);
        utf8.open().unwrap();
        let text = utf8.items().next().unwrap().1;
        assert!(text.contains('\u{FFFD}'), "undecodable bytes must not vanish: {text:?}");
    }

    #[test]
    fn kv_loader_decodes_each_line() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("docs.tsv");
        let mut bytes = b"k1\t".to_vec();
        bytes.extend_from_slice(GBK_ZHONGWEN);
        bytes.extend_from_slice(b"\r\nk2\tplain\n");
        fs::write(&src, bytes).unwrap();

        let mut loader = LocalKVFileLoader::from_params(&gbk_params(&src)).unwrap();
        loader.open().unwrap();
        let items: Vec<_> = loader.items().collect();
        assert_eq!(items, vec![
            ("k1".to_string(), "中文".to_string()),
            ("k2".to_string(), "plain".to_string()),
        ]);
    }

    #[test]
    fn unknown_encoding_is_config_error() {
        let params = Params::parse("src=whatever&encoding=no-such-charset").unwrap();
        assert!(matches!(LocalFileLoader::from_params(&params), Err(WvError::Configuration(_))));
        let params = Params::parse("src=whatever&encoding=utf-16le").unwrap();
        assert!(matches!(LocalKVFileLoader::from_params(&params), Err(WvError::Configuration(_))));
    }

    #[test]
    fn directory_loader_filters_by_extension_in_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.txt"), "first").unwrap();
        fs::write(dir.path().join("c.md"), "ignored").unwrap();
        let mut loader = DirectoryLoader::new(dir.path(), Some("txt".into()));
        loader.open().unwrap();
        let texts: Vec<String> = loader.items().map(|(_, t)| t).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
