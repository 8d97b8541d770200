//! Bounded-memory sort of `(token_id, doc_id)` events.
//!
//! Events are buffered up to a fixed count, sorted, deduplicated and spilled
//! to bincode run files. Runs are merged `fan_in` at a time until a single
//! k-way merge can stream the final order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, WvError};
use crate::persist::TaskPaths;
use crate::{DocId, TokenId};

pub type Event = (TokenId, DocId);

pub struct ExternalSorter<'p> {
    paths: &'p TaskPaths,
    buffer: Vec<Event>,
    capacity: usize,
    fan_in: usize,
    runs: Vec<PathBuf>,
}

impl<'p> ExternalSorter<'p> {
    pub fn new(paths: &'p TaskPaths, capacity: usize, fan_in: usize) -> Self {
        Self { paths, buffer: Vec::new(), capacity: capacity.max(1), fan_in: fan_in.max(2), runs: Vec::new() }
    }

    pub fn push(&mut self, event: Event) -> Result<()> {
        self.buffer.push(event);
        if self.buffer.len() >= self.capacity {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        self.buffer.sort_unstable();
        self.buffer.dedup();
        let path = self.paths.sort_run(0, self.runs.len());
        let mut w = BufWriter::new(File::create(&path)?);
        for event in &self.buffer {
            bincode::serialize_into(&mut w, event)?;
        }
        w.flush()?;
        tracing::debug!(run = %path.display(), events = self.buffer.len(), "spilled sorted run");
        self.buffer.clear();
        self.runs.push(path);
        Ok(())
    }

    /// Completes the sort and streams events in `(token_id, doc_id)` order
    /// with duplicates removed.
    pub fn finish(mut self) -> Result<SortedEvents> {
        if self.runs.is_empty() {
            let mut events = std::mem::take(&mut self.buffer);
            events.sort_unstable();
            events.dedup();
            return Ok(SortedEvents::Memory(events.into_iter()));
        }
        if !self.buffer.is_empty() {
            self.spill()?;
        }
        let mut runs = std::mem::take(&mut self.runs);
        let mut pass = 1;
        while runs.len() > self.fan_in {
            let mut next = Vec::with_capacity(runs.len().div_ceil(self.fan_in));
            for group in runs.chunks(self.fan_in) {
                let path = self.paths.sort_run(pass, next.len());
                let mut w = BufWriter::new(File::create(&path)?);
                for event in RunMerge::new(group.to_vec(), false)? {
                    bincode::serialize_into(&mut w, &event?)?;
                }
                w.flush()?;
                next.push(path);
            }
            tracing::debug!(pass, runs_in = runs.len(), runs_out = next.len(), "merge pass");
            for old in &runs {
                let _ = fs::remove_file(old);
            }
            runs = next;
            pass += 1;
        }
        Ok(SortedEvents::Merged(RunMerge::new(runs, true)?))
    }
}

struct RunReader {
    path: PathBuf,
    reader: BufReader<File>,
    records: usize,
}

impl RunReader {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self { path: path.to_path_buf(), reader: BufReader::new(File::open(path)?), records: 0 })
    }

    /// `None` only at a record boundary; a run cut short inside a record is
    /// an error.
    fn next_event(&mut self) -> Result<Option<Event>> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        match bincode::deserialize_from::<_, Event>(&mut self.reader) {
            Ok(event) => {
                self.records += 1;
                Ok(Some(event))
            }
            Err(e) => {
                if let bincode::ErrorKind::Io(io) = e.as_ref() {
                    if io.kind() == ErrorKind::UnexpectedEof {
                        return Err(WvError::malformed(
                            &self.path,
                            self.records + 1,
                            "sort run ends inside a record",
                        ));
                    }
                }
                Err(e.into())
            }
        }
    }
}

/// K-way merge over sorted run files, dropping duplicates across runs.
pub struct RunMerge {
    paths: Vec<PathBuf>,
    readers: Vec<RunReader>,
    heap: BinaryHeap<Reverse<(Event, usize)>>,
    last: Option<Event>,
    remove_on_drop: bool,
}

impl RunMerge {
    fn new(paths: Vec<PathBuf>, remove_on_drop: bool) -> Result<Self> {
        let mut readers = Vec::with_capacity(paths.len());
        let mut heap = BinaryHeap::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            let mut reader = RunReader::open(path)?;
            if let Some(event) = reader.next_event()? {
                heap.push(Reverse((event, i)));
            }
            readers.push(reader);
        }
        Ok(Self { paths, readers, heap, last: None, remove_on_drop })
    }
}

impl Iterator for RunMerge {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Reverse((event, src)) = self.heap.pop()?;
            match self.readers[src].next_event() {
                Ok(Some(next)) => self.heap.push(Reverse((next, src))),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
            if self.last == Some(event) {
                continue;
            }
            self.last = Some(event);
            return Some(Ok(event));
        }
    }
}

impl Drop for RunMerge {
    fn drop(&mut self) {
        if self.remove_on_drop {
            for path in &self.paths {
                let _ = fs::remove_file(path);
            }
        }
    }
}

pub enum SortedEvents {
    Memory(std::vec::IntoIter<Event>),
    Merged(RunMerge),
}

impl Iterator for SortedEvents {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SortedEvents::Memory(it) => it.next().map(Ok),
            SortedEvents::Merged(merge) => merge.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sorted(paths: &TaskPaths, events: &[Event], capacity: usize, fan_in: usize) -> Vec<Event> {
        let mut sorter = ExternalSorter::new(paths, capacity, fan_in);
        for e in events {
            sorter.push(*e).unwrap();
        }
        sorter.finish().unwrap().collect::<Result<Vec<_>>>().unwrap()
    }

    fn scrambled() -> Vec<Event> {
        let mut events = Vec::new();
        for i in 0..200u32 {
            events.push(((i * 37) % 11, (i * 13) % 17));
        }
        events
    }

    #[test]
    fn in_memory_sort_dedups() {
        let dir = tempdir().unwrap();
        let paths = TaskPaths::new(dir.path(), "sort");
        let out = sorted(&paths, &[(2, 1), (0, 3), (2, 1), (0, 1)], 100, 4);
        assert_eq!(out, vec![(0, 1), (0, 3), (2, 1)]);
    }

    #[test]
    fn multi_pass_merge_matches_in_memory_order() {
        let events = scrambled();
        let mut expected = events.clone();
        expected.sort_unstable();
        expected.dedup();

        let dir = tempdir().unwrap();
        let paths = TaskPaths::new(dir.path(), "sort");
        let out = sorted(&paths, &events, 7, 3);
        assert_eq!(out, expected);
        let leftovers = fs::read_dir(&paths.root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".run."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn truncated_run_is_an_error_not_an_early_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cut.run");
        let mut bytes = Vec::new();
        bincode::serialize_into(&mut bytes, &(1u32, 2u32)).unwrap();
        bincode::serialize_into(&mut bytes, &(3u32, 4u32)).unwrap();
        fs::write(&path, &bytes).unwrap();

        let mut whole = RunReader::open(&path).unwrap();
        assert_eq!(whole.next_event().unwrap(), Some((1, 2)));
        assert_eq!(whole.next_event().unwrap(), Some((3, 4)));
        assert_eq!(whole.next_event().unwrap(), None);

        bytes.extend_from_slice(&[0xAB, 0xCD, 0xEF]);
        fs::write(&path, &bytes).unwrap();
        let mut cut = RunReader::open(&path).unwrap();
        assert_eq!(cut.next_event().unwrap(), Some((1, 2)));
        assert_eq!(cut.next_event().unwrap(), Some((3, 4)));
        match cut.next_event() {
            Err(WvError::MalformedRecord { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected a malformed record, got {other:?}"),
        }
    }
}
