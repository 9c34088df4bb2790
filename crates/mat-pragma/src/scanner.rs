//! Chunked, resumable region extraction from the file currently on disk.
//!
//! The scanner reads the old file in fixed-size chunks and keeps only the
//! partial line being assembled plus the body of the region being collected,
//! so memory stays bounded regardless of file size. Each successful lookup
//! records the offset just past the end marker it found; the next lookup
//! starts there. Every start marker passed on the way is remembered, so a
//! name whose first occurrence lies above the resume offset is looked up
//! from that occurrence instead of a later duplicate. Generated files list
//! regions in a stable order, so a full merge usually reads the old file
//! exactly once.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::{Error, MarkerKind, Pragma, Result};

/// Default read size for region scans.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A region body located in the old file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMatch {
    /// Raw bytes between the start and end marker lines, terminators
    /// included. Not trimmed, so an unchanged region round-trips
    /// byte-identically.
    pub body: Vec<u8>,
    /// Byte offset immediately after the end marker line.
    pub offset: u64,
}

/// Resumable region lookups over a seekable source.
pub struct RegionScanner<'p, R> {
    source: R,
    path: PathBuf,
    pragma: &'p Pragma,
    chunk_size: usize,
    resume_at: u64,
    /// Lowest offset of each start marker seen so far, by region name
    starts: HashMap<String, u64>,
    /// Length of the prefix of the source every line of which was parsed
    scanned: u64,
}

impl<'p> RegionScanner<'p, File> {
    /// Open the file at `path`. Returns `Ok(None)` if it does not exist.
    pub fn open(path: &Path, pragma: &'p Pragma, chunk_size: usize) -> Result<Option<Self>> {
        match File::open(path) {
            Ok(file) => Ok(Some(Self::new(file, path, pragma, chunk_size))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }
}

impl<'p, R: Read + Seek> RegionScanner<'p, R> {
    pub fn new(source: R, path: impl Into<PathBuf>, pragma: &'p Pragma, chunk_size: usize) -> Self {
        Self {
            source,
            path: path.into(),
            pragma,
            chunk_size: chunk_size.max(1),
            resume_at: 0,
            starts: HashMap::new(),
            scanned: 0,
        }
    }

    /// Offset the next lookup starts from.
    pub fn resume_offset(&self) -> u64 {
        self.resume_at
    }

    /// Find the body stored under the first occurrence of `name`.
    ///
    /// Scans from the earliest known start marker for `name` if one lies
    /// above the resume offset, otherwise from the resume offset; the part
    /// above it is rescanned only if it was never fully read. Returns
    /// `Ok(None)` when no complete region with that name exists.
    pub fn find(&mut self, name: &str) -> Result<Option<RegionMatch>> {
        let resume_at = self.resume_at;
        let from = match self.starts.get(name) {
            Some(&offset) if offset < resume_at => offset,
            _ if self.scanned >= resume_at => resume_at,
            _ => 0,
        };

        let found = self.scan(name, from)?;
        if let Some(found) = &found {
            self.resume_at = found.offset;
        }
        Ok(found)
    }

    /// Scan from `start` for the first region named `name`, recording every
    /// start marker passed.
    fn scan(&mut self, name: &str, start: u64) -> Result<Option<RegionMatch>> {
        self.source
            .seek(SeekFrom::Start(start))
            .map_err(|e| Error::io(&self.path, e))?;

        let mut lines = ChunkedLines::new(&mut self.source, start, self.chunk_size);
        let mut body: Option<Vec<u8>> = None;
        let mut reached = start;

        let found = loop {
            let next = lines.next_line().map_err(|e| Error::io(&self.path, e))?;
            let Some((line_offset, line)) = next else {
                // EOF with the start marker seen but no end marker: a miss.
                break None;
            };
            reached = line_offset + line.len() as u64;

            let marker = self.pragma.parse_bytes(&line);
            if let Some(m) = &marker
                && m.kind == MarkerKind::Start
            {
                let first = self.starts.entry(m.name.to_string()).or_insert(line_offset);
                *first = (*first).min(line_offset);
            }

            match body.as_mut() {
                None => {
                    if marker.is_some_and(|m| m.is_start_of(name)) {
                        body = Some(Vec::new());
                    }
                }
                Some(collected) => {
                    if marker.is_some_and(|m| m.is_end_of(name)) {
                        break Some(RegionMatch {
                            body: std::mem::take(collected),
                            offset: reached,
                        });
                    }
                    collected.extend_from_slice(&line);
                }
            }
        };

        if start <= self.scanned {
            self.scanned = self.scanned.max(reached);
        }
        Ok(found)
    }
}

/// Line splitter over a reader, refilled one chunk at a time.
struct ChunkedLines<'r, R> {
    reader: &'r mut R,
    chunk: Vec<u8>,
    buf: Vec<u8>,
    /// Absolute offset of `buf[0]`.
    base: u64,
    /// Start of the next unread line within `buf`.
    cursor: usize,
    /// Bytes after `cursor` already searched for a newline.
    searched: usize,
    eof: bool,
}

impl<'r, R: Read> ChunkedLines<'r, R> {
    fn new(reader: &'r mut R, base: u64, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk: vec![0; chunk_size],
            buf: Vec::new(),
            base,
            cursor: 0,
            searched: 0,
            eof: false,
        }
    }

    /// Next line with its absolute offset, terminator included.
    fn next_line(&mut self) -> std::io::Result<Option<(u64, Vec<u8>)>> {
        loop {
            let from = self.cursor + self.searched;
            if let Some(rel) = self.buf[from..].iter().position(|&b| b == b'\n') {
                let end = from + rel + 1;
                return Ok(Some(self.take_line(end)));
            }
            self.searched = self.buf.len() - self.cursor;

            if self.eof {
                if self.cursor == self.buf.len() {
                    return Ok(None);
                }
                let end = self.buf.len();
                return Ok(Some(self.take_line(end)));
            }

            self.buf.drain(..self.cursor);
            self.base += self.cursor as u64;
            self.cursor = 0;

            let read = self.reader.read(&mut self.chunk)?;
            if read == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&self.chunk[..read]);
            }
        }
    }

    fn take_line(&mut self, end: usize) -> (u64, Vec<u8>) {
        let line = self.buf[self.cursor..end].to_vec();
        let offset = self.base + self.cursor as u64;
        self.cursor = end;
        self.searched = 0;
        (offset, line)
    }
}
