//! JSONL record input.

use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use upsert_engine::Record;

/// Open `path` for reading; `-` reads standard input.
pub fn open_input(path: &Path) -> anyhow::Result<Box<dyn BufRead + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Records from a JSONL stream, one per non-blank line.
///
/// Lines are handed over as raw bytes so malformed JSON (or invalid UTF-8)
/// becomes an Input error on that record. A read error yields one unreadable
/// record and ends the stream.
pub struct JsonlRecords<R> {
    reader: R,
    line: u64,
    done: bool,
}

impl<R: BufRead> JsonlRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            done: false,
        }
    }

    /// Lines consumed so far, blank lines included.
    pub fn lines_read(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> Iterator for JsonlRecords<R> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while !self.done {
            let mut buf = Vec::new();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    if buf.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(Record::from_bytes(buf));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Record::unreadable(format!(
                        "Failed to read input after line {}: {e}",
                        self.line
                    )));
                }
            }
        }
        None
    }
}
