//! JSONL outcome output.

use anyhow::Context;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use upsert_engine::{Outcome, OutcomeSink};

/// Open the outcome destination; `None` or `-` writes to standard output.
pub fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write + Send>> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Writes each Outcome as one JSON line.
///
/// [`OutcomeSink::emit`] cannot fail, so the first write error is kept and
/// returned by [`finish`](Self::finish); later Outcomes are dropped.
pub struct JsonlOutcomeWriter<W: Write> {
    writer: W,
    written: u64,
    error: Option<io::Error>,
}

impl<W: Write> JsonlOutcomeWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            error: None,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn write(&mut self, outcome: &Outcome) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, outcome)?;
        self.writer.write_all(b"\n")
    }

    /// Flush and return the writer, or the first write error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> OutcomeSink for JsonlOutcomeWriter<W> {
    fn emit(&mut self, outcome: Outcome) {
        if self.error.is_some() {
            return;
        }
        match self.write(&outcome) {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use upsert_engine::{InputError, RecordError};

    #[test]
    fn test_one_line_per_outcome() {
        let mut writer = JsonlOutcomeWriter::new(Vec::new());
        writer.emit(Outcome::success(0, "Record inserted", json!({"affected_rows": 1})));
        writer.emit(Outcome::failed(
            1,
            &RecordError::Input(InputError::Malformed("expected value".into())),
        ));
        assert_eq!(writer.written(), 2);

        let bytes = writer.finish().unwrap();
        let lines: Vec<Value> = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "success");
        assert_eq!(lines[0]["payload"]["affected_rows"], 1);
        assert_eq!(lines[1]["status_code"], 400);
        assert_eq!(lines[1]["index"], 1);
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_error_reported_on_finish() {
        let mut writer = JsonlOutcomeWriter::new(Broken);
        writer.emit(Outcome::success(0, "Record inserted", Value::Null));
        writer.emit(Outcome::success(1, "Record inserted", Value::Null));
        assert_eq!(writer.written(), 0);
        let err = writer.finish().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
