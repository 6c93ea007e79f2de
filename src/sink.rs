//! Push-based delivery of cumulative stream records.

use std::io::{self, Write};

use crate::record::StreamRecord;

/// Receives every cumulative state change as it happens.
///
/// A write that blocks stalls fragment processing; an error aborts the turn.
pub trait StateSink {
    fn emit(&mut self, record: &StreamRecord) -> io::Result<()>;
}

impl<F> StateSink for F
where
    F: FnMut(&StreamRecord) -> io::Result<()>,
{
    fn emit(&mut self, record: &StreamRecord) -> io::Result<()> {
        self(record)
    }
}

/// Writes each record as one JSON line and flushes immediately.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    records_written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StateSink for JsonLinesSink<W> {
    fn emit(&mut self, record: &StreamRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.records_written += 1;
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StateSink for NullSink {
    fn emit(&mut self, _record: &StreamRecord) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_record() {
        let mut sink = JsonLinesSink::new(Vec::<u8>::new());
        sink.emit(&StreamRecord {
            message: "a\nb".to_string(),
            artifact: String::new(),
        })
        .expect("first record");
        sink.emit(&StreamRecord {
            message: String::new(),
            artifact: "<h1>x</h1>".to_string(),
        })
        .expect("second record");

        assert_eq!(sink.records_written(), 2);
        let output = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(
            output,
            "{\"message\":\"a\\nb\"}\n{\"message\":\"\",\"artifact\":\"<h1>x</h1>\"}\n"
        );
    }

    #[test]
    fn json_lines_sink_surfaces_writer_errors() {
        let mut sink = JsonLinesSink::new(BrokenPipe);
        let error = sink
            .emit(&StreamRecord::default())
            .expect_err("broken pipe should fail");
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(sink.records_written(), 0);
    }
}
