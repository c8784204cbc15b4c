use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use traj_core::error::{TrajError, TrajResult};

/// Line source that remembers where it is for error messages.
pub struct LineReader {
    inner: Box<dyn BufRead>,
    label: String,
    line_no: usize,
    buf: String,
}

impl LineReader {
    pub fn open(path: &Path) -> TrajResult<Self> {
        let file = File::open(path).map_err(|err| {
            log::warn!("cannot open {}: {err}", path.display());
            TrajError::Io(err)
        })?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
        ))
    }

    pub fn from_reader(label: impl Into<String>, reader: impl BufRead + 'static) -> Self {
        Self {
            inner: Box::new(reader),
            label: label.into(),
            line_no: 0,
            buf: String::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Next line without its terminator, or `None` at end of input.
    pub fn next_line(&mut self) -> TrajResult<Option<String>> {
        self.buf.clear();
        let read = self.inner.read_line(&mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(self.buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    /// Next line that is not blank.
    pub fn next_nonblank(&mut self) -> TrajResult<Option<String>> {
        while let Some(line) = self.next_line()? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Like `next_line`, but end of input is a parse error naming `what`.
    pub fn require_line(&mut self, what: &str) -> TrajResult<String> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => Err(self.error(format!("unexpected end of file, expected {what}"))),
        }
    }

    pub fn error(&self, msg: impl std::fmt::Display) -> TrajError {
        TrajError::parse_at(&self.label, self.line_no, msg)
    }
}
