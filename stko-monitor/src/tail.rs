//! Incremental reader for files another process is appending to

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// One complete (newline terminated) line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    /// 1-based line number in the file
    pub number: usize,
    end: u64,
}

#[derive(Debug, Default)]
pub struct Pending {
    /// The file got shorter than what was already consumed
    pub truncated: bool,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone)]
pub struct Tail {
    path: PathBuf,
    offset: u64,
    consumed_lines: usize,
}

impl Tail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            consumed_lines: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path.display().to_string()
    }

    /// Complete lines written since the last consumed one. `None` when the
    /// file does not exist (yet). A trailing line without newline is left
    /// for a later read.
    pub fn read(&mut self) -> io::Result<Option<Pending>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let len = file.metadata()?.len();
        let truncated = len < self.offset;
        if truncated {
            tracing::debug!("{} shrank below offset {}, rereading", self.path.display(), self.offset);
            self.offset = 0;
            self.consumed_lines = 0;
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let mut lines = Vec::new();
        let mut start = 0;
        for (i, byte) in buf.iter().enumerate() {
            if *byte != b'\n' {
                continue;
            }
            let text = String::from_utf8_lossy(&buf[start..i]);
            lines.push(Line {
                text: text.trim_end_matches('\r').to_string(),
                number: self.consumed_lines + lines.len() + 1,
                end: self.offset + i as u64 + 1,
            });
            start = i + 1;
        }

        Ok(Some(Pending { truncated, lines }))
    }

    /// Mark every line up to and including `line` as read.
    pub fn consume(&mut self, line: &Line) {
        self.offset = line.end;
        self.consumed_lines = line.number;
    }
}
