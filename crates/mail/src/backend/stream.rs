//! Server-sent event framing for the sync stream

use std::io::BufRead;

use anyhow::{Context, Result};

/// Iterator over the `data` payloads of an event stream
///
/// Multi-line payloads are joined with `\n`. Other fields and comment
/// lines are ignored. A payload still buffered when the reader hits EOF
/// is yielded before the iterator ends.
pub struct EventStreamLines<R> {
    reader: R,
    line: String,
    data: Vec<String>,
    done: bool,
}

impl<R: BufRead> EventStreamLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            data: Vec::new(),
            done: false,
        }
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

impl<R: BufRead> Iterator for EventStreamLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .context("Failed to read sync stream");

            match read {
                Ok(0) => {
                    self.done = true;
                    return self.take_event().map(Ok);
                }
                Ok(_) => {
                    let line = self.line.trim_end_matches(['\r', '\n']);
                    if line.is_empty() {
                        match self.take_event() {
                            Some(event) => return Some(Ok(event)),
                            None => continue,
                        }
                    }
                    if line.starts_with(':') {
                        continue;
                    }

                    let (field, value) = match line.split_once(':') {
                        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                        None => (line, ""),
                    };
                    if field == "data" {
                        self.data.push(value.to_string());
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
