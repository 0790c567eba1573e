//! Serial line assembly.
//!
//! Devices interleave free-form diagnostic output with protocol lines. A
//! protocol line is marked by a tab: everything after the first tab of a
//! line is protocol text. Text in front of the tab is not dropped; it is
//! kept as the start of the next line.

use crate::error::{Error, Result};

/// Largest pending partial line, in bytes.
pub const MAX_LINE_LEN: usize = 4096;

/// One complete line received from the serial bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialLine {
    /// Protocol text following a tab.
    Status(String),
    /// A line without a tab.
    Diagnostic(String),
}

/// Splits raw serial bytes into lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet part of a complete line.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Append received bytes and return every line they complete, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SerialLine>> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(newline) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(newline + 1);
            let line = std::mem::replace(&mut self.buf, rest);
            let line = trim_line_end(trim_line_start(&line));

            match line.iter().position(|&b| b == b'\t') {
                Some(tab) => {
                    let status = std::str::from_utf8(&line[tab + 1..])
                        .map_err(|e| Error::protocol(format!("status line is not UTF-8: {}", e)))?
                        .to_string();

                    let mut carried = line[..tab].to_vec();
                    carried.extend_from_slice(&self.buf);
                    self.buf = carried;

                    lines.push(SerialLine::Status(status));
                }
                None => lines.push(SerialLine::Diagnostic(
                    String::from_utf8_lossy(line).into_owned(),
                )),
            }
        }

        if self.buf.len() > MAX_LINE_LEN {
            let len = self.buf.len();
            self.buf.clear();
            return Err(Error::protocol(format!(
                "{} bytes received without a line ending",
                len
            )));
        }

        Ok(lines)
    }
}

fn is_line_break(b: &u8) -> bool {
    matches!(b, b'\r' | b'\n')
}

fn trim_line_start(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !is_line_break(b)).unwrap_or(line.len());
    &line[start..]
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line.iter().rposition(|b| !is_line_break(b)).map_or(0, |i| i + 1);
    &line[..end]
}
