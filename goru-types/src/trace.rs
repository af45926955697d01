//! Stack frames and traces as extracted from a goroutine dump.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single frame of a goroutine stack.
///
/// `file` is empty and `line` is zero when the dump did not carry a source
/// location for the frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackFrame {
    pub func: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(default, skip_serializing_if = "line_is_absent")]
    pub line: u32,
}

fn line_is_absent(line: &u32) -> bool {
    *line == 0
}

impl StackFrame {
    pub fn new(func: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            func: func.into(),
            file: file.into(),
            line,
        }
    }

    /// Returns `file:line`, or an empty string when no location is known.
    pub fn location(&self) -> String {
        if self.file.is_empty() {
            String::new()
        } else {
            format!("{}:{}", self.file, self.line)
        }
    }
}

/// An ordered stack, innermost frame first, matching dump ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackTrace(pub Vec<StackFrame>);

impl StackTrace {
    /// The deterministic textual form used for fingerprinting: one line per
    /// frame, `func` followed by ` file:line` when a location is present.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (i, frame) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&frame.func);
            if !frame.file.is_empty() {
                out.push(' ');
                out.push_str(&frame.file);
                out.push(':');
                out.push_str(&frame.line.to_string());
            }
        }
        out
    }

    /// The innermost frame, if the trace is non-empty.
    pub fn leaf(&self) -> Option<&StackFrame> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StackFrame> {
        self.0.iter()
    }
}

impl From<Vec<StackFrame>> for StackTrace {
    fn from(frames: Vec<StackFrame>) -> Self {
        Self(frames)
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
