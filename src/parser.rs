//! Parser for goroutine dumps in the `debug=2` pprof text format.
//!
//! A record starts with a `goroutine <N> [<state>(, <M> minutes)?]:` header,
//! followed by pairs of call line + indented `file:line`, an optional
//! `created by` pair, and ends at a blank line or EOF. Goroutines sharing a
//! (state, normalized trace) fingerprint fold into one group.
//!
//! Malformed lines are skipped individually; a dump yielding zero goroutines
//! parses into a valid empty snapshot. Only reader I/O errors fail the parse.

use std::io::{self, BufRead};
use std::sync::LazyLock;

use regex::Regex;

use goru_types::{GoroutineState, Snapshot, StackFrame, StackTrace};

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^goroutine (\d+) \[([\w\s.,]+?)(?:, (\d+ minutes?))?\]:$").expect("valid regex")
});
static FILE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(.+?):(\d+)(?:\s|$)").expect("valid regex"));
static CREATED_BY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^created by (.+)$").expect("valid regex"));
static FUNC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^(]+(?:\(\*[^)]+\))?[^(]*)(?:\(|$)").expect("valid regex")
});

/// One goroutine record being accumulated while its lines stream past.
struct PendingGoroutine {
    state: GoroutineState,
    wait_duration: Option<String>,
    stack: Vec<StackFrame>,
    created_by: Option<StackFrame>,
}

impl PendingGoroutine {
    fn flush_into(self, snapshot: &mut Snapshot) {
        if !self.stack.is_empty() {
            snapshot.add_goroutine(
                self.state,
                StackTrace::from(self.stack),
                self.wait_duration,
                self.created_by,
            );
        }
    }
}

/// Parse a goroutine dump into a snapshot for `host`.
pub fn parse<R: BufRead>(reader: R, host: &str) -> io::Result<Snapshot> {
    let mut snapshot = Snapshot::new(host);
    let mut lines = reader.lines();
    let mut current: Option<PendingGoroutine> = None;

    while let Some(line) = lines.next() {
        let line = line?;

        if let Some(caps) = HEADER_RE.captures(&line) {
            if let Some(previous) = current.take() {
                previous.flush_into(&mut snapshot);
            }
            current = Some(PendingGoroutine {
                state: classify_state(&caps[2]),
                wait_duration: caps.get(3).map(|m| m.as_str().to_string()),
                stack: Vec::new(),
                created_by: None,
            });
            continue;
        }

        let Some(goroutine) = current.as_mut() else {
            continue;
        };

        // A blank line terminates the record.
        if line.is_empty() {
            if let Some(finished) = current.take() {
                finished.flush_into(&mut snapshot);
            }
            continue;
        }

        if let Some(caps) = CREATED_BY_RE.captures(&line) {
            let mut func = caps[1].to_string();
            if let Some(idx) = func.find(" in goroutine ") {
                func.truncate(idx);
            }

            // Pair with the next line; ignore the spawner if it is not an
            // indented file:line (best-effort on malformed input).
            if let Some(next) = lines.next() {
                let next = next?;
                if let Some(loc) = FILE_LINE_RE.captures(&next) {
                    goroutine.created_by = Some(StackFrame::new(
                        extract_function_name(&func),
                        &loc[1],
                        loc[2].parse().unwrap_or(0),
                    ));
                }
            }
            continue;
        }

        // Stray indented location line (its call line was never consumed).
        if FILE_LINE_RE.is_match(&line) {
            continue;
        }

        // Unindented lines are call lines; pair each with its location.
        if !line.starts_with('\t') && !line.starts_with(' ') {
            if let Some(next) = lines.next() {
                let next = next?;
                if let Some(loc) = FILE_LINE_RE.captures(&next) {
                    goroutine.stack.push(StackFrame::new(
                        extract_function_name(&line),
                        &loc[1],
                        loc[2].parse().unwrap_or(0),
                    ));
                }
            }
        }
    }

    // A dump without a trailing blank line still keeps its last record.
    if let Some(last) = current.take() {
        last.flush_into(&mut snapshot);
    }

    Ok(snapshot)
}

/// Parse an in-memory dump body.
pub fn parse_bytes(data: &[u8], host: &str) -> io::Result<Snapshot> {
    parse(data, host)
}

/// Map a raw header state token onto the classified state.
fn classify_state(raw: &str) -> GoroutineState {
    let token = raw.trim().split(',').next().unwrap_or("").trim();

    match token {
        "running" => GoroutineState::Running,
        "runnable" => GoroutineState::Runnable,
        "syscall" => GoroutineState::Syscall,
        "chan receive" | "chan send" | "select" => GoroutineState::Blocked,
        "IO wait" | "semacquire" | "sync.Cond.Wait" => GoroutineState::Waiting,
        // Everything else ("sleep", "finalizer wait", ...) is waiting.
        _ => GoroutineState::Waiting,
    }
}

/// Extract the function name from a call line, keeping pointer-receiver
/// parenthesization (`pkg.(*T).Method`) but dropping the argument list.
/// Handles truncated lines without a closing parenthesis.
fn extract_function_name(line: &str) -> String {
    let line = line.trim();

    if let Some(caps) = FUNC_RE.captures(line) {
        if let Some(m) = caps.get(1) {
            return m.as_str().trim().to_string();
        }
    }

    match line.find('(') {
        Some(idx) if idx > 0 => line[..idx].trim().to_string(),
        _ => line.to_string(),
    }
}
