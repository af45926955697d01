//! Goroutine states and the folded group with its stable fingerprint.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{StackFrame, StackTrace};

/// Classified scheduling state of a goroutine.
///
/// Many raw header tokens fold into `Waiting`; see the parser for the
/// classification table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GoroutineState {
    Running,
    Runnable,
    Blocked,
    Waiting,
    Syscall,
    Dead,
    Copystack,
    Preempted,
}

impl GoroutineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoroutineState::Running => "running",
            GoroutineState::Runnable => "runnable",
            GoroutineState::Blocked => "blocked",
            GoroutineState::Waiting => "waiting",
            GoroutineState::Syscall => "syscall",
            GoroutineState::Dead => "dead",
            GoroutineState::Copystack => "copystack",
            GoroutineState::Preempted => "preempted",
        }
    }
}

impl fmt::Display for GoroutineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque group identity: the first 16 hex characters of the fingerprint
/// hash. Stable across snapshots for the same (state, trace) pair.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// All goroutines of one snapshot that share a state and a normalized stack.
///
/// `count` is how many goroutines folded into the group; `wait_durations`
/// collects the raw header durations (at most one per folded goroutine);
/// `created_by` is the spawning frame of the first goroutine seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub state: GoroutineState,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_durations: Vec<String>,
    pub trace: StackTrace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<StackFrame>,
}

impl Group {
    /// Build a single-goroutine group; folding happens in
    /// [`crate::Snapshot::add_goroutine`].
    pub fn new(
        state: GoroutineState,
        trace: StackTrace,
        wait_duration: Option<String>,
        created_by: Option<StackFrame>,
    ) -> Self {
        let id = Group::fingerprint(state, &trace);
        Self {
            id,
            state,
            count: 1,
            wait_durations: wait_duration.into_iter().collect(),
            trace,
            created_by,
        }
    }

    /// Computes the identity of a (state, trace) pair:
    /// `hex(sha256(state ∥ "\n" ∥ normalized trace))` truncated to 16 hex
    /// characters. Truncation can in principle collide; colliding groups
    /// merge visibly but never corrupt a snapshot.
    pub fn fingerprint(state: GoroutineState, trace: &StackTrace) -> GroupId {
        let mut hasher = Sha256::new();
        hasher.update(state.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(strip_addresses(&trace.canonical()).as_bytes());
        let digest = hasher.finalize();

        // 8 bytes render as the 16 hex characters the store keys on.
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        GroupId(hex)
    }

    /// The innermost function name, or an empty string for a frame-less
    /// group (which snapshots never store).
    pub fn leaf_func(&self) -> &str {
        self.trace.leaf().map(|f| f.func.as_str()).unwrap_or("")
    }
}

static ARG_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((0x[0-9a-fA-F]+(?:,\s*0x[0-9a-fA-F]+)*(?:,\s*[^)]+)*)\)")
        .expect("valid regex")
});
static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("valid regex"));

/// Replaces pointer-valued argument lists with `(...)` and any remaining
/// standalone hex value with `0x?`, so re-sampled stacks hash identically.
/// Applied to fingerprint input only; stored frames keep their raw tokens.
fn strip_addresses(s: &str) -> String {
    let s = ARG_LIST_RE.replace_all(s, "(...)");
    HEX_RE.replace_all(&s, "0x?").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(funcs: &[&str]) -> StackTrace {
        StackTrace::from(
            funcs
                .iter()
                .map(|f| StackFrame::new(*f, "/app/main.go", 10))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let t = trace(&["main.worker", "main.main"]);
        let a = Group::fingerprint(GoroutineState::Blocked, &t);
        let b = Group::fingerprint(GoroutineState::Blocked, &t);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn fingerprint_depends_on_state() {
        let t = trace(&["main.worker"]);
        let blocked = Group::fingerprint(GoroutineState::Blocked, &t);
        let waiting = Group::fingerprint(GoroutineState::Waiting, &t);
        assert_ne!(blocked, waiting);
    }

    #[test]
    fn fingerprint_depends_on_trace() {
        let a = Group::fingerprint(GoroutineState::Running, &trace(&["main.a"]));
        let b = Group::fingerprint(GoroutineState::Running, &trace(&["main.b"]));
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_ignores_hex_addresses() {
        let with_addr = StackTrace::from(vec![StackFrame::new(
            "main.handler",
            "/app/main.go+0x20",
            10,
        )]);
        let with_other_addr = StackTrace::from(vec![StackFrame::new(
            "main.handler",
            "/app/main.go+0xdeadbeef",
            10,
        )]);
        assert_eq!(
            Group::fingerprint(GoroutineState::Running, &with_addr),
            Group::fingerprint(GoroutineState::Running, &with_other_addr),
        );
    }

    #[test]
    fn strip_addresses_rewrites_argument_lists() {
        assert_eq!(
            strip_addresses("function(0x123abc, 0xdeadbeef)"),
            "function(...)"
        );
        assert_eq!(strip_addresses("field: 0x123456"), "field: 0x?");
        assert_eq!(strip_addresses("no addresses here"), "no addresses here");
    }

    #[test]
    fn group_new_computes_id_and_count() {
        let g = Group::new(
            GoroutineState::Running,
            trace(&["main.main"]),
            Some("5 minutes".to_string()),
            None,
        );
        assert_eq!(g.count, 1);
        assert_eq!(g.wait_durations, vec!["5 minutes"]);
        assert_eq!(g.id, Group::fingerprint(GoroutineState::Running, &g.trace));
        assert_eq!(g.leaf_func(), "main.main");
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&GoroutineState::Blocked).unwrap();
        assert_eq!(json, r#""blocked""#);
    }
}
