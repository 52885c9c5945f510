//! Dot/bracket parameter paths (`items[0].id`).

use std::fmt;

use serde::{Serialize, Serializer};

/// A flattened key path. Segments are joined with `.` when rendered; array
/// indices are attached to their owning segment as `[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterPath {
    segments: Vec<String>,
}

impl ParameterPath {
    /// The empty path (payload root).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a rendered path back into segments.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// Path of an object member below this one.
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Self { segments }
    }

    /// Path of an array element: `[i]` is appended to the last segment.
    pub fn index(&self, i: usize) -> Self {
        let mut segments = self.segments.clone();
        match segments.last_mut() {
            Some(last) => last.push_str(&format!("[{}]", i)),
            None => segments.push(format!("[{}]", i)),
        }
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Final segment with any `[i]` suffixes removed (`items[0]` -> `items`).
    pub fn leaf_name(&self) -> &str {
        let last = self.segments.last().map(String::as_str).unwrap_or("");
        match last.find('[') {
            Some(pos) => &last[..pos],
            None => last,
        }
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl Serialize for ParameterPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
