use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// A stack trace with frames ordered from the oldest call to the most recent one
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

impl Stacktrace {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames most recent first, handy when looking for the crash site
    pub fn frames_newest_first(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().rev()
    }
}

/// A single stack frame
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(rename = "filename", skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    #[serde(rename = "lineno", skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(rename = "colno", skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub in_app: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_context: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_context: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<String>,
}

impl Frame {
    /// File name used for frames without source location
    pub const INTERNAL_FRAME_FILENAME: &'static str = "[internal]";

    pub fn new(function: Option<String>, file: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            function,
            file: Some(file.into()),
            line,
            ..Default::default()
        }
    }

    pub fn is_internal(&self) -> bool {
        self.file.as_deref() == Some(Self::INTERNAL_FRAME_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serializes_protocol_names() {
        let mut frame = Frame::new(Some("app::run".into()), "src/main.rs", Some(12));
        frame.in_app = true;

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["function"], "app::run");
        assert_eq!(json["filename"], "src/main.rs");
        assert_eq!(json["lineno"], 12);
        assert_eq!(json["in_app"], true);
        assert!(json.get("pre_context").is_none());
        assert!(json.get("vars").is_none());
    }
}
