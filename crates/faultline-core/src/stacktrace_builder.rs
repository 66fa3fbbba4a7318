//! Conversion of raw call stacks into protocol stacktraces

use std::sync::Arc;

use faultline_types::{Frame, Stacktrace};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::captured_error::CapturedError;
use crate::options::Options;

static HASH_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("valid regex"));

/// Functions belonging to the SDK itself or the unwinder; never reported
const INTERNAL_FUNCTION_PREFIXES: &[&str] = &[
    "faultline_core::",
    "<faultline_core::",
    "faultline_types::",
    "<faultline_types::",
    "backtrace::",
    "<backtrace::",
];

const NON_APP_FUNCTION_PREFIXES: &[&str] = &[
    "std::",
    "<std::",
    "core::",
    "<core::",
    "alloc::",
    "<alloc::",
    "tokio::",
    "<tokio::",
    "__rust",
];

const NON_APP_PATH_MARKERS: &[&str] = &["/.cargo/registry/", "/.cargo/git/", "/rustc/"];

/// One resolved frame as produced by the unwinder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    /// Demangled name without the hash suffix
    pub function: Option<String>,
    /// Mangled symbol name, when it differs from `function`
    pub raw_function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub instruction_addr: Option<String>,
}

/// Capture the current call stack, newest call first
pub fn capture_raw_frames() -> Vec<RawFrame> {
    let backtrace = backtrace::Backtrace::new();
    let mut frames = Vec::new();

    for frame in backtrace.frames() {
        let instruction_addr = Some(format!("{:#x}", frame.ip() as usize));
        let symbols = frame.symbols();
        if symbols.is_empty() {
            frames.push(RawFrame {
                instruction_addr,
                ..RawFrame::default()
            });
            continue;
        }

        // inlined functions resolve to several symbols for the same address
        for symbol in symbols {
            let (function, raw_function) = match symbol.name() {
                Some(name) => {
                    let demangled = format!("{name:#}");
                    let raw = name.as_str().map(str::to_string);
                    let raw = raw.filter(|raw| *raw != demangled);
                    (Some(demangled), raw)
                }
                None => (None, None),
            };
            frames.push(RawFrame {
                function,
                raw_function,
                file: symbol.filename().map(|path| path.display().to_string()),
                line: symbol.lineno(),
                column: symbol.colno(),
                instruction_addr: instruction_addr.clone(),
            });
        }
    }

    frames
}

/// Builds stacktraces according to the in-app and path-prefix options
#[derive(Debug, Clone)]
pub struct StacktraceBuilder {
    options: Arc<Options>,
}

impl StacktraceBuilder {
    pub fn new(options: Arc<Options>) -> Self {
        Self { options }
    }

    /// Stacktrace of the frames recorded when the error was captured
    pub fn build_from_error(&self, error: &CapturedError) -> Stacktrace {
        self.build_from_raw_frames(error.frames())
    }

    /// Stacktrace of the caller, without the SDK's own frames
    pub fn build_current(&self) -> Stacktrace {
        self.build_from_raw_frames(&capture_raw_frames())
    }

    /// Convert newest-first raw frames into an oldest-first stacktrace
    pub fn build_from_raw_frames(&self, raw_frames: &[RawFrame]) -> Stacktrace {
        let frames = raw_frames
            .iter()
            .filter(|raw| !is_internal_function(raw.function.as_deref()))
            .rev()
            .map(|raw| self.build_frame(raw))
            .collect();
        Stacktrace::new(frames)
    }

    fn build_frame(&self, raw: &RawFrame) -> Frame {
        let function = raw.function.as_deref().map(trim_hash_suffix);
        let module = function.as_deref().and_then(module_of);

        let (file, abs_path) = match raw.file.as_deref() {
            Some(path) => {
                let stripped = self.strip_prefixes(path);
                let abs_path = (stripped != path).then(|| path.to_string());
                (Some(stripped.to_string()), abs_path)
            }
            None => (Some(Frame::INTERNAL_FRAME_FILENAME.to_string()), None),
        };

        let in_app = self.is_in_app(function.as_deref(), raw.file.as_deref());

        Frame {
            function,
            raw_function: raw.raw_function.clone(),
            module,
            file,
            abs_path,
            line: raw.line,
            column: raw.column,
            in_app,
            instruction_addr: raw.instruction_addr.clone(),
            ..Frame::default()
        }
    }

    fn strip_prefixes<'a>(&self, path: &'a str) -> &'a str {
        self.options
            .prefixes()
            .iter()
            .find_map(|prefix| path.strip_prefix(prefix.as_str()))
            .map(|stripped| stripped.trim_start_matches(['/', '\\']))
            .unwrap_or(path)
    }

    /// Exclusions win over inclusions; otherwise std and dependency code is not in-app.
    ///
    /// Configured prefixes are matched against the file path and the function path.
    fn is_in_app(&self, function: Option<&str>, path: Option<&str>) -> bool {
        let matches = |prefixes: &[String]| {
            prefixes.iter().any(|prefix| {
                path.is_some_and(|path| path.starts_with(prefix.as_str()))
                    || function.is_some_and(|function| function.starts_with(prefix.as_str()))
            })
        };

        if matches(self.options.in_app_exclude()) {
            return false;
        }
        if matches(self.options.in_app_include()) {
            return true;
        }

        let non_app_function = function.is_some_and(|function| {
            NON_APP_FUNCTION_PREFIXES
                .iter()
                .any(|prefix| function.starts_with(prefix))
        });
        let non_app_path = path.is_some_and(|path| {
            NON_APP_PATH_MARKERS
                .iter()
                .any(|marker| path.contains(marker))
        });

        (function.is_some() || path.is_some()) && !non_app_function && !non_app_path
    }
}

fn is_internal_function(function: Option<&str>) -> bool {
    function.is_some_and(|function| {
        INTERNAL_FUNCTION_PREFIXES
            .iter()
            .any(|prefix| function.starts_with(prefix))
    })
}

fn trim_hash_suffix(function: &str) -> String {
    HASH_SUFFIX.replace(function, "").into_owned()
}

fn module_of(function: &str) -> Option<String> {
    if function.starts_with('<') {
        return None;
    }
    function
        .split('<')
        .next()
        .and_then(|path| path.rsplit_once("::"))
        .map(|(module, _)| module.to_string())
        .filter(|module| !module.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(function: &str, file: &str, line: u32) -> RawFrame {
        RawFrame {
            function: Some(function.to_string()),
            file: Some(file.to_string()),
            line: Some(line),
            ..RawFrame::default()
        }
    }

    fn builder(options: Options) -> StacktraceBuilder {
        StacktraceBuilder::new(Arc::new(options))
    }

    #[test]
    fn frames_are_reversed_and_sdk_frames_dropped() {
        let frames = vec![
            raw("backtrace::capture::Backtrace::new", "/src/backtrace.rs", 1),
            raw("faultline_core::client::Client::capture", "/src/client.rs", 2),
            raw("my_app::handlers::load", "/app/src/handlers.rs", 30),
            raw("my_app::main", "/app/src/main.rs", 10),
        ];
        let stacktrace = builder(Options::default()).build_from_raw_frames(&frames);

        let functions: Vec<_> = stacktrace
            .frames
            .iter()
            .map(|frame| frame.function.as_deref().unwrap())
            .collect();
        assert_eq!(functions, vec!["my_app::main", "my_app::handlers::load"]);
        assert_eq!(stacktrace.frames[1].module.as_deref(), Some("my_app::handlers"));
    }

    #[test]
    fn prefixes_are_stripped() {
        let options = Options::builder().prefix("/app").build().unwrap();
        let stacktrace =
            builder(options).build_from_raw_frames(&[raw("my_app::main", "/app/src/main.rs", 10)]);

        let frame = &stacktrace.frames[0];
        assert_eq!(frame.file.as_deref(), Some("src/main.rs"));
        assert_eq!(frame.abs_path.as_deref(), Some("/app/src/main.rs"));
    }

    #[test]
    fn in_app_rules() {
        let options = Options::builder()
            .in_app_include("/home/dev/.cargo/registry/src/my_fork")
            .in_app_exclude("my_app::vendored")
            .build()
            .unwrap();
        let builder = builder(options);

        assert!(builder.is_in_app(Some("my_app::main"), Some("/app/src/main.rs")));
        assert!(!builder.is_in_app(Some("std::rt::lang_start"), Some("/rustc/abc/std.rs")));
        assert!(!builder.is_in_app(Some("serde::de::x"), Some("/home/dev/.cargo/registry/src/serde/de.rs")));
        assert!(builder.is_in_app(Some("my_fork::x"), Some("/home/dev/.cargo/registry/src/my_fork/lib.rs")));
        assert!(!builder.is_in_app(Some("my_app::vendored::x"), Some("/app/src/vendored.rs")));
        assert!(builder.is_in_app(None, Some("/app/src/main.rs")));
        assert!(!builder.is_in_app(None, None));
    }

    #[test]
    fn hash_suffix_is_trimmed() {
        assert_eq!(
            trim_hash_suffix("my_app::run::h0123456789abcdef"),
            "my_app::run"
        );
        assert_eq!(trim_hash_suffix("my_app::run"), "my_app::run");
    }

    #[test]
    fn unresolved_frames_are_internal() {
        let stacktrace = builder(Options::default()).build_from_raw_frames(&[RawFrame {
            instruction_addr: Some("0x1000".into()),
            ..RawFrame::default()
        }]);
        assert!(stacktrace.frames[0].is_internal());
        assert!(!stacktrace.frames[0].in_app);
    }
}
