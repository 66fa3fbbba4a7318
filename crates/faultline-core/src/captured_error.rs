use std::error::Error as StdError;
use std::fmt;

use crate::options::short_type_name;
use crate::stacktrace_builder::{capture_raw_frames, RawFrame};

/// An error value detached from its concrete type
///
/// Holds what the pipeline needs to report an error: a type name used for ignore-list
/// matching and display, the message, an optional numeric code, the raw frames
/// captured when the error was recorded, and the causal chain.
#[derive(Debug, Clone)]
pub struct CapturedError {
    type_name: String,
    message: String,
    code: Option<i64>,
    frames: Vec<RawFrame>,
    source: Option<Box<CapturedError>>,
}

impl CapturedError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            code: None,
            frames: Vec::new(),
            source: None,
        }
    }

    /// Capture a concrete error together with the current call stack.
    ///
    /// The outermost link gets the real type name of `E`. Links further down the
    /// `source()` chain are only known as trait objects, so their names are taken from
    /// their `Debug` rendering.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: StdError + 'static,
    {
        let mut captured = Self::from_dyn(error, std::any::type_name::<E>().to_string());
        captured.frames = capture_raw_frames();
        captured
    }

    fn from_dyn(error: &(dyn StdError + 'static), type_name: String) -> Self {
        let code = error
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::raw_os_error)
            .map(i64::from);

        let source = error.source().map(|source| {
            let name = if source.is::<std::io::Error>() {
                std::any::type_name::<std::io::Error>().to_string()
            } else {
                debug_type_name(source)
            };
            Box::new(Self::from_dyn(source, name))
        });

        Self {
            type_name,
            message: error.to_string(),
            code,
            frames: Vec::new(),
            source,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_frames(mut self, frames: Vec<RawFrame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_source(mut self, source: CapturedError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Full type path, e.g. `std::io::error::Error`
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Type name without module path or generic arguments
    pub fn short_type_name(&self) -> &str {
        short_type_name(&self.type_name)
    }

    /// Module path of the type, when the type name has one
    pub fn module(&self) -> Option<&str> {
        let without_generics = self.type_name.split('<').next().unwrap_or(&self.type_name);
        without_generics
            .rsplit_once("::")
            .map(|(module, _)| module)
            .filter(|module| !module.is_empty())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// Frames recorded at capture time, newest call first
    pub fn frames(&self) -> &[RawFrame] {
        &self.frames
    }

    pub fn cause(&self) -> Option<&CapturedError> {
        self.source.as_deref()
    }

    /// This error followed by each of its causes, outermost first
    pub fn chain(&self) -> impl Iterator<Item = &CapturedError> {
        std::iter::successors(Some(self), |error| error.source.as_deref())
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for CapturedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// Leading identifier of a `Debug` rendering: `Os { code: 2, .. }` -> `Os`.
/// String-like renderings such as `"file not found"` carry no type and map to `Error`.
fn debug_type_name(error: &dyn StdError) -> String {
    let rendered = format!("{error:?}");
    if rendered.starts_with('"') {
        return "Error".to_string();
    }
    let name = rendered
        .split(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .next()
        .unwrap_or_default()
        .trim_matches('"');
    if name.is_empty() {
        "Error".to_string()
    } else {
        name.to_string()
    }
}
