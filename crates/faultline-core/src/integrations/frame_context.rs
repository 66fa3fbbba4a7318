use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use faultline_types::{Event, Frame};
use tracing::trace;

use super::{Integration, OptionAware};
use crate::options::Options;
use crate::scope::Scope;

/// Adds the surrounding source lines to in-app frames
///
/// The amount of context comes from the `context_lines` option; `None` disables it.
#[derive(Debug, Default)]
pub struct FrameContextIntegration {
    options: Arc<RwLock<Option<Arc<Options>>>>,
}

impl FrameContextIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    fn context_lines(options: &RwLock<Option<Arc<Options>>>) -> Option<usize> {
        options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|options| options.context_lines())
    }
}

impl OptionAware for FrameContextIntegration {
    fn set_options(&self, options: Arc<Options>) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = Some(options);
    }
}

impl Integration for FrameContextIntegration {
    fn name(&self) -> &'static str {
        "FrameContextIntegration"
    }

    fn setup_once(&self) {
        let options = Arc::clone(&self.options);
        Scope::add_global_event_processor(move |mut event, _hint| {
            if let Some(lines) = Self::context_lines(&options) {
                apply_source_context(&mut event, lines);
            }
            Some(event)
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_option_aware(&self) -> Option<&dyn OptionAware> {
        Some(self)
    }
}

/// Fill pre/post context for every in-app frame of the event
pub(crate) fn apply_source_context(event: &mut Event, context_lines: usize) {
    if context_lines == 0 {
        return;
    }

    let mut sources: HashMap<String, Option<Vec<String>>> = HashMap::new();
    let frames = event
        .stacktrace
        .iter_mut()
        .chain(event.exceptions.iter_mut().filter_map(|bag| bag.stacktrace.as_mut()))
        .flat_map(|stacktrace| stacktrace.frames.iter_mut());

    for frame in frames {
        if !frame.in_app || frame.context_line.is_some() {
            continue;
        }
        let Some(path) = frame.abs_path.clone().or_else(|| frame.file.clone()) else {
            continue;
        };
        let source = sources.entry(path).or_insert_with_key(|path| {
            match std::fs::read_to_string(path) {
                Ok(content) => Some(content.lines().map(str::to_string).collect()),
                Err(error) => {
                    trace!(path = %path, error = %error, "Source file not readable");
                    None
                }
            }
        });
        if let Some(lines) = source {
            fill_frame(frame, lines, context_lines);
        }
    }
}

fn fill_frame(frame: &mut Frame, lines: &[String], context_lines: usize) {
    let Some(line) = frame.line.map(|line| line as usize) else {
        return;
    };
    if line == 0 || line > lines.len() {
        return;
    }

    let index = line - 1;
    let start = index.saturating_sub(context_lines);
    let end = (index + 1 + context_lines).min(lines.len());

    frame.pre_context = lines[start..index].to_vec();
    frame.context_line = Some(lines[index].clone());
    frame.post_context = lines[index + 1..end].to_vec();
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_types::Stacktrace;
    use std::io::Write;

    #[test]
    fn in_app_frames_get_source_context() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in 1..=10 {
            writeln!(file, "line {line}").unwrap();
        }
        let path = file.path().display().to_string();

        let mut in_app = Frame::new(Some("my_app::run".into()), path.clone(), Some(5));
        in_app.in_app = true;
        let library = Frame::new(Some("serde::x".into()), path, Some(5));

        let mut event = Event::error();
        event.stacktrace = Some(Stacktrace::new(vec![library, in_app]));

        apply_source_context(&mut event, 2);

        let frames = &event.stacktrace.as_ref().unwrap().frames;
        assert!(frames[0].context_line.is_none());
        assert_eq!(frames[1].pre_context, vec!["line 3", "line 4"]);
        assert_eq!(frames[1].context_line.as_deref(), Some("line 5"));
        assert_eq!(frames[1].post_context, vec!["line 6", "line 7"]);
    }

    #[test]
    fn context_is_clamped_at_file_edges() {
        let lines: Vec<String> = (1..=3).map(|n| format!("line {n}")).collect();
        let mut frame = Frame::new(None, "a.rs", Some(1));
        fill_frame(&mut frame, &lines, 5);
        assert!(frame.pre_context.is_empty());
        assert_eq!(frame.post_context.len(), 2);

        let mut out_of_range = Frame::new(None, "a.rs", Some(9));
        fill_frame(&mut out_of_range, &lines, 5);
        assert!(out_of_range.context_line.is_none());
    }
}
