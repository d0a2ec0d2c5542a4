//! Script origin attribution
//!
//! Resolves which loaded script triggered a trapped access by inspecting the
//! script context's call frames, the way a native structured stack trace would
//! be walked: skip the instrumentation's own frames, then take the first frame
//! belonging to the caller.
//!
//! Evaluated code needs special handling: the frame's own location is a
//! synthetic position inside the evaluated snippet, so the resolver extracts
//! the real origin embedded in the eval descriptor instead (the trailing
//! parenthesized `(http...)` group).
//!
//! # Known limitations
//!
//! - Frames with an anonymous file placeholder cannot be resolved to a real
//!   URL (seen with timer-scheduled code); they format as
//!   `<anonymous>:line:column`.
//! - Multiply-nested evaluation (a templating library evaluating code that
//!   itself evaluates more code) may resolve to the wrong nesting level.
//!
//! Both degrade to a less precise string. The resolver never fails: callers
//! always get *some* origin, possibly empty.

use regex::Regex;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

/// Trailing `(http...)` group of an eval descriptor.
fn eval_origin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((http.*)\)$").expect("static regex"))
}

/// Trailing `:line:column` suffix of a formatted location.
fn position_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":\d+:\d+$").expect("static regex"))
}

/// How a call frame entered execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Ordinary script code loaded from a file or URL
    Script,
    /// Evaluated code; carries the full eval descriptor text, e.g.
    /// `eval at <anonymous> (https://site/jquery.min.js:2:12388)`
    Eval { descriptor: String },
    /// A frame belonging to the instrumentation layer itself; skipped during
    /// resolution
    Instrumentation,
}

/// One frame of the script context's call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub file: Option<String>,
    pub line: u32,
    pub column: u32,
    pub kind: FrameKind,
}

impl CallFrame {
    pub fn script(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.to_string()),
            line,
            column,
            kind: FrameKind::Script,
        }
    }

    /// A frame whose file name is an anonymous placeholder.
    pub fn anonymous(line: u32, column: u32) -> Self {
        Self {
            file: None,
            line,
            column,
            kind: FrameKind::Script,
        }
    }

    pub fn eval(descriptor: &str, line: u32, column: u32) -> Self {
        Self {
            file: None,
            line,
            column,
            kind: FrameKind::Eval {
                descriptor: descriptor.to_string(),
            },
        }
    }

    pub fn instrumentation() -> Self {
        Self {
            file: None,
            line: 0,
            column: 0,
            kind: FrameKind::Instrumentation,
        }
    }

    /// `file:line:column`, with `<anonymous>` standing in for a missing file.
    fn format_location(&self) -> String {
        let file = self.file.as_deref().unwrap_or("<anonymous>");
        format!("{}:{}:{}", file, self.line, self.column)
    }
}

/// Call stack of the executing script context. Innermost frame last.
#[derive(Debug, Default)]
pub struct ScriptStack {
    frames: Vec<CallFrame>,
}

impl ScriptStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Innermost non-instrumentation frame: the code that triggered the trap.
    fn caller_frame(&self) -> Option<&CallFrame> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.kind != FrameKind::Instrumentation)
    }
}

/// Attribution capability consumed by the interception engine.
///
/// Pluggable so that environments with coarser signals (e.g. only a caller
/// module identity) can sit behind the same interface at reduced precision.
pub trait OriginProvider {
    /// Best-effort origin of the code that triggered the current access.
    /// Always returns a string; empty means attribution failed.
    fn resolve_caller_origin(&self) -> String;
}

/// Stack-walking origin provider over the shared script stack.
pub struct StackOriginProvider {
    stack: Rc<RefCell<ScriptStack>>,
}

impl StackOriginProvider {
    pub fn new(stack: Rc<RefCell<ScriptStack>>) -> Self {
        Self { stack }
    }
}

impl OriginProvider for StackOriginProvider {
    fn resolve_caller_origin(&self) -> String {
        let stack = self.stack.borrow();
        let Some(frame) = stack.caller_frame() else {
            return String::new();
        };

        if let FrameKind::Eval { descriptor } = &frame.kind {
            // The eval'd snippet's own location is synthetic; pull the real
            // origin out of the descriptor. Descriptors without the expected
            // tail fall back to the synthetic location.
            if let Some(caps) = eval_origin_re().captures(descriptor) {
                return caps[1].to_string();
            }
        }

        frame.format_location()
    }
}

/// Remove one trailing `:line:column` suffix; anything else passes through.
pub fn strip_position_suffix(script_url: &str) -> String {
    position_suffix_re().replace(script_url, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with(frames: Vec<CallFrame>) -> StackOriginProvider {
        let stack = Rc::new(RefCell::new(ScriptStack { frames }));
        StackOriginProvider::new(stack)
    }

    #[test]
    fn test_script_frame_formats_file_line_column() {
        let provider = provider_with(vec![
            CallFrame::script("https://cdn.example/fp.js", 42, 7),
            CallFrame::instrumentation(),
        ]);
        assert_eq!(provider.resolve_caller_origin(), "https://cdn.example/fp.js:42:7");
    }

    #[test]
    fn test_instrumentation_frames_are_skipped() {
        let provider = provider_with(vec![
            CallFrame::script("https://a/one.js", 1, 1),
            CallFrame::script("https://a/two.js", 2, 2),
            CallFrame::instrumentation(),
            CallFrame::instrumentation(),
        ]);
        assert_eq!(provider.resolve_caller_origin(), "https://a/two.js:2:2");
    }

    #[test]
    fn test_eval_frame_resolves_embedded_origin() {
        let provider = provider_with(vec![CallFrame::eval(
            "eval at <anonymous> (https://code.jquery.com/jquery-1.6.4.js:2:12388)",
            1,
            1079,
        )]);
        assert_eq!(
            provider.resolve_caller_origin(),
            "https://code.jquery.com/jquery-1.6.4.js:2:12388"
        );
    }

    #[test]
    fn test_nested_eval_resolves_imprecisely() {
        // Double-eval'd code (jQuery + a packer): the greedy capture swallows
        // the inner closing paren. Imprecise, but still a usable string; this
        // is the documented wrong-nesting-level limitation.
        let provider = provider_with(vec![CallFrame::eval(
            "eval at <anonymous> (eval at <anonymous> (http://fingerprint.pet-portal.eu/javascript/jquery.min.js:2:12388))",
            1,
            1,
        )]);
        assert_eq!(
            provider.resolve_caller_origin(),
            "http://fingerprint.pet-portal.eu/javascript/jquery.min.js:2:12388)"
        );
    }

    #[test]
    fn test_eval_without_origin_tail_falls_back_to_location() {
        let provider = provider_with(vec![CallFrame::eval("eval at <anonymous>", 3, 9)]);
        assert_eq!(provider.resolve_caller_origin(), "<anonymous>:3:9");
    }

    #[test]
    fn test_anonymous_frame_formats_placeholder() {
        let provider = provider_with(vec![CallFrame::anonymous(33, 1230)]);
        assert_eq!(provider.resolve_caller_origin(), "<anonymous>:33:1230");
    }

    #[test]
    fn test_empty_stack_resolves_empty() {
        let provider = provider_with(vec![]);
        assert_eq!(provider.resolve_caller_origin(), "");
    }

    #[test]
    fn test_strip_position_suffix() {
        assert_eq!(strip_position_suffix("https://x/y.js:10:5"), "https://x/y.js");
        assert_eq!(strip_position_suffix("https://x/y.js"), "https://x/y.js");
        // only one trailing pair is removed
        assert_eq!(strip_position_suffix("https://x/y.js:1:2:3:4"), "https://x/y.js:1:2");
        assert_eq!(strip_position_suffix(""), "");
    }
}
