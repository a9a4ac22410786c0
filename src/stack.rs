//! Stack capture
//!
//! Captures are cheap: only raw instruction pointers are recorded at the call
//! site. Symbolization (the expensive step) happens later, once the run has
//! finished and the result is inspected.

use std::ffi::c_void;
use std::path::PathBuf;

/// Initial number of frame slots used by [`capture_frames`].
pub const DEFAULT_DEPTH: usize = 32;

/// Suffix identifying the capture function in symbolized stacks.
const CAPTURE_MARKER: &str = "stack::capture_frames";

/* ===================== Raw Frames ===================== */

/// Opaque sequence of return addresses captured at a call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frames {
    ips: Vec<usize>,
}

impl Frames {
    pub fn len(&self) -> usize {
        self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}

/// Capture the current call stack.
///
/// The walk writes into a buffer of `initial_depth` slots. A walk that fills
/// the buffer is treated as truncated and retried with twice the capacity.
#[inline(never)]
pub fn capture_frames(initial_depth: usize) -> Frames {
    let mut depth = initial_depth.max(1);
    loop {
        let mut ips = Vec::with_capacity(depth);
        let mut truncated = false;

        backtrace::trace(|frame| {
            if ips.len() == depth {
                truncated = true;
                return false;
            }
            ips.push(frame.ip() as usize);
            true
        });

        if !truncated {
            return Frames { ips };
        }
        depth *= 2;
    }
}

/* ===================== Symbolization ===================== */

/// A symbolized stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub ip: usize,
    /// Demangled function name without the trailing hash. Empty if unknown.
    pub function: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

/// Resolve captured frames into symbols.
///
/// Inlined calls expand to several frames sharing one `ip`, innermost first.
/// Frames belonging to the capture machinery are dropped, so the first frame
/// returned is the function that called [`capture_frames`]. If the marker
/// cannot be found (no symbols available) nothing is dropped.
pub fn symbolize(frames: &Frames) -> Vec<Frame> {
    let mut resolved = Vec::with_capacity(frames.ips.len());

    for &ip in &frames.ips {
        let before = resolved.len();
        backtrace::resolve(ip as *mut c_void, |symbol| {
            resolved.push(Frame {
                ip,
                function: symbol
                    .name()
                    .map(|name| format!("{name:#}"))
                    .unwrap_or_default(),
                file: symbol.filename().map(PathBuf::from),
                line: symbol.lineno(),
            });
        });
        if resolved.len() == before {
            resolved.push(Frame {
                ip,
                ..Frame::default()
            });
        }
    }

    match resolved.iter().rposition(is_capture_frame) {
        Some(idx) => resolved.split_off(idx + 1),
        None => resolved,
    }
}

fn is_capture_frame(frame: &Frame) -> bool {
    frame.function.ends_with(CAPTURE_MARKER)
        || frame.function.contains(&format!("{CAPTURE_MARKER}::"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn recurse<T>(n: usize, f: &dyn Fn() -> T) -> T {
        if n == 0 {
            return f();
        }
        let out = recurse(n - 1, f);
        std::hint::black_box(());
        out
    }

    #[test]
    fn test_capture_grows_past_initial_depth() {
        const DEPTH: usize = 128;
        let frames = recurse(DEPTH, &|| capture_frames(4));
        assert!(
            frames.len() >= DEPTH,
            "len(frames) = {} < {}",
            frames.len(),
            DEPTH
        );
    }

    #[test]
    fn test_symbolize_starts_at_capture_caller() {
        let frames = capture_frames(DEFAULT_DEPTH);
        let resolved = symbolize(&frames);

        let first = resolved.first().expect("at least one frame");
        assert!(
            first.function.ends_with("test_symbolize_starts_at_capture_caller"),
            "first frame was {:?}",
            first.function
        );
        assert!(first
            .file
            .as_ref()
            .is_some_and(|f| f.ends_with("stack.rs")));
    }

    #[test]
    fn test_symbolize_empty() {
        assert!(symbolize(&Frames::default()).is_empty());
    }
}
