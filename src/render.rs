//! Output rendering for the support console.
//!
//! The [`Renderer`] trait decouples the chat session from the terminal. [`PlainTextRenderer`]
//! writes to stdout with optional ANSI styling and exposes a shared interrupt flag that the
//! session polls between stream chunks.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// ANSI escape code for dim text (used for the progress placeholder).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for advisories).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for yellow text (used for warnings).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for cyan text (used for informational lines).
const ANSI_CYAN: &str = "\x1b[36m";

/// Carriage return plus clear-to-end-of-line.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Shown while waiting for the first delta of a response.
pub const PLACEHOLDER_TEXT: &str = "⏳ Analyzing ticket data... Please wait...";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Show the transient "working" placeholder for a new response.
    fn print_placeholder(&mut self);

    /// Remove the placeholder; called once, right before the first delta or any outcome.
    fn clear_placeholder(&mut self);

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as deltas are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Print a warning, such as the empty-response notice.
    fn print_warning(&mut self, warning: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a category advisory banner.
    fn print_advisory(&mut self, advisory: &str) {
        self.print_warning(advisory);
    }

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {
        self.print_info("[interrupted]");
    }

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    placeholder_visible: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            placeholder_visible: false,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Whether ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_placeholder(&mut self) {
        let line = self.styled(ANSI_DIM, PLACEHOLDER_TEXT);
        print!("{line}");
        self.placeholder_visible = true;
        self.flush();
    }

    fn clear_placeholder(&mut self) {
        if !self.placeholder_visible {
            return;
        }
        if self.use_color {
            print!("{CLEAR_LINE}");
        } else {
            println!();
        }
        self.placeholder_visible = false;
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        self.clear_placeholder();
        print!("{text}");
        self.flush();
    }

    fn print_warning(&mut self, warning: &str) {
        self.clear_placeholder();
        println!("{}", self.styled(ANSI_YELLOW, warning));
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.clear_placeholder();
        eprintln!("{}", self.styled(ANSI_RED, error));
    }

    fn print_info(&mut self, info: &str) {
        self.clear_placeholder();
        println!("{}", self.styled(ANSI_CYAN, info));
    }

    fn print_advisory(&mut self, advisory: &str) {
        self.clear_placeholder();
        let style = format!("{ANSI_BOLD}{ANSI_YELLOW}");
        println!("{}", self.styled(&style, advisory));
    }

    fn finish_response(&mut self) {
        self.clear_placeholder();
        println!();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.clear_placeholder();
        println!("\n[interrupted]");
        self.flush();
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color());
        assert!(!renderer.should_interrupt());
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color());
        assert_eq!(renderer.styled(ANSI_RED, "plain"), "plain");
    }

    #[test]
    fn renderer_reads_interrupt_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let renderer = PlainTextRenderer::with_color(false).with_interrupt(flag.clone());
        assert!(!renderer.should_interrupt());
        flag.store(true, Ordering::Relaxed);
        assert!(renderer.should_interrupt());
    }

    #[test]
    fn placeholder_cleared_once() {
        let mut renderer = PlainTextRenderer::with_color(false);
        renderer.print_placeholder();
        assert!(renderer.placeholder_visible);
        renderer.print_text("first");
        assert!(!renderer.placeholder_visible);
        renderer.clear_placeholder();
        assert!(!renderer.placeholder_visible);
    }
}
