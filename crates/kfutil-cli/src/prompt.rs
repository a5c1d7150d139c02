// crates/kfutil-cli/src/prompt.rs
// ============================================================================
// Module: Terminal Secret Prompt
// Description: Line-based secret prompt over stdin and stderr.
// Purpose: Supply missing bulk-import credentials interactively.
// Dependencies: kfutil-core
// ============================================================================

//! ## Overview
//! [`TerminalPrompt`] writes the prompt to stderr and reads one line. When
//! stdin is not a terminal every prompt is declined, so piped and scripted
//! runs never block.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::io::IsTerminal;
use std::io::Stderr;
use std::io::StdinLock;
use std::io::Write;

use kfutil_core::SecretPrompt;

use crate::t;

// ============================================================================
// SECTION: Prompt
// ============================================================================

/// Secret prompt over a line reader.
pub struct TerminalPrompt<R, W> {
    /// Answer source.
    input: R,
    /// Prompt sink.
    output: W,
    /// Whether prompting is possible at all.
    interactive: bool,
}

impl TerminalPrompt<StdinLock<'static>, Stderr> {
    /// Builds a prompt over the process stdin and stderr.
    #[must_use]
    pub fn stdio() -> Self {
        let stdin = std::io::stdin();
        let interactive = stdin.is_terminal();
        Self {
            input: stdin.lock(),
            output: std::io::stderr(),
            interactive,
        }
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    /// Builds an interactive prompt over arbitrary streams.
    pub const fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            interactive: true,
        }
    }

    /// Returns the prompt sink.
    pub const fn output(&self) -> &W {
        &self.output
    }
}

impl<R: BufRead, W: Write> SecretPrompt for TerminalPrompt<R, W> {
    fn prompt_secret(&mut self, label: &str) -> Option<String> {
        if !self.interactive {
            return None;
        }
        write!(self.output, "{}", t!("prompt.secret", label = label)).ok()?;
        self.output.flush().ok()?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).ok()?;
        if read == 0 {
            return None;
        }
        let answer = line.trim_end_matches(['\r', '\n']);
        (!answer.is_empty()).then(|| answer.to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_one_line_per_prompt() {
        let mut prompt = TerminalPrompt::new(Cursor::new("s3cret\r\n\n"), Vec::new());
        assert_eq!(prompt.prompt_secret("store password").as_deref(), Some("s3cret"));
        assert_eq!(prompt.prompt_secret("server password"), None);
        assert_eq!(prompt.prompt_secret("server username"), None);
        let shown = String::from_utf8_lossy(prompt.output()).to_string();
        assert!(shown.starts_with("Enter store password: "));
    }
}
