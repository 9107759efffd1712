//! ANSI applier for renderer operations.

use std::io::Write;

use crate::progress::TermOp;

/// Write a batch of terminal operations to stdout.
pub fn emit(ops: &[TermOp]) {
    let mut out = std::io::stdout().lock();
    for op in ops {
        let _ = match op {
            TermOp::Write(text) => out.write_all(text.as_bytes()),
            TermOp::Newline => out.write_all(b"\n"),
            TermOp::CursorUp(n) => write!(out, "\x1b[{n}A"),
            TermOp::CursorDown(n) => write!(out, "\x1b[{n}B"),
            TermOp::CursorToStart => out.write_all(b"\r"),
            TermOp::ClearLine => out.write_all(b"\x1b[2K"),
        };
    }
    let _ = out.flush();
}
