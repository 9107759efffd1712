//! Progress multiplexing for concurrent push streams.
//!
//! Push layers report status out of order, each tagged with a stream id. The
//! renderer keeps one stable terminal line per id: the fold in [`RenderState`]
//! turns each event into a list of [`TermOp`]s, and [`term`] applies them to
//! the real terminal. Keeping the fold pure means the cursor math can be
//! tested against a virtual screen.

pub mod term;

use std::collections::HashMap;

use crate::engine::EngineEvent;

/// A single terminal operation produced by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermOp {
    Write(String),
    Newline,
    CursorUp(usize),
    CursorDown(usize),
    CursorToStart,
    ClearLine,
}

/// Render state for one build/push operation.
///
/// `streams` is ordered most-recently-first-seen first, so an id's index is
/// the number of stream lines between it and the bottom-most stream line.
/// `delta` is the number of additional rows between the bottom-most stream
/// line and the cursor's resting row; it starts at one (the cursor rests on
/// the row below the newest line) and grows whenever an unrelated newline
/// scrolls the session.
#[derive(Debug)]
pub struct RenderState {
    streams: Vec<String>,
    delta: usize,
    lines: HashMap<String, String>,
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            delta: 1,
            lines: HashMap::new(),
        }
    }

    /// Record a newline emitted by the surrounding session (e.g. the user
    /// pressing enter) so cursor distances stay correct.
    pub fn external_newline(&mut self) {
        self.delta += 1;
    }

    /// Fold one event into the state, returning the terminal operations that
    /// bring the screen up to date.
    pub fn apply(&mut self, event: &EngineEvent) -> Vec<TermOp> {
        let mut ops = Vec::new();
        let mut content = String::new();

        if let Some(id) = &event.id {
            content.push_str(id);
            content.push_str(": ");
        }
        if let Some(status) = &event.status {
            content.push_str(status);
        }
        if let Some(progress) = &event.progress {
            content.push(' ');
            content.push_str(progress);
        }

        match &event.id {
            Some(id) => {
                if let Some(index) = self.streams.iter().position(|s| s == id) {
                    // known id: hop up to its line, rewrite it in place, hop
                    // back down the same distance
                    let distance = index + self.delta;
                    ops.push(TermOp::CursorToStart);
                    ops.push(TermOp::CursorUp(distance));
                    ops.push(TermOp::ClearLine);
                    ops.push(TermOp::Write(content.clone()));
                    ops.push(TermOp::CursorToStart);
                    ops.push(TermOp::CursorDown(distance));
                } else {
                    self.streams.insert(0, id.clone());
                    ops.push(TermOp::Write(content.clone()));
                    ops.push(TermOp::Newline);
                }
                self.lines.insert(id.clone(), content);
            }
            None if !content.is_empty() => {
                // id-less status scrolls past as a plain line, pushing every
                // stream line one row further from the cursor
                ops.push(TermOp::Write(content));
                ops.push(TermOp::Newline);
                self.delta += 1;
            }
            None => {}
        }

        ops
    }

    /// Stream ids in order of first appearance (top of the screen first).
    pub fn first_seen_order(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().rev().map(String::as_str)
    }

    /// Last rendered content for a stream id.
    pub fn line(&self, id: &str) -> Option<&str> {
        self.lines.get(id).map(String::as_str)
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}
