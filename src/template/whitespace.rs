//! Static-text whitespace normalization.
//!
//! Applied once at compile time, to static text only (dynamic slot content
//! is never touched). Rules:
//!
//! 1. Adjacent static text children merge into one.
//! 2. Runs of whitespace (including newlines) collapse to a single space.
//! 3. Template-boundary whitespace is trimmed: leading space on a first
//!    text child, trailing space on a last text child.
//! 4. Whitespace-only text between children is dropped when it came from
//!    line breaks, except inside text-flow tags where it stays as a single
//!    space. Verbatim tags skip all of the above.

use crate::config::TagFlags;

use super::compiler::CompiledChild;

/// Collapse a run of whitespace into single spaces.
fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_whitespace = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
            }
            in_whitespace = true;
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    out
}

/// Normalize static text among an element's compiled children.
pub(super) fn normalize_text(children: &mut Vec<CompiledChild>, flags: TagFlags) {
    if flags.contains(TagFlags::VERBATIM) {
        return;
    }

    // Merge adjacent text children first.
    let mut merged: Vec<CompiledChild> = Vec::with_capacity(children.len());
    for child in children.drain(..) {
        if let CompiledChild::Text(next) = &child {
            if let Some(CompiledChild::Text(prev)) = merged.last_mut() {
                let mut combined = prev.to_string();
                combined.push_str(next);
                *prev = combined.into();
                continue;
            }
        }
        merged.push(child);
    }

    let count = merged.len();
    let mut out: Vec<CompiledChild> = Vec::with_capacity(count);
    for (position, child) in merged.into_iter().enumerate() {
        let CompiledChild::Text(text) = child else {
            out.push(child);
            continue;
        };

        let from_line_break = text.contains('\n');
        let mut collapsed = collapse(&text);
        if position == 0 {
            collapsed = collapsed.trim_start().to_string();
        }
        if position == count - 1 {
            collapsed = collapsed.trim_end().to_string();
        }

        if collapsed.is_empty() {
            continue;
        }
        if collapsed == " " {
            // Whitespace between children: keep inline flow spacing, drop
            // indentation that came from line breaks elsewhere.
            if from_line_break && !flags.contains(TagFlags::TEXT_FLOW) {
                continue;
            }
        }
        out.push(CompiledChild::Text(collapsed.into()));
    }

    *children = out;
}
