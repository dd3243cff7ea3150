//! Terminal rendering of model responses.
//!
//! The response is split into prose and fenced code blocks by a line state
//! machine ([`parse_segments`]); prose is printed as-is and code goes
//! through the tree-sitter [`highlight`](crate::highlight) module. Every
//! segment borrows a contiguous slice of the response, so printing the
//! segments' [`Segment::source`] in order reproduces the input exactly.

use std::io::{self, Write};

use colored::Colorize;

use crate::highlight::{self, HIGHLIGHTER};

/// One piece of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    PlainText(&'a str),
    CodeBlock {
        /// First word of the info string, if any.
        language: Option<&'a str>,
        code: &'a str,
        /// Raw opening fence line, newline included.
        open_fence: &'a str,
        /// Raw closing fence line, newline included when present.
        close_fence: &'a str,
    },
}

impl<'a> Segment<'a> {
    /// The exact response text this segment was parsed from.
    pub fn source(&self) -> String {
        match self {
            Segment::PlainText(text) => text.to_string(),
            Segment::CodeBlock {
                code,
                open_fence,
                close_fence,
                ..
            } => format!("{}{}{}", open_fence, code, close_fence),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: char,
    len: usize,
}

enum State<'a> {
    Outside,
    Inside {
        fence: Fence,
        language: Option<&'a str>,
        open_start: usize,
        code_start: usize,
    },
}

/// Split `text` into plain text and fenced code blocks, in document order.
///
/// A block that is never closed is returned as plain text together with
/// everything after its opening fence.
pub fn parse_segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut state = State::Outside;
    let mut plain_start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        match state {
            State::Outside => {
                if let Some((fence, language)) = opening_fence(line) {
                    state = State::Inside {
                        fence,
                        language,
                        open_start: line_start,
                        code_start: offset,
                    };
                }
            }
            State::Inside {
                fence,
                language,
                open_start,
                code_start,
            } => {
                if is_closing_fence(line, fence) {
                    if open_start > plain_start {
                        segments.push(Segment::PlainText(&text[plain_start..open_start]));
                    }
                    segments.push(Segment::CodeBlock {
                        language,
                        code: &text[code_start..line_start],
                        open_fence: &text[open_start..code_start],
                        close_fence: line,
                    });
                    plain_start = offset;
                    state = State::Outside;
                }
            }
        }
    }

    if plain_start < text.len() {
        segments.push(Segment::PlainText(&text[plain_start..]));
    }
    segments
}

fn strip_indent(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    Some(&line[indent..])
}

fn opening_fence(line: &str) -> Option<(Fence, Option<&str>)> {
    let rest = strip_indent(line.trim_end_matches(['\n', '\r']))?;
    let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.len() - rest.trim_start_matches(marker).len();
    if len < 3 {
        return None;
    }
    let info = rest[len..].trim();
    if marker == '`' && info.contains('`') {
        return None;
    }
    let language = info.split_whitespace().next();
    Some((Fence { marker, len }, language))
}

fn is_closing_fence(line: &str, fence: Fence) -> bool {
    let Some(rest) = strip_indent(line) else {
        return false;
    };
    let after = rest.trim_start_matches(fence.marker);
    rest.len() - after.len() >= fence.len && after.trim().is_empty()
}

/// Writes responses to a terminal, highlighting code when colour is on.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Render one full response. With colour off the output is the input
    /// byte for byte, plus a trailing newline when the input lacks one.
    pub fn render<W: Write + ?Sized>(&self, text: &str, out: &mut W) -> io::Result<()> {
        if !self.color {
            out.write_all(text.as_bytes())?;
        } else {
            for segment in parse_segments(text) {
                self.write_segment(&segment, out)?;
            }
        }
        if !text.is_empty() && !text.ends_with('\n') {
            // Keep the next prompt on its own line.
            writeln!(out)?;
        }
        out.flush()
    }

    fn write_segment<W: Write + ?Sized>(&self, segment: &Segment<'_>, out: &mut W) -> io::Result<()> {
        match segment {
            Segment::PlainText(text) => out.write_all(text.as_bytes()),
            Segment::CodeBlock {
                language,
                code,
                open_fence,
                close_fence,
            } => {
                write_dimmed(open_fence, out)?;
                let spans = language.and_then(|lang| HIGHLIGHTER.highlight(lang, code));
                match spans {
                    Some(spans) => {
                        for span in spans {
                            write!(out, "{}", highlight::paint(span.kind, span.text))?;
                        }
                    }
                    None => out.write_all(code.as_bytes())?,
                }
                write_dimmed(close_fence, out)
            }
        }
    }
}

fn write_dimmed<W: Write + ?Sized>(line: &str, out: &mut W) -> io::Result<()> {
    let body = line.trim_end_matches(['\n', '\r']);
    if !body.is_empty() {
        write!(out, "{}", body.dimmed())?;
    }
    out.write_all(line[body.len()..].as_bytes())
}
