//! Line-oriented decoder for device tree source text.
//!
//! This is not a full DTS grammar. Each line is cut into statement
//! fragments (`name {`, `name = value;`, `name;`, `};`), which is enough for
//! the layouts `dtc -O dts` produces and for hand-written files that keep
//! one statement per line or several on one line.
//!
//! Structural problems abort the decode with [`DecodeError::Syntax`]. A cell
//! or byte that does not parse only drops the property it belongs to.

use tracing::{debug, warn};

use dte_tree::{NodeId, Property, PropertyValue, Tree};

use crate::config::DecodeConfig;
use crate::error::{DecodeError, DecodeResult, DecodeWarning};
use crate::selector::{Decoded, TreeDecoder};

/// Decoder for `.dts`/`.dtsi` source text.
#[derive(Clone, Debug, Default)]
pub struct TextDecoder {
    config: DecodeConfig,
}

impl TextDecoder {
    pub fn new(config: DecodeConfig) -> Self {
        Self { config }
    }

    /// Decode source text that is already in memory.
    pub fn decode_str(&self, text: &str, source_id: &str) -> DecodeResult<Decoded> {
        Parser::new(source_id).parse(text)
    }
}

impl TreeDecoder for TextDecoder {
    fn name(&self) -> &'static str {
        "dts"
    }

    fn can_decode(&self, source_id: &str, _head: &[u8]) -> bool {
        self.config.is_text_name(source_id)
    }

    fn decode(&self, input: &[u8], source_id: &str) -> DecodeResult<Decoded> {
        self.decode_str(&String::from_utf8_lossy(input), source_id)
    }
}

/// A property whose value continues on following lines.
struct PendingProperty {
    node: NodeId,
    name: String,
    value: String,
    line: usize,
}

struct Parser<'s> {
    source: &'s str,
    tree: Tree,
    open: Vec<NodeId>,
    pending: Option<PendingProperty>,
    warnings: Vec<DecodeWarning>,
    in_comment: bool,
    root_seen: bool,
    root_closed: bool,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            tree: Tree::new(source),
            open: Vec::new(),
            pending: None,
            warnings: Vec::new(),
            in_comment: false,
            root_seen: false,
            root_closed: false,
        }
    }

    fn parse(mut self, text: &str) -> DecodeResult<Decoded> {
        let mut last_line = 0;
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            last_line = line;

            let in_string = self
                .pending
                .as_ref()
                .is_some_and(|p| ends_in_string(&p.value));
            let code = strip_comments(raw, in_string, &mut self.in_comment);
            let code = code.trim();
            if code.is_empty() || code.starts_with('*') {
                continue;
            }
            self.feed_line(code, line)?;
            if self.root_closed {
                break;
            }
        }
        self.finish(last_line)
    }

    fn feed_line(&mut self, code: &str, line: usize) -> DecodeResult<()> {
        let mut rest = code;
        if let Some(mut pending) = self.pending.take() {
            match scan(code, ends_in_string(&pending.value), &[';']) {
                Some((end, _)) => {
                    push_piece(&mut pending.value, &code[..end]);
                    self.finish_property(pending.node, pending.name, &pending.value, pending.line)?;
                    rest = &code[end + 1..];
                }
                None => {
                    push_piece(&mut pending.value, code);
                    self.pending = Some(pending);
                    return Ok(());
                }
            }
        }
        self.fragments(rest, line)
    }

    fn fragments(&mut self, mut rest: &str, line: usize) -> DecodeResult<()> {
        loop {
            rest = rest.trim_start();
            if rest.is_empty() || self.root_closed {
                return Ok(());
            }
            let Some(&current) = self.open.last() else {
                rest = self.top_level(rest);
                continue;
            };

            if let Some(after) = rest.strip_prefix('}') {
                let after = after.trim_start();
                rest = after.strip_prefix(';').unwrap_or(after);
                self.close();
                continue;
            }

            match scan(rest, false, &['{', '=', ';']) {
                Some((at, '{')) => {
                    let name = node_name(&rest[..at]);
                    if name.is_empty() {
                        return Err(DecodeError::syntax(line, "empty node name"));
                    }
                    let child = self.tree.add_child(current, name)?;
                    self.open.push(child);
                    rest = &rest[at + 1..];
                }
                Some((at, '=')) => {
                    let name = rest[..at].trim();
                    if name.is_empty() {
                        return Err(DecodeError::syntax(line, "empty property name"));
                    }
                    let value = &rest[at + 1..];
                    match scan(value, false, &[';']) {
                        Some((end, _)) => {
                            self.finish_property(current, name.to_string(), &value[..end], line)?;
                            rest = &value[end + 1..];
                        }
                        None if needs_continuation(value) => {
                            let mut text = String::new();
                            push_piece(&mut text, value);
                            self.pending = Some(PendingProperty {
                                node: current,
                                name: name.to_string(),
                                value: text,
                                line,
                            });
                            return Ok(());
                        }
                        None => {
                            // Missing ';' at end of line is tolerated.
                            return self.finish_property(current, name.to_string(), value, line);
                        }
                    }
                }
                Some((at, _)) => {
                    let statement = rest[..at].trim();
                    if !statement.is_empty() {
                        if !is_property_name(statement) {
                            return Err(DecodeError::syntax(line, format!("missing '=' in '{statement}'")));
                        }
                        self.tree
                            .set_property(current, Property::new(statement, PropertyValue::empty())?)?;
                    }
                    rest = &rest[at + 1..];
                }
                None => {
                    return Err(DecodeError::syntax(line, format!("missing '=' in '{rest}'")));
                }
            }
        }
    }

    /// Outside any node: skip directives until the root opens.
    fn top_level<'a>(&mut self, rest: &'a str) -> &'a str {
        match scan(rest, false, &['{', ';']) {
            Some((at, '{')) => {
                self.open.push(self.tree.root());
                self.root_seen = true;
                &rest[at + 1..]
            }
            Some((at, _)) => &rest[at + 1..],
            None => "",
        }
    }

    fn close(&mut self) {
        self.open.pop();
        if self.open.is_empty() {
            self.root_closed = true;
        }
    }

    fn finish_property(&mut self, node: NodeId, name: String, raw: &str, line: usize) -> DecodeResult<()> {
        match parse_value(raw) {
            Ok(value) => self.tree.set_property(node, Property::new(name, value)?)?,
            Err(token) => {
                warn!(
                    source = self.source,
                    line,
                    property = %name,
                    token = %token,
                    "skipping property with invalid value"
                );
                self.warnings.push(DecodeWarning::InvalidValue {
                    line,
                    property: name,
                    token,
                });
            }
        }
        Ok(())
    }

    fn finish(mut self, last_line: usize) -> DecodeResult<Decoded> {
        if let Some(pending) = self.pending.take() {
            self.finish_property(pending.node, pending.name, &pending.value, pending.line)?;
        }
        if !self.root_seen {
            return Err(DecodeError::syntax(last_line.max(1), "no root node"));
        }
        if !self.root_closed {
            let warning = DecodeWarning::UnclosedNodes { open: self.open.len() };
            warn!(source = self.source, "{warning}");
            self.warnings.push(warning);
        }

        debug!(
            source = self.source,
            nodes = self.tree.node_count(),
            properties = self.tree.property_count(),
            warnings = self.warnings.len(),
            "decoded source text"
        );
        Ok(Decoded {
            tree: self.tree,
            warnings: self.warnings,
        })
    }
}

/// Remove `//` and `/* */` comments outside string literals. Block
/// comments may span lines; `in_comment` carries that state. `in_string` is
/// set when the line continues a string opened on an earlier line.
fn strip_comments(line: &str, mut in_string: bool, in_comment: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if *in_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_comment = false;
                out.push(' ');
            }
            continue;
        }
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match (c, chars.peek()) {
            ('/', Some('*')) => {
                chars.next();
                *in_comment = true;
            }
            ('/', Some('/')) => break,
            _ => {
                if c == '"' {
                    in_string = true;
                }
                out.push(c);
            }
        }
    }
    out
}

/// First byte offset of any of `targets` outside string literals.
fn scan(text: &str, mut in_string: bool, targets: &[char]) -> Option<(usize, char)> {
    let mut escaped = false;
    for (at, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if targets.contains(&c) {
            return Some((at, c));
        }
    }
    None
}

fn ends_in_string(text: &str) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
        } else if in_string && c == '\\' {
            escaped = true;
        } else if c == '"' {
            in_string = !in_string;
        }
    }
    in_string
}

/// An unterminated value continues when it carries a `\` marker or leaves a
/// `<`, `[` or `"` open.
fn needs_continuation(value: &str) -> bool {
    if value.contains('\\') || ends_in_string(value) {
        return true;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    for c in value.chars() {
        match c {
            '"' => in_string = !in_string,
            '<' | '[' if !in_string => depth += 1,
            '>' | ']' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}

/// Append one line's share of a continued value.
fn push_piece(value: &mut String, piece: &str) {
    let piece = piece.trim();
    let piece = piece.strip_suffix('\\').unwrap_or(piece).trim_end();
    if piece.is_empty() {
        return;
    }
    if !value.is_empty() {
        value.push(' ');
    }
    value.push_str(piece);
}

/// Node name with any `label:` prefix removed.
fn node_name(text: &str) -> &str {
    let text = text.trim();
    match text.rsplit_once(':') {
        Some((_, name)) => name.trim(),
        None => text,
    }
}

fn is_property_name(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '_' | '+' | '#' | '?' | '-'))
}

/// Classify a raw value by its delimiters. On failure returns the token that
/// did not parse.
fn parse_value(raw: &str) -> Result<PropertyValue, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(PropertyValue::empty());
    }
    if let Some(inner) = enclosed(text, '"', '"') {
        return Ok(PropertyValue::String(inner.to_string()));
    }
    if let Some(inner) = enclosed(text, '<', '>') {
        return inner
            .split_whitespace()
            .map(|t| hex_token(t, u32::from_str_radix))
            .collect::<Result<Vec<_>, _>>()
            .map(PropertyValue::Cells);
    }
    if let Some(inner) = enclosed(text, '[', ']') {
        return inner
            .split_whitespace()
            .map(|t| hex_token(t, u8::from_str_radix))
            .collect::<Result<Vec<_>, _>>()
            .map(PropertyValue::Bytes);
    }
    Ok(PropertyValue::String(text.to_string()))
}

fn enclosed(text: &str, open: char, close: char) -> Option<&str> {
    text.strip_prefix(open)?.strip_suffix(close)
}

fn hex_token<T, E>(token: &str, parse: impl Fn(&str, u32) -> Result<T, E>) -> Result<T, String> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    parse(digits, 16).map_err(|_| token.to_string())
}
