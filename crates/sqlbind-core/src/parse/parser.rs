//! Single-pass parser for marker-extended SQL.
//!
//! The parser recognizes only the constructs that matter to binding:
//! string literals, comments, escape sequences and the `$`/`&` marker
//! grammar. Everything else is accumulated into bypass parts and reaches
//! the driver verbatim.

use super::ast::{ColumnRef, ParsedExpr, QueryPart, TypeRef};
use super::error::{ParseError, ParseErrorKind};

/// Marker-extended SQL parser.
///
/// ```
/// use sqlbind_core::parse::Parser;
///
/// let parsed = Parser::new("SELECT &Person.* FROM person").parse().unwrap();
/// assert_eq!(parsed.parts().len(), 3);
/// ```
pub struct Parser<'a> {
    /// The input source text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// Position just after the last emitted part.
    prev_part: usize,
    /// Position where the part under construction begins. Text between
    /// `prev_part` and `part_start` becomes a bypass part.
    part_start: usize,
    parts: Vec<QueryPart>,
}

/// Snapshot of the parser state, restored when a production fails.
/// Used only within a single production attempt.
struct Checkpoint {
    pos: usize,
    prev_part: usize,
    part_start: usize,
    parts_len: usize,
}

const fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

const fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            prev_part: 0,
            part_start: 0,
            parts: Vec::new(),
        }
    }

    /// Parses the input into its ordered parts.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] with a 1-based column for malformed
    /// literals and marker expressions.
    pub fn parse(mut self) -> Result<ParsedExpr, ParseError> {
        while self.pos < self.input.len() {
            self.part_start = self.pos;
            match self.input.as_bytes()[self.pos] {
                b'\'' | b'"' => {
                    let part = self.scan_string_literal()?;
                    self.add(Some(part));
                }
                b'-' if self.peek_at(self.pos + 1) == Some(b'-') => {
                    let part = self.scan_line_comment();
                    self.add(Some(part));
                }
                b'/' if self.peek_at(self.pos + 1) == Some(b'*') => {
                    let part = self.scan_block_comment();
                    self.add(Some(part));
                }
                b'\\' if matches!(self.peek_at(self.pos + 1), Some(b'$' | b'&')) => {
                    // Escape: drop the backslash, pass the metacharacter
                    // through as bypass.
                    self.add(None);
                    self.pos += 2;
                    self.parts.push(QueryPart::Bypass {
                        chunk: self.input[self.part_start + 1..self.pos].to_string(),
                    });
                    self.prev_part = self.pos;
                    self.part_start = self.pos;
                }
                b'$' => {
                    if let Some(part) = self.parse_input_expression()? {
                        self.add(Some(part));
                    } else {
                        self.pos += 1;
                    }
                }
                _ => {
                    if let Some(part) = self.parse_output_expression()? {
                        self.add(Some(part));
                    } else {
                        self.pos += 1;
                    }
                }
            }
        }
        // Flush any trailing bypass text.
        self.part_start = self.pos;
        self.add(None);
        Ok(ParsedExpr { parts: self.parts })
    }

    /// Pushes the bypass text accumulated since the previous part, then the
    /// given part. Empty bypass chunks are elided.
    fn add(&mut self, part: Option<QueryPart>) {
        if self.prev_part != self.part_start {
            self.parts.push(QueryPart::Bypass {
                chunk: self.input[self.prev_part..self.part_start].to_string(),
            });
        }
        if let Some(part) = part {
            self.parts.push(part);
        }
        self.prev_part = self.pos;
        self.part_start = self.pos;
    }

    fn save(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            prev_part: self.prev_part,
            part_start: self.part_start,
            parts_len: self.parts.len(),
        }
    }

    fn restore(&mut self, cp: &Checkpoint) {
        self.pos = cp.pos;
        self.prev_part = cp.prev_part;
        self.part_start = cp.part_start;
        self.parts.truncate(cp.parts_len);
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, pos: usize) -> Option<u8> {
        self.input.as_bytes().get(pos).copied()
    }

    /// The byte just before the cursor.
    fn prev_byte(&self) -> Option<u8> {
        self.pos
            .checked_sub(1)
            .and_then(|p| self.input.as_bytes().get(p).copied())
    }

    /// A marker may only open at the start of the input or after
    /// whitespace or list punctuation.
    fn marker_boundary(&self) -> bool {
        match self.prev_byte() {
            None => true,
            Some(b) => matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b',' | b'(' | b'='),
        }
    }

    fn skip_byte(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn skip_spaces(&mut self) -> bool {
        let mark = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
        self.pos != mark
    }

    /// Skips a keyword case-insensitively. The keyword must not run into a
    /// longer identifier.
    fn skip_keyword_ci(&mut self, word: &str) -> bool {
        let end = self.pos + word.len();
        if end <= self.input.len() && self.input[self.pos..end].eq_ignore_ascii_case(word) {
            match self.peek_at(end) {
                Some(b) if is_name_byte(b) => false,
                _ => {
                    self.pos = end;
                    true
                }
            }
        } else {
            false
        }
    }

    fn error_at(&self, pos: usize, kind: ParseErrorKind) -> ParseError {
        ParseError {
            column: pos + 1,
            kind,
        }
    }

    /// Scans an identifier, or `*` when allowed. Returns `None` without
    /// moving the cursor if neither is present.
    fn parse_identifier(&mut self, allow_star: bool) -> Option<&'a str> {
        if allow_star && self.peek() == Some(b'*') {
            self.pos += 1;
            return Some("*");
        }
        match self.peek() {
            Some(b) if is_name_start(b) => {
                let input = self.input;
                let start = self.pos;
                self.pos += 1;
                while matches!(self.peek(), Some(b) if is_name_byte(b)) {
                    self.pos += 1;
                }
                Some(&input[start..self.pos])
            }
            _ => None,
        }
    }

    /// Parses a `Type.member` reference, where the member may be `*`.
    ///
    /// Soft-fails when there is no identifier at all; hard-fails when the
    /// reference is recognized but malformed.
    fn parse_type_ref(&mut self) -> Result<Option<TypeRef>, ParseError> {
        let start = self.pos;
        let Some(name) = self.parse_identifier(false) else {
            return Ok(None);
        };
        if !self.skip_byte(b'.') {
            return Err(self.error_at(start, ParseErrorKind::TypeNotQualified(name.to_string())));
        }
        match self.parse_identifier(true) {
            Some(member) => Ok(Some(TypeRef {
                type_name: name.to_string(),
                member: member.to_string(),
            })),
            None => Err(self.error_at(self.pos, ParseErrorKind::InvalidIdentifier)),
        }
    }

    /// Parses a column of the form `name`, `table.name`, `table.*` or `*`.
    fn parse_column(&mut self) -> Option<ColumnRef> {
        let cp = self.save();
        let first = self.parse_identifier(true)?;
        if self.skip_byte(b'.') {
            if let Some(second) = self.parse_identifier(true) {
                return Some(ColumnRef {
                    table: Some(first.to_string()),
                    column: second.to_string(),
                });
            }
            self.restore(&cp);
            return None;
        }
        Some(ColumnRef {
            table: None,
            column: first.to_string(),
        })
    }

    /// Parses the source columns of an output expression: a single column
    /// or a parenthesized list.
    fn parse_columns(&mut self) -> Option<Vec<ColumnRef>> {
        let cp = self.save();
        if let Some(column) = self.parse_column() {
            return Some(vec![column]);
        }
        if self.skip_byte(b'(') {
            self.skip_spaces();
            if let Some(column) = self.parse_column() {
                let mut columns = vec![column];
                self.skip_spaces();
                while self.skip_byte(b',') {
                    self.skip_spaces();
                    match self.parse_column() {
                        Some(column) => columns.push(column),
                        None => {
                            self.restore(&cp);
                            return None;
                        }
                    }
                    self.skip_spaces();
                }
                if self.skip_byte(b')') {
                    return Some(columns);
                }
            }
        }
        self.restore(&cp);
        None
    }

    /// Parses the members of a parenthesized target list. The cursor sits
    /// just after the opening parenthesis.
    ///
    /// With `amp_per_item` each member carries its own ampersand, as in
    /// `(&T.a, &T.b)`; without, the list follows a single ampersand, as in
    /// `&(T.a, T.b)`.
    fn parse_target_list(&mut self, amp_per_item: bool) -> Result<Vec<TypeRef>, ParseError> {
        let mut targets = Vec::new();
        loop {
            self.skip_spaces();
            if amp_per_item && !self.skip_byte(b'&') {
                return Err(self.error_at(self.pos, ParseErrorKind::InvalidIdentifier));
            }
            match self.parse_type_ref()? {
                Some(target) => targets.push(target),
                None => return Err(self.error_at(self.pos, ParseErrorKind::InvalidIdentifier)),
            }
            self.skip_spaces();
            if self.skip_byte(b',') {
                continue;
            }
            if self.skip_byte(b')') {
                return Ok(targets);
            }
            return Err(self.error_at(self.pos, ParseErrorKind::MissingCloseParen));
        }
    }

    /// Parses the target side of an output expression: `&T.f`, `&T.*`,
    /// `&(T.a, T.b)` or `(&T.a, &T.b)`.
    fn parse_targets(&mut self) -> Result<Option<Vec<TypeRef>>, ParseError> {
        let cp = self.save();
        self.skip_spaces();
        let targets = if self.peek() == Some(b'&') && self.marker_boundary() {
            let amp = self.pos;
            self.pos += 1;
            if self.skip_byte(b'(') {
                self.parse_target_list(false)?
            } else {
                match self.parse_type_ref()? {
                    Some(target) => vec![target],
                    None => {
                        return Err(self.error_at(amp + 1, ParseErrorKind::InvalidIdentifier))
                    }
                }
            }
        } else if self.peek() == Some(b'(') {
            self.pos += 1;
            self.skip_spaces();
            if self.peek() == Some(b'&') {
                self.parse_target_list(true)?
            } else {
                self.restore(&cp);
                return Ok(None);
            }
        } else {
            self.restore(&cp);
            return Ok(None);
        };
        if targets.iter().filter(|t| t.is_star()).count() > 1 {
            return Err(self.error_at(cp.pos, ParseErrorKind::MultipleTargetStars));
        }
        Ok(Some(targets))
    }

    /// Parses an output expression, with or without source columns.
    fn parse_output_expression(&mut self) -> Result<Option<QueryPart>, ParseError> {
        let start = self.pos;
        let b = self.input.as_bytes()[self.pos];

        // Bare targets, e.g. "&Person.*" or "&(P.name, P.id)".
        if b == b'&' {
            if !self.marker_boundary() {
                return Ok(None);
            }
            let Some(targets) = self.parse_targets()? else {
                return Ok(None);
            };
            let raw = self.input[start..self.pos].to_string();
            return Ok(Some(QueryPart::Output {
                sources: Vec::new(),
                targets,
                raw,
            }));
        }

        // Sourced form, e.g. "street AS &Address.street" or
        // "(c1, c2) AS (&T.a, &T.b)".
        if !(b == b'(' || b == b'*' || is_name_start(b)) || !self.marker_boundary() {
            return Ok(None);
        }
        let cp = self.save();
        if let Some(sources) = self.parse_columns() {
            self.skip_spaces();
            if self.skip_keyword_ci("AS") {
                if let Some(targets) = self.parse_targets()? {
                    self.check_output_shape(start, &sources, &targets)?;
                    let raw = self.input[start..self.pos].to_string();
                    return Ok(Some(QueryPart::Output {
                        sources,
                        targets,
                        raw,
                    }));
                }
            }
        }
        self.restore(&cp);
        Ok(None)
    }

    fn check_output_shape(
        &self,
        start: usize,
        sources: &[ColumnRef],
        targets: &[TypeRef],
    ) -> Result<(), ParseError> {
        let source_stars = sources.iter().filter(|c| c.is_star()).count();
        if sources.len() > 1 && source_stars > 0 {
            return Err(self.error_at(start, ParseErrorKind::MixedColumnStars));
        }
        let single_star_source = sources.len() == 1 && source_stars == 1;
        let single_star_target = targets.len() == 1 && targets[0].is_star();
        if !single_star_source && !single_star_target && sources.len() != targets.len() {
            return Err(self.error_at(
                start,
                ParseErrorKind::ColumnTargetMismatch {
                    columns: sources.len(),
                    targets: targets.len(),
                },
            ));
        }
        Ok(())
    }

    /// Parses an input expression: `$T.field`, `$T.*` or `$T[:]`.
    fn parse_input_expression(&mut self) -> Result<Option<QueryPart>, ParseError> {
        if !self.marker_boundary() {
            return Ok(None);
        }
        let start = self.pos;
        self.pos += 1; // '$'
        let Some(name) = self.parse_identifier(false) else {
            return Err(self.error_at(start + 1, ParseErrorKind::InvalidIdentifier));
        };
        if self.peek() == Some(b'[') {
            self.pos += 1;
            if !(self.skip_byte(b':') && self.skip_byte(b']')) {
                return Err(self.error_at(self.pos, ParseErrorKind::InvalidIdentifier));
            }
            let raw = self.input[start..self.pos].to_string();
            return Ok(Some(QueryPart::Input {
                target: TypeRef {
                    type_name: name.to_string(),
                    member: String::new(),
                },
                slice: true,
                raw,
            }));
        }
        if !self.skip_byte(b'.') {
            return Err(self.error_at(start, ParseErrorKind::TypeNotQualified(name.to_string())));
        }
        match self.parse_identifier(true) {
            Some(member) => {
                let raw = self.input[start..self.pos].to_string();
                Ok(Some(QueryPart::Input {
                    target: TypeRef {
                        type_name: name.to_string(),
                        member: member.to_string(),
                    },
                    slice: false,
                    raw,
                }))
            }
            None => Err(self.error_at(self.pos, ParseErrorKind::InvalidIdentifier)),
        }
    }

    /// Scans a quoted literal, treating a doubled quote as an escape.
    fn scan_string_literal(&mut self) -> Result<QueryPart, ParseError> {
        let start = self.pos;
        let quote = self.input.as_bytes()[self.pos];
        self.pos += 1;
        loop {
            match self.peek() {
                Some(b) if b == quote => {
                    if self.peek_at(self.pos + 1) == Some(quote) {
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(QueryPart::Bypass {
                            chunk: self.input[start..self.pos].to_string(),
                        });
                    }
                }
                Some(_) => self.pos += 1,
                None => {
                    return Err(self.error_at(start, ParseErrorKind::UnterminatedString));
                }
            }
        }
    }

    /// Scans a `--` comment up to, but not including, the end of line.
    fn scan_line_comment(&mut self) -> QueryPart {
        let start = self.pos;
        self.pos += 2;
        while matches!(self.peek(), Some(b) if b != b'\n') {
            self.pos += 1;
        }
        QueryPart::Bypass {
            chunk: self.input[start..self.pos].to_string(),
        }
    }

    /// Scans a `/* */` comment, balanced by the first `*/`. An unclosed
    /// comment runs to the end of the input.
    fn scan_block_comment(&mut self) -> QueryPart {
        let start = self.pos;
        self.pos += 2;
        while self.pos < self.input.len() {
            if self.input.as_bytes()[self.pos] == b'*' && self.peek_at(self.pos + 1) == Some(b'/')
            {
                self.pos += 2;
                break;
            }
            self.pos += 1;
        }
        QueryPart::Bypass {
            chunk: self.input[start..self.pos].to_string(),
        }
    }
}
