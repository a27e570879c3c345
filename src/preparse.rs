//! Whole-file scans that run before tokenizing, catching a handful of
//! mistakes more cheaply (and with better messages) than letting the parser
//! stumble into them mid-expression. Mirrors the reference compiler's
//! pre-parsing check pass.

use std::path::Path;

use crate::config::{RESERVED_KEYWORDS, is_valid_identifier};
use crate::error::{CompileError, ErrorKind};
use crate::span::Span;

const BRACKET_PAIRS: &[(char, char)] = &[('(', ')'), ('[', ']'), ('{', '}')];

fn matching_close(open: char) -> Option<char> {
    BRACKET_PAIRS.iter().find(|(o, _)| *o == open).map(|(_, c)| *c)
}

fn is_close(c: char) -> bool {
    BRACKET_PAIRS.iter().any(|(_, close)| *close == c)
}

/// Scans the whole file for mismatched/unclosed brackets, ignoring `#`
/// comments and `"`-quoted text, then per-line checks `let`/`@` lines for a
/// missing right-hand side and reserved/invalid identifiers on the LHS of a
/// `let`.
pub fn pre_parse_checks(source: &str, file: &Path) -> Result<(), CompileError> {
    check_brackets(source, file)?;
    for (line_no, line) in source.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        let code = strip_comment(trimmed);
        if code.starts_with("let ") || code == "let" {
            check_let_line(code, line_no, file)?;
        } else if let Some(rest) = code.strip_prefix('@') {
            let rest = rest.trim_end();
            if rest.ends_with('=') {
                return Err(CompileError::at(
                    ErrorKind::MissingValueAfterEquals,
                    Span::point(file, line_no, line.len() + 1),
                ));
            }
        }
    }
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn check_brackets(source: &str, file: &Path) -> Result<(), CompileError> {
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut line = 1usize;
    let mut col = 1usize;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                line += 1;
                col = 1;
                continue;
            }
            '#' if !in_string => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                    col += 1;
                }
                continue;
            }
            '"' => in_string = !in_string,
            _ if in_string => {}
            _ if matching_close(c).is_some() => stack.push((c, line, col)),
            _ if is_close(c) => match stack.pop() {
                Some((open, _, _)) if matching_close(open) == Some(c) => {}
                Some((open, open_line, open_col)) => {
                    return Err(CompileError::at(
                        ErrorKind::UnmatchedBracket { bracket: open },
                        Span::point(file, open_line, open_col),
                    ));
                }
                None => {
                    return Err(CompileError::at(
                        ErrorKind::UnmatchedBracket { bracket: c },
                        Span::point(file, line, col),
                    ));
                }
            },
            _ => {}
        }
        col += 1;
    }
    if let Some((open, open_line, open_col)) = stack.pop() {
        return Err(CompileError::at(
            ErrorKind::UnmatchedBracket { bracket: open },
            Span::point(file, open_line, open_col),
        ));
    }
    Ok(())
}

fn check_let_line(code: &str, line_no: usize, file: &Path) -> Result<(), CompileError> {
    let Some(eq_pos) = code.find('=') else {
        return Err(CompileError::at(
            ErrorKind::IncompleteAssignment,
            Span::point(file, line_no, code.len() + 1),
        ));
    };
    let rhs = code[eq_pos + 1..].trim();
    if rhs.is_empty() {
        return Err(CompileError::at(
            ErrorKind::MissingValueAfterEquals,
            Span::point(file, line_no, code.len() + 1),
        ));
    }
    let lhs = code["let".len()..eq_pos].trim();
    for name in lhs.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if RESERVED_KEYWORDS.contains(&name) {
            return Err(CompileError::at(
                ErrorKind::ReservedKeywordAsIdentifier { name: name.to_string() },
                Span::point(file, line_no, 1),
            ));
        }
        if !is_valid_identifier(name) {
            return Err(CompileError::at(
                ErrorKind::InvalidIdentifier { name: name.to_string() },
                Span::point(file, line_no, 1),
            ));
        }
    }
    Ok(())
}
