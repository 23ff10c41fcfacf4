//! Line-oriented script parser
//!
//! Turns raw script text into one [`ScriptLine`] per source line. Directive
//! bodies are kept verbatim and checked later; command lines are split
//! with shell quoting rules.

use std::borrow::Cow;

use crate::parser::ast::{LineKind, Script, ScriptDiagnostic, ScriptLine};

/// Parse a whole script. Never fails: malformed command lines are
/// downgraded to comments and reported as diagnostics.
pub fn parse_script(input: &str) -> Script {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut script = Script::default();

    for (idx, raw) in input.lines().enumerate() {
        let (line, diagnostic) = parse_line(idx + 1, raw);
        if let Some(diagnostic) = diagnostic {
            tracing::warn!(line = line.line_number, "{}", diagnostic.message);
            script.diagnostics.push(diagnostic);
        }
        script.lines.push(line);
    }

    tracing::debug!(
        lines = script.lines.len(),
        diagnostics = script.diagnostics.len(),
        "parsed script"
    );
    script
}

/// Parse a single line
pub fn parse_line(line_number: usize, raw: &str) -> (ScriptLine, Option<ScriptDiagnostic>) {
    let trimmed = raw.trim();
    let mut line = ScriptLine {
        line_number,
        raw_text: raw.to_string(),
        kind: LineKind::Empty,
        command: String::new(),
        args: Vec::new(),
    };

    if trimmed.is_empty() {
        return (line, None);
    }

    if trimmed.starts_with('#') {
        line.kind = LineKind::Comment;
        return (line, None);
    }

    if let Some(rest) = trimmed.strip_prefix('@') {
        let (keyword, body) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };
        line.kind = LineKind::Directive;
        line.command = keyword.to_lowercase();
        if !body.is_empty() {
            line.args.push(body.to_string());
        }
        return (line, None);
    }

    match shlex::split(&escape_word_hashes(trimmed)) {
        Some(tokens) if !tokens.is_empty() => {
            let mut tokens = tokens.into_iter();
            line.kind = LineKind::Command;
            line.command = tokens.next().unwrap_or_default();
            line.args = tokens.collect();
            (line, None)
        }
        Some(_) => {
            line.kind = LineKind::Comment;
            (line, None)
        }
        None => {
            line.kind = LineKind::Comment;
            let diagnostic = ScriptDiagnostic::warning(
                line_number,
                format!("could not tokenize command (unbalanced quotes?), line skipped: {}", trimmed),
            );
            (line, Some(diagnostic))
        }
    }
}

/// Escape `#` at the start of an unquoted word.
///
/// Whole-line comments never reach the tokenizer, so a `#` inside a command
/// line is an argument (`#FF0000`), not the start of a shell comment.
fn escape_word_hashes(text: &str) -> Cow<'_, str> {
    if !text.contains('#') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 4);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut word_start = true;

    for c in text.chars() {
        if escaped {
            escaped = false;
        } else {
            match quote {
                Some(q) if c == q => quote = None,
                Some('"') if c == '\\' => escaped = true,
                Some(_) => {}
                None => match c {
                    '\\' => escaped = true,
                    '"' | '\'' => quote = Some(c),
                    '#' if word_start => out.push('\\'),
                    _ => {}
                },
            }
        }
        word_start = quote.is_none() && c.is_whitespace();
        out.push(c);
    }

    Cow::Owned(out)
}

/// Strip one pair of matching surrounding quotes (`"..."` or `'...'`)
pub fn strip_quotes(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return &text[1..text.len() - 1];
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        let script = parse_script("\n# note\n@set A = 1\nexcel open report.xlsx\n");
        let kinds: Vec<LineKind> = script.lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Empty,
                LineKind::Comment,
                LineKind::Directive,
                LineKind::Command
            ]
        );
        assert_eq!(script.lines[3].line_number, 4);
    }

    #[test]
    fn test_parse_command_quoting() {
        let (line, diag) = parse_line(1, r#"  excel write "Q1 Report.xlsx" --sheet 'Summary Page'"#);
        assert!(diag.is_none());
        assert_eq!(line.command, "excel");
        assert_eq!(
            line.args,
            vec!["write", "Q1 Report.xlsx", "--sheet", "Summary Page"]
        );
    }

    #[test]
    fn test_hash_arguments_are_kept() {
        let (line, diag) = parse_line(1, "excel set-color A1 #FF0000 --bold");
        assert!(diag.is_none());
        assert_eq!(line.args, vec!["set-color", "A1", "#FF0000", "--bold"]);

        let (line, _) = parse_line(2, r##"word tag "#draft" issue#12 '#x' \#y"##);
        assert_eq!(line.args, vec!["tag", "#draft", "issue#12", "#x", "#y"]);
    }

    #[test]
    fn test_escape_word_hashes() {
        assert_eq!(escape_word_hashes("a b"), "a b");
        assert_eq!(escape_word_hashes("a #b c#d"), "a \\#b c#d");
        assert_eq!(escape_word_hashes("a \"x #y\" #z"), "a \"x #y\" \\#z");
    }

    #[test]
    fn test_parse_directive_keeps_body_verbatim() {
        let (line, _) = parse_line(3, "@IF ${COUNT} >= 10 and ready");
        assert_eq!(line.kind, LineKind::Directive);
        assert_eq!(line.keyword(), Some("if"));
        assert_eq!(line.directive_body(), "${COUNT} >= 10 and ready");
    }

    #[test]
    fn test_parse_directive_without_body() {
        let (line, _) = parse_line(1, "@endif");
        assert!(line.is_directive("endif"));
        assert!(line.args.is_empty());
        assert_eq!(line.directive_body(), "");
    }

    #[test]
    fn test_malformed_command_downgraded() {
        let script = parse_script("mail send \"unterminated\nexcel close");
        assert_eq!(script.lines[0].kind, LineKind::Comment);
        assert_eq!(script.lines[1].kind, LineKind::Command);
        assert_eq!(script.diagnostics.len(), 1);
        assert_eq!(script.diagnostics[0].line, Some(1));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"abc'"), "\"abc'");
        assert_eq!(strip_quotes("\""), "\"");
        assert_eq!(strip_quotes("\"\""), "");
    }
}
