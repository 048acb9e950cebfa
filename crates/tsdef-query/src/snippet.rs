//! Expands a resolved location into a readable, line-numbered block.

use std::fmt::Write as _;
use tsdef_core::config::{ExpansionStrategy, SnippetConfig};
use tsdef_core::error::QueryError;
use tsdef_core::text::{LineIndex, indentation, is_blank, read_source};
use tsdef_core::types::{DefinitionCandidate, DefinitionResult, SourcePosition};

/// Decides on which line a definition block ends.
pub trait BlockExpansion: Send + Sync {
    /// `start_line` and `end_line` are the 0-based lines of the candidate
    /// span; returns the 0-based last line of the block.
    fn block_end(
        &self,
        lines: &[&str],
        index: &LineIndex,
        candidate: &DefinitionCandidate,
        start_line: usize,
        end_line: usize,
    ) -> usize;
}

/// Grow the block while following lines are indented deeper than the start
/// line.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndentationExpansion;

impl BlockExpansion for IndentationExpansion {
    fn block_end(
        &self,
        lines: &[&str],
        _index: &LineIndex,
        _candidate: &DefinitionCandidate,
        start_line: usize,
        end_line: usize,
    ) -> usize {
        expand_by_indentation(lines, start_line, end_line)
    }
}

/// End the block where the resolver's enclosing span ends. Candidates without
/// one fall back to indentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnclosingSpanExpansion;

impl BlockExpansion for EnclosingSpanExpansion {
    fn block_end(
        &self,
        lines: &[&str],
        index: &LineIndex,
        candidate: &DefinitionCandidate,
        start_line: usize,
        end_line: usize,
    ) -> usize {
        match candidate.enclosing {
            Some(span) => last_line_of(index, span.start, span.end_or_start()).max(end_line),
            None => expand_by_indentation(lines, start_line, end_line),
        }
    }
}

/// Blank lines are skipped; the first non-blank line indented no deeper than
/// `start_line` ends the block and is not part of it.
pub fn expand_by_indentation(lines: &[&str], start_line: usize, end_line: usize) -> usize {
    let Some(start) = lines.get(start_line) else {
        return end_line;
    };
    let base = indentation(start);
    let mut end = end_line;
    for (i, line) in lines.iter().enumerate().skip(end_line + 1) {
        if is_blank(line) {
            continue;
        }
        if indentation(line) <= base {
            break;
        }
        end = i;
    }
    end
}

/// Render `start..=end` plus context. Markers: `>` on the start line, `+` on
/// the rest of the block.
pub fn render_snippet(
    lines: &[&str],
    start: usize,
    end: usize,
    context_before: usize,
    context_after: usize,
) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let first = start.saturating_sub(context_before);
    let last = end
        .saturating_add(context_after)
        .min(lines.len() - 1);

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate().take(last + 1).skip(first) {
        let marker = if i == start {
            " >"
        } else if i > start && i <= end {
            " +"
        } else {
            "  "
        };
        let _ = writeln!(out, "{:>4}{marker} {line}", i + 1);
    }
    out
}

/// Line holding the `end` offset of `start..end`. A span that stops right
/// after a newline, such as an LSP range ending at `(line + 1, 0)`, ends on
/// the following line.
fn last_line_of(index: &LineIndex, start: usize, end: usize) -> usize {
    index.line_of(end.max(start))
}

pub struct SnippetExtractor {
    expansion: Box<dyn BlockExpansion>,
    context_before: usize,
    context_after: usize,
}

impl Default for SnippetExtractor {
    fn default() -> Self {
        Self::from_config(&SnippetConfig::default())
    }
}

impl SnippetExtractor {
    pub fn new(expansion: Box<dyn BlockExpansion>, context_before: usize, context_after: usize) -> Self {
        Self {
            expansion,
            context_before,
            context_after,
        }
    }

    pub fn from_config(config: &SnippetConfig) -> Self {
        let expansion: Box<dyn BlockExpansion> = match config.expansion {
            ExpansionStrategy::Indentation => Box::new(IndentationExpansion),
            ExpansionStrategy::EnclosingSpan => Box::new(EnclosingSpanExpansion),
        };
        Self::new(expansion, config.context_before, config.context_after)
    }

    /// Read the candidate's file and build its result record.
    pub fn extract(&self, candidate: &DefinitionCandidate) -> Result<DefinitionResult, QueryError> {
        let text = read_source(&candidate.file)
            .map_err(|e| QueryError::file_read(&candidate.file, e))?;
        Ok(self.extract_from_text(candidate, &text))
    }

    pub fn extract_from_text(&self, candidate: &DefinitionCandidate, text: &str) -> DefinitionResult {
        let index = LineIndex::new(text);
        let lines: Vec<&str> = index.lines().collect();

        let (start_line, start_col) = index.line_col(candidate.span.start);
        let end_line = last_line_of(&index, candidate.span.start, candidate.span.end_or_start());
        let block_end = self
            .expansion
            .block_end(&lines, &index, candidate, start_line, end_line);

        let location = SourcePosition::new(start_line as u32 + 1, start_col as u32 + 1);
        DefinitionResult {
            file: candidate.file.display().to_string(),
            kind: candidate.kind,
            location: location.to_string(),
            code_snippet: render_snippet(
                &lines,
                start_line,
                block_end,
                self.context_before,
                self.context_after,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdef_core::types::{DefinitionKind, TextSpan};

    fn lines(text: &str) -> Vec<&str> {
        text.split('\n').collect()
    }

    fn candidate_at(text: &str, needle: &str) -> DefinitionCandidate {
        let start = text.find(needle).unwrap();
        DefinitionCandidate::new(
            "/src/a.ts",
            DefinitionKind::Definition,
            TextSpan::new(start, start + needle.len()),
        )
    }

    #[test]
    fn renders_function_with_context_and_markers() {
        let text = "// before\nfunction getIndentation(line: string): number {\n  const m = line.match(/^\\s*/);\n  return m ? m[0].length : 0;\n}\n// after\n";
        let result = SnippetExtractor::default().extract_from_text(&candidate_at(text, "getIndentation"), text);
        assert_eq!(result.location, "Line 2, Column 10");
        assert_eq!(result.file, "/src/a.ts");
        assert_eq!(
            result.code_snippet,
            "   1   // before\n   2 > function getIndentation(line: string): number {\n   3 +   const m = line.match(/^\\s*/);\n   4 +   return m ? m[0].length : 0;\n   5   }\n"
        );
    }

    #[test]
    fn block_ends_on_line_before_terminator() {
        let text = "    start() {\n        a();\n\n        b();\n      c();\n    }\n    next() {}";
        let ls = lines(text);
        assert_eq!(expand_by_indentation(&ls, 0, 0), 4);
        // Interior lines deeper than the start, terminator at equal depth.
        let text = "  x\n    y\n    z\n  w\n";
        assert_eq!(expand_by_indentation(&lines(text), 0, 0), 2);
        let text = "  x\n    y\nw\n";
        assert_eq!(expand_by_indentation(&lines(text), 0, 0), 1);
    }

    #[test]
    fn same_indent_closing_brace_is_context_not_block() {
        let text = "class A {\n  m() {}\n}\n";
        let ls = lines(text);
        assert_eq!(expand_by_indentation(&ls, 0, 0), 1);
        let snippet = render_snippet(&ls, 0, 1, 1, 1);
        assert_eq!(snippet, "   1 > class A {\n   2 +   m() {}\n   3   }\n");
    }

    #[test]
    fn multiline_signature_at_same_indent_stops_early() {
        let text = "function f(\na: number,\nb: number\n) {\n  return a + b;\n}\n";
        assert_eq!(expand_by_indentation(&lines(text), 0, 0), 0);
    }

    #[test]
    fn tabs_and_spaces_count_one_each() {
        // A tab-indented body is "shallower" than a four-space start line.
        let text = "    function f() {\n\t\treturn 1;\n    }\n";
        assert_eq!(expand_by_indentation(&lines(text), 0, 0), 0);
        let text = "\tfunction f() {\n\t\treturn 1;\n\t}\n";
        assert_eq!(expand_by_indentation(&lines(text), 0, 0), 1);
    }

    #[test]
    fn expansion_runs_to_end_of_file() {
        let text = "export const x = {\n  a: 1,\n  b: 2,";
        assert_eq!(expand_by_indentation(&lines(text), 0, 0), 2);
    }

    #[test]
    fn context_is_clamped_to_file_bounds() {
        let ls = vec!["only line"];
        assert_eq!(render_snippet(&ls, 0, 0, 1, 1), "   1 > only line\n");
        assert_eq!(render_snippet(&[], 0, 0, 1, 1), "");
    }

    #[test]
    fn extraction_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("i.ts");
        let text = "interface A {\n  x: number;\n}\n";
        std::fs::write(&file, text).unwrap();
        let start = text.find('A').unwrap();
        let candidate =
            DefinitionCandidate::new(&file, DefinitionKind::TypeDefinition, TextSpan::new(start, start + 1));
        let extractor = SnippetExtractor::default();
        let first = extractor.extract(&candidate).unwrap();
        let second = extractor.extract(&candidate).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.kind, DefinitionKind::TypeDefinition);
    }

    #[test]
    fn non_utf8_targets_still_render() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("legacy.ts");
        std::fs::write(&file, b"// \xff\nexport function legacy() {}\n").unwrap();
        let start = "// \u{FFFD}\nexport function ".len();
        let candidate = DefinitionCandidate::new(&file, DefinitionKind::Definition, TextSpan::new(start, start + 6));
        let result = SnippetExtractor::default().extract(&candidate).unwrap();
        assert_eq!(result.location, "Line 2, Column 17");
        assert!(result.code_snippet.contains("   2 > export function legacy() {}"));
        assert!(result.code_snippet.contains("   1   // \u{FFFD}"));
    }

    #[test]
    fn unreadable_file_is_reported() {
        let candidate = DefinitionCandidate::new(
            "/definitely/not/here.ts",
            DefinitionKind::Definition,
            TextSpan::at(0),
        );
        let err = SnippetExtractor::default().extract(&candidate).unwrap_err();
        assert!(matches!(err, QueryError::FileRead { .. }));
    }

    #[test]
    fn carriage_returns_stay_in_rendered_lines() {
        let text = "const a = 1;\r\nconst b = 2;\r\n";
        let result = SnippetExtractor::default().extract_from_text(&candidate_at(text, "b"), text);
        assert_eq!(result.location, "Line 2, Column 7");
        assert!(result.code_snippet.contains("   2 > const b = 2;\r\n"));
    }

    #[test]
    fn enclosing_span_strategy_uses_resolver_block() {
        let text = "function f(\na: number,\n) {\n  return a;\n}\nconst after = 1;\n";
        let start = text.find('f').unwrap();
        let end = text.find("}\n").unwrap() + 1;
        let candidate = DefinitionCandidate::new("/a.ts", DefinitionKind::Definition, TextSpan::new(start, start + 1))
            .with_enclosing(TextSpan::new(0, end));

        let enclosing = SnippetExtractor::new(Box::new(EnclosingSpanExpansion), 0, 0)
            .extract_from_text(&candidate, text);
        assert_eq!(enclosing.code_snippet.lines().count(), 5);
        assert!(enclosing.code_snippet.ends_with("   5 + }\n"));

        let indentation = SnippetExtractor::new(Box::new(IndentationExpansion), 0, 0)
            .extract_from_text(&candidate, text);
        assert_eq!(indentation.code_snippet, "   1 > function f(\n");

        // Without an enclosing span the strategy degrades to indentation.
        let bare = DefinitionCandidate { enclosing: None, ..candidate };
        let fallback = SnippetExtractor::new(Box::new(EnclosingSpanExpansion), 0, 0)
            .extract_from_text(&bare, text);
        assert_eq!(fallback.code_snippet, indentation.code_snippet);
    }

    #[test]
    fn span_ending_after_newline_reaches_next_line() {
        let text = "let a = 1;\nlet b = 2;\nlet c = 3;\n";
        let candidate = DefinitionCandidate::new("/a.ts", DefinitionKind::Definition, TextSpan::new(0, 11));
        let result = SnippetExtractor::new(Box::new(IndentationExpansion), 0, 0)
            .extract_from_text(&candidate, text);
        assert_eq!(result.location, "Line 1, Column 1");
        assert_eq!(result.code_snippet, "   1 > let a = 1;\n   2 + let b = 2;\n");

        let token = DefinitionCandidate::new("/a.ts", DefinitionKind::Definition, TextSpan::new(4, 5));
        let result = SnippetExtractor::new(Box::new(IndentationExpansion), 0, 0)
            .extract_from_text(&token, text);
        assert_eq!(result.code_snippet, "   1 > let a = 1;\n");
    }

    #[test]
    fn wide_line_numbers_are_not_truncated() {
        let ls: Vec<&str> = std::iter::repeat_n("x", 12_000).collect();
        let snippet = render_snippet(&ls, 10_500, 10_500, 0, 0);
        assert_eq!(snippet, "10501 > x\n");
    }
}
