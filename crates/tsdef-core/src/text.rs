//! Line/column bookkeeping for source text.
//!
//! Lines are delimited by `\n` only. A `\r` preceding the newline stays part
//! of the line, and tabs count as a single column.

use std::path::Path;

/// Line start table over a borrowed source string.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Number of lines, counting the (possibly empty) segment after the last `\n`.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Raw text of a 0-based line, without its `\n`.
    pub fn line(&self, line: usize) -> Option<&'a str> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        Some(&self.text[start..end])
    }

    pub fn lines(&self) -> impl Iterator<Item = &'a str> + '_ {
        (0..self.line_count()).filter_map(|i| self.line(i))
    }

    /// 0-based line containing `offset`, clamped to the text.
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.text.len());
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    /// 0-based (line, character) of a byte offset. Offsets inside a
    /// multi-byte character snap back to its start.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let start = self.line_starts[line];
        let mut end = offset;
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }
        (line, self.text[start..end].chars().count())
    }

    /// Byte offset of a 0-based (line, character) pair. Characters past the
    /// end of the line clamp to the line end.
    pub fn offset(&self, line: usize, character: usize) -> Option<usize> {
        let start = *self.line_starts.get(line)?;
        let text = self.line(line)?;
        let within = text
            .char_indices()
            .nth(character)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        Some(start + within)
    }

    /// Byte offset of a 0-based (line, UTF-16 code unit) pair, the encoding
    /// language servers use by default.
    pub fn offset_utf16(&self, line: usize, utf16_col: u32) -> Option<usize> {
        let start = *self.line_starts.get(line)?;
        let text = self.line(line)?;
        let mut units = 0u32;
        for (i, ch) in text.char_indices() {
            if units >= utf16_col {
                return Some(start + i);
            }
            units += ch.len_utf16() as u32;
        }
        Some(start + text.len())
    }

    /// UTF-16 column of a 0-based (line, character) pair.
    pub fn utf16_col(&self, line: usize, character: usize) -> Option<u32> {
        let text = self.line(line)?;
        Some(
            text.chars()
                .take(character)
                .map(|c| c.len_utf16() as u32)
                .sum(),
        )
    }
}

/// Read a source file. Invalid UTF-8 sequences become U+FFFD instead of
/// failing the read.
pub fn read_source(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Length of the leading whitespace run, in characters.
pub fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.ts");
        std::fs::write(&path, b"// caf\xe9\nconst a = 1;\n").unwrap();
        let text = read_source(&path).unwrap();
        assert_eq!(text, "// caf\u{FFFD}\nconst a = 1;\n");
        assert!(read_source(&dir.path().join("missing.ts")).is_err());
    }

    #[test]
    fn splits_on_newline_only() {
        let index = LineIndex::new("a\r\nb\n\nc");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.line(0), Some("a\r"));
        assert_eq!(index.line(1), Some("b"));
        assert_eq!(index.line(2), Some(""));
        assert_eq!(index.line(3), Some("c"));
        assert_eq!(index.line(4), None);
    }

    #[test]
    fn trailing_newline_yields_empty_last_line() {
        let index = LineIndex::new("x\n");
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.line(1), Some(""));
    }

    #[test]
    fn offset_and_line_col_agree() {
        let text = "const a = 1;\nfunction foo() {}\n";
        let index = LineIndex::new(text);
        let offset = text.find("foo").unwrap();
        assert_eq!(index.line_col(offset), (1, 9));
        assert_eq!(index.offset(1, 9), Some(offset));
    }

    #[test]
    fn columns_count_characters_not_bytes() {
        let text = "const é = \"ü\"; foo();";
        let index = LineIndex::new(text);
        let offset = text.find("foo").unwrap();
        let (_, col) = index.line_col(offset);
        assert_eq!(col, text[..offset].chars().count());
        assert_eq!(index.offset(0, col), Some(offset));
    }

    #[test]
    fn utf16_conversion_handles_astral_characters() {
        let text = "let s = '😀'; bar";
        let index = LineIndex::new(text);
        let offset = text.find("bar").unwrap();
        let (_, col) = index.line_col(offset);
        let utf16 = index.utf16_col(0, col).unwrap();
        assert_eq!(utf16 as usize, col + 1);
        assert_eq!(index.offset_utf16(0, utf16), Some(offset));
    }

    #[test]
    fn offsets_past_end_are_clamped() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.line_col(99), (1, 2));
        assert_eq!(index.offset(0, 99), Some(2));
        assert_eq!(index.offset(7, 0), None);
    }

    #[test]
    fn indentation_counts_tabs_and_spaces_alike() {
        assert_eq!(indentation("    x"), 4);
        assert_eq!(indentation("\t\tx"), 2);
        assert_eq!(indentation("\t  x"), 3);
        assert_eq!(indentation("x"), 0);
        assert!(is_blank("  \t\r"));
        assert!(!is_blank("  }"));
    }
}
