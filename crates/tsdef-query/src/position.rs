use std::path::Path;
use tsdef_core::error::QueryError;
use tsdef_core::text::read_source;
use tsdef_core::types::{SourcePosition, SymbolLocator, SymbolQuery};

/// Turn a query's line text and locator into a 1-based position in its file.
pub fn resolve_position(query: &SymbolQuery) -> Result<SourcePosition, QueryError> {
    let line_content = match query.line_content.as_deref() {
        Some(line) if !line.is_empty() => line,
        _ => return Err(QueryError::MissingLineContent),
    };
    let text = read_source(&query.file_path)
        .map_err(|e| QueryError::file_read(&query.file_path, e))?;
    locate_in_text(&query.file_path, &text, line_content, &query.locator)
}

/// Same as [`resolve_position`] over already loaded text.
///
/// The first line equal to `line_content` wins; a trailing `\r` is not part
/// of the compared line.
pub fn locate_in_text(
    path: &Path,
    text: &str,
    line_content: &str,
    locator: &SymbolLocator,
) -> Result<SourcePosition, QueryError> {
    if line_content.is_empty() {
        return Err(QueryError::MissingLineContent);
    }

    let (index, line) = text
        .lines()
        .enumerate()
        .find(|(_, line)| *line == line_content)
        .ok_or_else(|| QueryError::LineNotFound {
            path: path.to_path_buf(),
        })?;

    let column = match locator {
        SymbolLocator::Name(symbol) => {
            let byte = line
                .find(symbol.as_str())
                .filter(|_| !symbol.is_empty())
                .ok_or_else(|| QueryError::SymbolNotFound(symbol.clone()))?;
            line[..byte].chars().count() as u32 + 1
        }
        SymbolLocator::Column(column) => {
            let length = line.chars().count();
            if *column == 0 || *column as usize > length {
                return Err(QueryError::ColumnOutOfRange {
                    column: *column,
                    length,
                });
            }
            *column
        }
    };

    Ok(SourcePosition::new(index as u32 + 1, column))
}
