// Byte offsets of solang_parser::pt::Loc to line/column ranges

use crate::core::tree::TextRange;
use solang_parser::pt::Loc;

/// 1-based line and 0-based column of a byte offset.
pub fn offset_to_line_col(content: &str, offset: usize) -> (usize, usize) {
    let mut line_count = 1;
    let mut last_newline_offset = 0;
    for (i, byte) in content.bytes().enumerate() {
        if i >= offset {
            break;
        }
        if byte == b'\n' {
            line_count += 1;
            last_newline_offset = i + 1;
        }
    }
    let safe_offset = std::cmp::min(offset, content.len());
    let column = safe_offset.saturating_sub(last_newline_offset);
    (line_count, column)
}

/// Byte offsets at which each line starts.
pub fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(
            content
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        )
        .collect()
}

/// Same as [`offset_to_line_col`] using precomputed [`line_starts`].
pub fn offset_to_line_col_cached(offset: usize, line_starts: &[usize]) -> (usize, usize) {
    // Index of the last line starting at or before `offset`
    let line_index = line_starts
        .partition_point(|&start| start <= offset)
        .saturating_sub(1);
    let line_start_offset = line_starts.get(line_index).copied().unwrap_or(0);
    (line_index + 1, offset.saturating_sub(line_start_offset))
}

/// Range covered by a parser location; `None` for locations outside the file.
pub fn loc_to_range(loc: &Loc, line_starts: &[usize]) -> Option<TextRange> {
    let Loc::File(_, start, end) = loc else {
        return None;
    };
    let (start_line, start_column) = offset_to_line_col_cached(*start, line_starts);
    let (end_line, end_column) = offset_to_line_col_cached(*end, line_starts);
    Some(TextRange {
        start_line,
        start_column,
        end_line,
        end_column,
    })
}
