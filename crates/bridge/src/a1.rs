//! A1-notation helpers for grid-addressed ranges.
//!
//! Column letters use base-26 with no zero digit: A..Z, AA, AB, ...
//! Ranges are the subset of A1 notation the sync paths emit, e.g.
//! `A1:1` (header row), `A2:C` (open-ended clear), `A2:C5001` (data read),
//! `Pairs!K4:K4` (single cell) and `History!A:H` (append target).

/// Convert a 1-based column count to its letter sequence (1 -> A, 27 -> AA).
pub fn column_letters(n: usize) -> String {
    let mut col = String::new();
    let mut x = n.max(1);
    while x > 0 {
        let r = (x - 1) % 26;
        col.insert(0, (b'A' + r as u8) as char);
        x = (x - 1) / 26;
    }
    col
}

/// Convert a letter sequence back to its 1-based column index (A -> 1).
pub fn column_index(letters: &str) -> usize {
    letters
        .bytes()
        .filter(u8::is_ascii_uppercase)
        .fold(0, |acc, b| acc * 26 + (b - b'A' + 1) as usize)
}

/// One endpoint of a parsed range; either part may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    /// 1-based column, `None` for row-only references like `1`.
    pub col: Option<usize>,
    /// 1-based row, `None` for column-only references like `A`.
    pub row: Option<usize>,
}

/// A parsed A1 range with an optional tab prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRef {
    pub tab: Option<String>,
    pub start: CellRef,
    pub end: Option<CellRef>,
}

/// Parse an A1-style range string. Returns `None` for strings that name
/// neither a column nor a row. Rows are 1-based; a literal row 0 is
/// rejected rather than treated as open.
pub fn parse_range(range: &str) -> Option<RangeRef> {
    let (tab, cells) = match range.split_once('!') {
        Some((t, rest)) => (Some(t.to_string()), rest),
        None => (None, range),
    };

    let (start_str, end_str) = match cells.split_once(':') {
        Some((s, e)) => (s, Some(e)),
        None => (cells, None),
    };

    let start = parse_cell(start_str)?;
    let end = match end_str {
        Some(e) => Some(parse_cell(e)?),
        None => None,
    };

    Some(RangeRef { tab, start, end })
}

fn parse_cell(cell: &str) -> Option<CellRef> {
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);

    if !letters.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let col = (!letters.is_empty()).then(|| column_index(letters));
    let row = match digits {
        "" => None,
        d => match d.parse::<usize>() {
            Ok(r) if r > 0 => Some(r),
            _ => return None,
        },
    };

    if col.is_none() && row.is_none() {
        return None;
    }
    Some(CellRef { col, row })
}
