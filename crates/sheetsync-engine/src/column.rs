//! A1-style cell addressing.

/// 0-based column index to spreadsheet letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Spreadsheet letters to a 0-based column index. Case-insensitive.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }
    Some(n - 1)
}

/// Sheet name as it must appear before `!` in a range.
pub fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Row segment `Sheet!B5:C5`, or a single cell `Sheet!B5` when one column wide.
pub fn row_range(sheet: &str, first_col: usize, last_col: usize, row: u32) -> String {
    let sheet = quote_sheet_name(sheet);
    let first = column_letter(first_col);
    if first_col == last_col {
        format!("{sheet}!{first}{row}")
    } else {
        format!("{sheet}!{first}{row}:{}{row}", column_letter(last_col))
    }
}

/// Split `Sheet!B5:C5` into (first column index, row). Only the start cell is read.
pub fn parse_range_start(range: &str) -> Option<(usize, u32)> {
    let cells = match range.rsplit_once('!') {
        Some((_, cells)) => cells,
        None => range,
    };
    let start = cells.split(':').next()?;
    let split = start.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = start.split_at(split);
    Some((column_index(letters)?, digits.parse().ok()?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn letters_for_known_indices() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn index_inverts_letter() {
        for i in [0usize, 1, 25, 26, 51, 52, 701, 702, 16383] {
            assert_eq!(column_index(&column_letter(i)), Some(i));
        }
        assert_eq!(column_index("ab"), Some(27));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn sheet_names_are_quoted_when_needed() {
        assert_eq!(quote_sheet_name("Sheet1"), "Sheet1");
        assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
    }

    #[test]
    fn row_range_formats_segments() {
        assert_eq!(row_range("Sheet", 4, 5, 5), "Sheet!E5:F5");
        assert_eq!(row_range("Sheet", 1, 1, 12), "Sheet!B12");
        assert_eq!(row_range("Campaign Log", 0, 0, 2), "'Campaign Log'!A2");
    }

    #[test]
    fn parse_range_start_reads_first_cell() {
        assert_eq!(parse_range_start("Sheet!E5:F5"), Some((4, 5)));
        assert_eq!(parse_range_start("'My Sheet'!AA10"), Some((26, 10)));
        assert_eq!(parse_range_start("Sheet!5"), None);
    }
}
