//! Splitting a buffer around the cursor

/// Buffer content around a cursor position.
///
/// Columns are counted in characters, never bytes, so a cursor inside a
/// multi-byte character cannot split it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorContext {
    /// All lines up to the cursor line, the cursor line cut at the cursor
    pub before: String,
    /// All lines after the cursor line
    pub after: String,
    /// The cursor line up to the cursor
    pub last_line: String,
    /// Character right before the cursor, if any
    pub last_char: Option<char>,
    /// Rest of the cursor line after the cursor
    pub immediately_after: String,
}

impl CursorContext {
    /// Builds the context for `(line, column)` in `text`.
    ///
    /// A line past the end is clamped to the last line; a column at or past
    /// the end of the line keeps the whole line as "before".
    pub fn new(text: &str, line: u32, column: u32) -> Self {
        let lines: Vec<&str> = text.split('\n').collect();
        let line = (line as usize).min(lines.len() - 1);
        let column = column as usize;
        let current = lines[line];

        let (head, tail) = match byte_offset(current, column) {
            Some(offset) => current.split_at(offset),
            None => (current, ""),
        };

        let mut before_lines: Vec<&str> = lines[..line].to_vec();
        before_lines.push(head);
        let before = before_lines.join("\n");

        let after = if line + 1 < lines.len() {
            lines[line + 1..].join("\n")
        } else {
            String::new()
        };

        Self {
            last_char: before.chars().next_back(),
            before,
            after,
            last_line: head.to_string(),
            immediately_after: tail.to_string(),
        }
    }

    /// Everything after the cursor: the rest of the cursor line followed by
    /// the following lines.
    pub fn after_cursor(&self) -> String {
        match (self.immediately_after.is_empty(), self.after.is_empty()) {
            (_, true) => self.immediately_after.clone(),
            (true, false) => self.after.clone(),
            (false, false) => format!("{}\n{}", self.immediately_after, self.after),
        }
    }
}

/// Byte offset of the `column`-th character, if it lies strictly inside `line`
fn byte_offset(line: &str, column: usize) -> Option<usize> {
    line.char_indices().nth(column).map(|(offset, _)| offset)
}
