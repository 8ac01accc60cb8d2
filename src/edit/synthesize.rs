//! Turning raw generated text into a completion edit.
//!
//! Backends frequently echo the start of the cursor line, or end their
//! suggestion with the same text that already follows the cursor (a closing
//! paren, the rest of a call). The synthesized item strips the echoed prefix
//! and carries an extra deletion edit for the duplicated tail.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, InsertTextFormat, Position, Range, TextEdit,
};

use crate::edit::cursor::CursorContext;

/// Labels longer than this are cut from the whole suggestion
const LABEL_WIDTH: usize = 20;

const CLOSERS: [char; 4] = [')', '}', ']', '>'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedEdit {
    pub label: String,
    pub text: String,
    /// Where the inserted text ends in the buffer
    pub end: Position,
    /// Deletion of duplicated content right after the insertion
    pub cleanup: Option<TextEdit>,
}

impl SynthesizedEdit {
    pub fn into_completion_item(self) -> CompletionItem {
        CompletionItem {
            label: self.label,
            kind: Some(CompletionItemKind::TEXT),
            detail: Some(self.text.clone()),
            insert_text: Some(self.text),
            insert_text_format: Some(InsertTextFormat::PLAIN_TEXT),
            sort_text: Some("00000".to_string()),
            preselect: Some(true),
            additional_text_edits: self.cleanup.map(|edit| vec![edit]),
            ..Default::default()
        }
    }
}

/// Builds the edit for one raw suggestion at `position`
pub fn synthesize(raw: &str, context: &CursorContext, position: Position) -> SynthesizedEdit {
    let mut text = raw.trim();

    let echoed = context.last_line.trim();
    if let Some(rest) = text.strip_prefix(echoed) {
        text = rest.trim();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.last().copied().unwrap_or_default();
    let end_line = position.line + (lines.len() as u32 - 1);
    let mut end_character = last.chars().count() as u32;
    if end_line == position.line {
        end_character += position.character;
    }
    let end = Position::new(end_line, end_character);

    let first = lines.first().copied().unwrap_or_default();
    let label = if first.chars().count() <= LABEL_WIDTH && text.chars().count() > LABEL_WIDTH {
        text.chars()
            .take(LABEL_WIDTH)
            .collect::<String>()
            .trim()
            .to_string()
    } else {
        first.to_string()
    };

    let following = context.immediately_after.as_str();
    let overlap = overlap_len(text, following);
    let cleanup = if overlap > 0 {
        Some(deletion(end, overlap as u32))
    } else if starts_with_isolated_closer(following) {
        Some(deletion(end, 1))
    } else {
        None
    };

    SynthesizedEdit {
        label,
        text: text.to_string(),
        end,
        cleanup,
    }
}

/// Length in characters of the longest suffix of `text` (trailing spaces and
/// tabs ignored) that equals a prefix of `following`.
pub fn overlap_len(text: &str, following: &str) -> usize {
    if following.is_empty() {
        return 0;
    }

    let text: Vec<char> = text.trim_end_matches([' ', '\t']).chars().collect();
    let following: Vec<char> = following.chars().collect();
    let longest = text.len().min(following.len());

    (1..=longest)
        .rev()
        .find(|&len| text[text.len() - len..] == following[..len])
        .unwrap_or(0)
}

/// True when `following` starts with a closing delimiter that stands alone:
/// nothing after it, only blanks after it, or a line break right after it.
pub fn starts_with_isolated_closer(following: &str) -> bool {
    let mut chars = following.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !CLOSERS.contains(&first) {
        return false;
    }

    let rest = chars.as_str();
    rest.trim_start_matches([' ', '\t']).is_empty() || rest.starts_with(['\n', '\r'])
}

fn deletion(at: Position, len: u32) -> TextEdit {
    TextEdit::new(
        Range::new(at, Position::new(at.line, at.character + len)),
        String::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("foo(bar)", "bar) next", 4)]
    #[case("x", "", 0)]
    #[case("foo()", ")", 1)]
    #[case("call(a, b);  ", ");", 2)]
    #[case("abc", "xyz", 0)]
    #[case("a", "aaaa", 1)]
    fn overlap_len_finds_longest_match(
        #[case] text: &str,
        #[case] following: &str,
        #[case] expected: usize,
    ) {
        assert_eq!(overlap_len(text, following), expected);
    }

    #[rstest]
    #[case(")", true)]
    #[case(") extra", false)]
    #[case(")\n", true)]
    #[case("}  \t", true)]
    #[case("]\r\n", true)]
    #[case(">", true)]
    #[case("x)", false)]
    #[case("", false)]
    fn isolated_closer_rule(#[case] following: &str, #[case] expected: bool) {
        assert_eq!(starts_with_isolated_closer(following), expected);
    }

    fn context_with_trailing(immediately_after: &str) -> CursorContext {
        CursorContext {
            immediately_after: immediately_after.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn isolated_closer_emits_single_char_deletion() {
        let edit = synthesize("bar", &context_with_trailing(")"), Position::new(0, 4));

        assert_eq!(
            edit.cleanup,
            Some(TextEdit::new(
                Range::new(Position::new(0, 7), Position::new(0, 8)),
                String::new()
            ))
        );
    }

    #[test]
    fn non_isolated_closer_emits_no_deletion() {
        let edit = synthesize("bar", &context_with_trailing(") extra"), Position::new(0, 4));

        assert_eq!(edit.cleanup, None);
    }

    #[test]
    fn closer_followed_by_newline_emits_deletion() {
        let edit = synthesize("bar", &context_with_trailing(")\n"), Position::new(0, 4));

        assert_eq!(
            edit.cleanup.map(|e| e.range),
            Some(Range::new(Position::new(0, 7), Position::new(0, 8)))
        );
    }

    #[test]
    fn single_line_insertion_without_overlap() {
        let text = "function add(a, b) {\n  \n}";
        let context = CursorContext::new(text, 1, 2);

        let edit = synthesize("return a + b;", &context, Position::new(1, 2));

        assert_eq!(edit.text, "return a + b;");
        assert_eq!(edit.label, "return a + b;");
        assert_eq!(edit.end, Position::new(1, 15));
        assert_eq!(edit.cleanup, None);
    }

    #[test]
    fn trailing_brace_is_removed_after_insertion() {
        let context = CursorContext::new("}", 0, 0);

        let edit = synthesize("foo() {}", &context, Position::new(0, 0));

        assert_eq!(edit.text, "foo() {}");
        assert_eq!(
            edit.cleanup,
            Some(TextEdit::new(
                Range::new(Position::new(0, 8), Position::new(0, 9)),
                String::new()
            ))
        );
    }

    #[test]
    fn overlap_deletes_duplicated_tail() {
        let context = CursorContext::new("let x = foo(bar) next", 0, 12);

        let edit = synthesize("foo(bar)", &context, Position::new(0, 12));

        assert_eq!(
            edit.cleanup.map(|e| e.range),
            Some(Range::new(Position::new(0, 20), Position::new(0, 24)))
        );
    }

    #[test]
    fn echoed_line_prefix_is_stripped() {
        let context = CursorContext::new("    const total = ", 0, 18);

        let edit = synthesize("const total = items.length;", &context, Position::new(0, 18));

        assert_eq!(edit.text, "items.length;");
        assert_eq!(edit.end, Position::new(0, 31));
    }

    #[test]
    fn multi_line_insertion_ends_on_last_line() {
        let context = CursorContext::new("if (ok) {", 0, 9);

        let edit = synthesize("\n  run();\n  done();\n}", &context, Position::new(0, 9));

        assert_eq!(edit.text, "run();\n  done();\n}");
        assert_eq!(edit.end, Position::new(2, 1));
    }

    #[test]
    fn long_suggestion_with_short_first_line_gets_truncated_label() {
        let context = CursorContext::default();

        let edit = synthesize("if x {\n    return something_long;\n}", &context, Position::new(0, 0));

        assert_eq!(edit.label, "if x {\n    return so");
    }

    #[test]
    fn long_first_line_is_used_as_label() {
        let context = CursorContext::default();
        let raw = "const result = computeEverything(a, b);";

        let edit = synthesize(raw, &context, Position::new(0, 0));

        assert_eq!(edit.label, raw);
    }

    #[test]
    fn truncated_label_is_trimmed() {
        let context = CursorContext::default();

        let edit = synthesize("abc\n                 zzzz", &context, Position::new(0, 0));

        assert_eq!(edit.label, "abc");
    }

    #[test]
    fn completion_item_carries_cleanup_edit() {
        let context = CursorContext::new(")", 0, 0);

        let item = synthesize("foo(", &context, Position::new(0, 0)).into_completion_item();

        assert_eq!(item.label, "foo(");
        assert_eq!(item.insert_text.as_deref(), Some("foo("));
        assert_eq!(item.kind, Some(CompletionItemKind::TEXT));
        assert_eq!(item.preselect, Some(true));
        assert_eq!(item.additional_text_edits.map(|edits| edits.len()), Some(1));
    }
}
