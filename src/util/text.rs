use std::collections::HashSet;

/// Returns the smallest leading-whitespace width over all non-blank lines
pub fn min_indent(text: &str) -> usize {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0)
}

/// Prefixes every non-blank line with `width` spaces
pub fn indent(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let padding = " ".repeat(width);
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{}{}", padding, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes duplicates, keeping the first occurrence of each item
pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
