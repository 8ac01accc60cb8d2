//! Pulling code out of fenced chat answers

use regex::Regex;

/// Returns the body of the first fenced block tagged with `language_id`.
///
/// A `// FILEPATH: <path>` marker line (the form the chat prompt asks for) is
/// dropped. The result ends with a newline; `None` when no block is found.
pub fn extract_code_block(file_path: &str, text: &str, language_id: &str) -> Option<String> {
    let pattern = format!(r"(?s)```{}(.*?)```", regex::escape(language_id));
    let re = Regex::new(&pattern).ok()?;
    let block = re.captures(text)?.get(1)?.as_str();

    let path = file_path.strip_prefix("file://").unwrap_or(file_path);
    let marker = format!("// FILEPATH: {}\n", path);
    let block = block.replacen(&marker, "", 1);

    // The fence line and the line holding the closing fence are not content
    let lines: Vec<&str> = block.split('\n').collect();
    if lines.len() < 2 {
        return None;
    }

    Some(format!("{}\n", lines[1..lines.len() - 1].join("\n")))
}
