//! Prompt text shared by the HTTP backends

pub fn completion_system_prompt(language_id: &str) -> String {
    format!(
        "You are a {language_id} code completion assistant. Complete the code at the cursor position.

Rules:
- Output ONLY the code that should be inserted at the cursor
- Do NOT include any code that already exists before or after the cursor
- Do NOT add explanations, comments, or markdown formatting
- Do NOT repeat existing code
- Do NOT include comments
- Generate syntactically correct {language_id} code"
    )
}

pub fn completion_user_prompt(file_path: &str, content_before: &str, content_after: &str) -> String {
    format!(
        "File: {file_path}\n\nCode before cursor:\n{content_before}\n\n<CURSOR>\n\nCode after cursor:\n{content_after}"
    )
}

pub fn chat_system_prompt(language_id: &str) -> String {
    format!(
        "You are an AI programming assistant specialized in {language_id}.

Rules:
- Output ONLY the corrected/improved code that should replace the selection
- DO NOT include explanations, markdown formatting, or code block delimiters
- DO NOT include any text before or after the code
- DO NOT add extra comments unless specifically requested
- Preserve the original indentation and formatting style
- Generate syntactically correct {language_id} code
- Follow the user's requirements precisely
- If diagnostics are provided, fix them in the code
- Remove any implementation comments after addressing them"
    )
}

pub fn chat_user_prompt(language_id: &str, file_path: &str, content: &str, instruction: &str) -> String {
    format!(
        "File: {file_path}\nLanguage: {language_id}\n\nSelected code:\n{content}\n\nTask: {instruction}"
    )
}

/// Strips the `file://` scheme so prompts show a plain path
pub fn display_path(file_path: &str) -> &str {
    file_path.strip_prefix("file://").unwrap_or(file_path)
}
