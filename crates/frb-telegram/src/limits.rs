//! Telegram message-length handling.

/// Cut a message down to the transport limit, ending with an ellipsis.
/// The cut lands on a char boundary so multibyte text never panics.
pub fn truncate_to_limit(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }

    let mut cut = limit.saturating_sub(3);
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
