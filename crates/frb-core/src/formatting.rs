//! Text helpers shared by the notification formats.

/// Escape text for inclusion in Telegram-style HTML messages.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// HTML anchor used for both photo captions and plain-text notifications.
pub fn entry_anchor(link: &str, title: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_html(link), escape_html(title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn anchor_escapes_title_and_link() {
        let anchor = entry_anchor("https://example.org/a?x=1&y=2", "Tom & Jerry");
        assert_eq!(
            anchor,
            "<a href=\"https://example.org/a?x=1&amp;y=2\">Tom &amp; Jerry</a>"
        );
    }
}
