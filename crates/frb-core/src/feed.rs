use feed_rs::parser;
use sha2::{Digest, Sha256};

use crate::{
    domain::FeedEntry,
    errors::Error,
    Result,
};

/// Parse a syndication document (RSS or Atom) into entries, preserving
/// origin order: the first entry is the most recent.
pub fn parse(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes).map_err(|e| Error::Parse(e.to_string()))?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let existing_id = if entry.id.trim().is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = match existing_id {
                Some(id) => id.trim().to_string(),
                None => synthetic_guid(&link, &title, published.map(|p| p.timestamp())),
            };

            FeedEntry {
                guid,
                title,
                link,
                published,
                summary,
            }
        })
        .collect();

    Ok(entries)
}

/// Stable fallback identity for feeds that omit entry ids. Deduplication
/// depends on this being a pure function of the entry payload.
fn synthetic_guid(link: &str, title: &str, published: Option<i64>) -> String {
    let input = format!(
        "{}|{}|{}",
        link,
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example</title>
  <item>
    <guid>tag:example.org,2026:2</guid>
    <title>Second post</title>
    <link>https://example.org/2</link>
    <description>Newest entry</description>
  </item>
  <item>
    <guid>tag:example.org,2026:1</guid>
    <title>First post</title>
    <link>https://example.org/1</link>
  </item>
</channel></rss>"#;

    #[test]
    fn parses_entries_in_feed_order() {
        let entries = parse(RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].guid, "tag:example.org,2026:2");
        assert_eq!(entries[0].title, "Second post");
        assert_eq!(entries[0].link, "https://example.org/2");
        assert_eq!(entries[0].summary.as_deref(), Some("Newest entry"));
        assert_eq!(entries[1].guid, "tag:example.org,2026:1");
    }

    #[test]
    fn entries_without_guid_get_a_stable_synthetic_one() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item><title>No id here</title><link>https://example.org/a</link></item>
</channel></rss>"#;

        let first = parse(rss.as_bytes()).unwrap();
        let second = parse(rss.as_bytes()).unwrap();
        assert!(!first[0].guid.is_empty());
        assert_eq!(first[0].guid, second[0].guid);
    }

    #[test]
    fn distinct_idless_entries_get_distinct_guids() {
        let a = synthetic_guid("https://example.org/a", "One", None);
        let b = synthetic_guid("https://example.org/b", "One", None);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(parse(b"<not a feed"), Err(Error::Parse(_))));
    }
}
