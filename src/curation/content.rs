//! Post content analysis: timestamps, tags, words and images.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::ScoutError;
use crate::ledger::{PostContent, parse_chain_time};

/// Markdown images, HTML `<img>` tags, and bare image URLs
static IMAGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)!\[.*?\]\((.*?)\)|<img.*?src=["'](.*?)["']|https?://\S+\.(?:jpg|jpeg|gif|png|webp|svg)"#,
    )
    .expect("image pattern is valid")
});

#[derive(Debug, Default, Deserialize)]
struct PostMetadata {
    /// `null` and absent both mean no tags
    #[serde(default)]
    tags: Option<Vec<serde_json::Value>>,
}

/// Parsed view of a post, built fresh for every evaluation
#[derive(Debug, Clone)]
pub struct PostSnapshot {
    pub author: String,
    pub permlink: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
    /// Lower-cased, in metadata order
    pub tags: Vec<String>,
}

impl PostSnapshot {
    pub fn parse(content: &PostContent) -> Result<Self, ScoutError> {
        let created_at = parse_chain_time(&content.created).ok_or_else(|| {
            ScoutError::MalformedContent(format!("bad created time: {:?}", content.created))
        })?;

        Ok(Self {
            author: content.author.clone(),
            permlink: content.permlink.clone(),
            created_at,
            body: content.body.clone(),
            tags: parse_tags(&content.json_metadata)?,
        })
    }

    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.body)
    }

    pub fn image_count(&self) -> usize {
        image_count(&self.body)
    }
}

/// Tags from `json_metadata`; empty metadata means no tags
pub fn parse_tags(json_metadata: &str) -> Result<Vec<String>, ScoutError> {
    if json_metadata.trim().is_empty() {
        return Ok(Vec::new());
    }

    let metadata: PostMetadata = serde_json::from_str(json_metadata)
        .map_err(|e| ScoutError::MalformedContent(format!("json_metadata: {}", e)))?;

    Ok(metadata
        .tags
        .unwrap_or_default()
        .iter()
        .filter_map(|t| t.as_str())
        .map(|t| t.to_lowercase())
        .collect())
}

/// Whitespace-delimited tokens longer than one UTF-16 code unit.
/// A lone astral character such as an emoji is two units and counts.
pub fn word_count(body: &str) -> usize {
    body.split_whitespace()
        .filter(|token| token.encode_utf16().count() > 1)
        .count()
}

/// Image references, non-overlapping, duplicates counted
pub fn image_count(body: &str) -> usize {
    IMAGE_PATTERN.find_iter(body).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_ignores_single_chars() {
        assert_eq!(word_count("a quick brown fox"), 3);
        assert_eq!(word_count("  I  am\n\there  "), 2);
        assert_eq!(word_count(""), 0);
        // Multi-byte characters count as one
        assert_eq!(word_count("é ég"), 1);
    }

    #[test]
    fn test_word_count_astral_characters() {
        // Emoji are surrogate pairs, so a lone one is a word
        assert_eq!(word_count("🚀 launch 😀"), 3);
        assert_eq!(word_count("x 🚀"), 1);
    }

    #[test]
    fn test_image_count_all_forms() {
        let body = "![cover](https://img.example/a.png)\n\
                    <img class=\"x\" src=\"https://img.example/b\">\n\
                    plain https://cdn.example/photo.JPEG here";
        assert_eq!(image_count(body), 3);
    }

    #[test]
    fn test_image_count_no_dedup() {
        let body = "https://x.example/a.gif https://x.example/a.gif";
        assert_eq!(image_count(body), 2);
        assert_eq!(image_count("no pictures at all"), 0);
    }

    #[test]
    fn test_tags_lowercased() {
        let tags = parse_tags(r#"{"tags":["Hive","NSFW",3],"app":"peakd"}"#).unwrap();
        assert_eq!(tags, vec!["hive", "nsfw"]);
    }

    #[test]
    fn test_empty_metadata_has_no_tags() {
        assert!(parse_tags("").unwrap().is_empty());
        assert!(parse_tags("{}").unwrap().is_empty());
    }

    #[test]
    fn test_null_tags_are_no_tags() {
        assert!(parse_tags(r#"{"tags":null,"app":"x"}"#).unwrap().is_empty());

        let mut content = PostContent::new("alice", "p", Utc::now(), "hello big world", &[]);
        content.json_metadata = r#"{"tags":null,"app":"x"}"#.to_string();
        let snapshot = PostSnapshot::parse(&content).unwrap();
        assert!(snapshot.tags.is_empty());
        assert_eq!(snapshot.word_count(), 3);
    }

    #[test]
    fn test_malformed_metadata() {
        let err = parse_tags("{tags:").unwrap_err();
        assert_eq!(err.kind(), "malformed_content");
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let content = PostContent {
            author: "alice".to_string(),
            permlink: "p".to_string(),
            created: "soon".to_string(),
            body: "text".to_string(),
            json_metadata: String::new(),
        };
        assert!(matches!(
            PostSnapshot::parse(&content),
            Err(ScoutError::MalformedContent(_))
        ));
    }

    #[test]
    fn test_parse_snapshot() {
        let created = Utc::now() - chrono::Duration::seconds(90);
        let content = PostContent::new("alice", "p", created, "hello big world", &["Life"]);

        let snapshot = PostSnapshot::parse(&content).unwrap();
        assert_eq!(snapshot.tags, vec!["life"]);
        assert_eq!(snapshot.word_count(), 3);
        assert!(snapshot.age_secs(Utc::now()) >= 89);
    }
}
