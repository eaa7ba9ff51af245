// File: spacetraveling-content/src/model.rs
// Purpose: Entries, rich-text blocks and pages as delivered by the content source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One published post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    #[serde(default)]
    pub banner: Banner,
    #[serde(default)]
    pub content: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Banner {
    pub url: String,
}

/// A titled section of a post body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub heading: String,
    #[serde(default)]
    pub body: Vec<RichTextSpan>,
}

impl Block {
    pub fn new(heading: impl Into<String>, body: Vec<RichTextSpan>) -> Self {
        Self {
            heading: heading.into(),
            body,
        }
    }

    /// Plain-text projection of the body: span texts joined by a space.
    pub fn body_text(&self) -> String {
        as_text(&self.body)
    }
}

/// Structural kind of a rich-text fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpanKind {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Heading4,
    Heading5,
    Heading6,
    ListItem,
    OListItem,
    Preformatted,
    #[serde(other)]
    Other,
}

/// A block-level rich-text fragment with its plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichTextSpan {
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default)]
    pub text: String,
}

impl RichTextSpan {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::Paragraph,
            text: text.into(),
        }
    }

    pub fn list_item(text: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::ListItem,
            text: text.into(),
        }
    }
}

/// Joins the text of every span with a single space.
pub fn as_text(spans: &[RichTextSpan]) -> String {
    spans
        .iter()
        .map(|span| span.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Opaque continuation token for a paginated query.
///
/// For the Prismic source this is an absolute URL, but nothing outside the
/// source adapter looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a paginated query. `next_cursor == None` means there are no
/// further pages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Page {
    pub entries: Vec<Entry>,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn new(entries: Vec<Entry>, next_cursor: Option<Cursor>) -> Self {
        Self {
            entries,
            next_cursor,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}
