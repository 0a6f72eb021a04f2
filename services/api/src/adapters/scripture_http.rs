//! services/api/src/adapters/scripture_http.rs
//!
//! This module contains the adapter for the external scripture passage API.
//! It implements the `ScriptureService` port from the `core` crate by
//! fetching whole chapters as JSON and flattening them to plain verse text.

use async_trait::async_trait;
use devotional_core::domain::{ChapterPassage, PassageVerse};
use devotional_core::ports::{PortError, PortResult, ScriptureService};
use serde::Deserialize;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct ApiChapterResponse {
    book: ApiBook,
    chapter: ApiChapter,
}

#[derive(Deserialize)]
struct ApiBook {
    name: String,
}

#[derive(Deserialize)]
struct ApiChapter {
    number: i32,
    // Items other than verses (headings, line breaks, footnote anchors)
    // also appear here, so each entry is inspected before it is decoded.
    content: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ApiVerse {
    number: i32,
    content: Vec<ApiVerseContent>,
}

/// Verse content mixes plain strings with structured markers such as
/// `{ "noteId": 3 }`; only the strings carry scripture text.
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiVerseContent {
    Text(String),
    Other(serde_json::Value),
}

fn flatten_chapter(response: ApiChapterResponse) -> ChapterPassage {
    let verses = response
        .chapter
        .content
        .into_iter()
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("verse"))
        .filter_map(|item| serde_json::from_value::<ApiVerse>(item).ok())
        .map(|verse| PassageVerse {
            number: verse.number,
            text: verse
                .content
                .into_iter()
                .filter_map(|piece| match piece {
                    ApiVerseContent::Text(text) => Some(text.trim().to_string()),
                    ApiVerseContent::Other(_) => None,
                })
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect();

    ChapterPassage {
        reference: format!("{} {}", response.book.name, response.chapter.number),
        verses,
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ScriptureService` against the public chapter
/// API.
#[derive(Clone)]
pub struct ScriptureApiAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl ScriptureApiAdapter {
    /// Creates a new `ScriptureApiAdapter`. `base_url` carries no trailing
    /// slash.
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }
}

//=========================================================================================
// `ScriptureService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScriptureService for ScriptureApiAdapter {
    async fn fetch_chapter(
        &self,
        translation_id: &str,
        book_id: &str,
        chapter: i32,
    ) -> PortResult<ChapterPassage> {
        let url = format!(
            "{}/api/{}/{}/{}.json",
            self.base_url, translation_id, book_id, chapter
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(format!(
                "No chapter at {}/{}/{}",
                translation_id, book_id, chapter
            )));
        }
        if !response.status().is_success() {
            return Err(PortError::Network(format!(
                "Scripture API returned status {}",
                response.status()
            )));
        }

        let body: ApiChapterResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed chapter payload: {}", e)))?;

        Ok(flatten_chapter(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHAPTER_JSON: &str = r#"{
        "translation": { "id": "eng_kjv" },
        "book": { "id": "JHN", "name": "John" },
        "chapter": {
            "number": 3,
            "content": [
                { "type": "heading", "content": ["Of the new birth"] },
                { "type": "verse", "number": 1,
                  "content": ["There was a man of the Pharisees,", { "noteId": 1 }, "named Nicodemus"] },
                { "type": "line_break" },
                { "type": "verse", "number": 2,
                  "content": ["The same came to Jesus by night"] }
            ],
            "footnotes": []
        }
    }"#;

    fn adapter(base_url: String) -> ScriptureApiAdapter {
        ScriptureApiAdapter::new(reqwest::Client::new(), base_url)
    }

    #[tokio::test]
    async fn fetches_and_flattens_a_chapter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/eng_kjv/JHN/3.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(CHAPTER_JSON, "application/json"),
            )
            .mount(&server)
            .await;

        let passage = adapter(server.uri())
            .fetch_chapter("eng_kjv", "JHN", 3)
            .await
            .unwrap();

        assert_eq!(passage.reference, "John 3");
        assert_eq!(passage.verses.len(), 2);
        assert_eq!(
            passage.verses[0],
            PassageVerse {
                number: 1,
                text: "There was a man of the Pharisees, named Nicodemus".to_string(),
            }
        );
        assert_eq!(passage.verses[1].number, 2);
    }

    #[tokio::test]
    async fn missing_chapter_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = adapter(server.uri())
            .fetch_chapter("eng_kjv", "JHN", 99)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = adapter(server.uri())
            .fetch_chapter("eng_kjv", "JHN", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Network(_)));
    }
}
