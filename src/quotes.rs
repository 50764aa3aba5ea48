use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{HarvestError, Result};
use crate::normalize::join_tags;
use crate::paginate::{PageResult, PageSource};
use crate::record::RawRecord;

pub const DEFAULT_URL: &str = "https://quotes.toscrape.com/api/quotes";

#[derive(Debug, Deserialize)]
struct QuotesPage {
    #[serde(default)]
    quotes: Vec<Quote>,
    #[serde(default)]
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct Quote {
    text: Option<String>,
    author: Option<Author>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

/// The quotes JSON API, one request per page.
pub struct QuotesApi {
    client: reqwest::Client,
    base_url: String,
}

impl QuotesApi {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| HarvestError::transport(base_url, e))?;
        Ok(QuotesApi {
            client,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl PageSource for QuotesApi {
    async fn fetch_page(&self, page: u32) -> Result<PageResult> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| HarvestError::transport(&self.base_url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HarvestError::transport(
                &self.base_url,
                format!("HTTP {} on page {}", status.as_u16(), page),
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| HarvestError::transport(&self.base_url, e))?;
        debug!(page, bytes = body.len(), "quotes page received");
        parse_page(&self.base_url, &body)
    }
}

/// Decode one API payload into raw records.
pub fn parse_page(url: &str, body: &str) -> Result<PageResult> {
    let page: QuotesPage = serde_json::from_str(body).map_err(|e| HarvestError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let records = page
        .quotes
        .into_iter()
        .map(|q| {
            RawRecord::new()
                .field("text", q.text)
                .field("author", q.author.and_then(|a| a.name))
                .field("tags", Some(join_tags(&q.tags)))
        })
        .collect();

    Ok(PageResult {
        records,
        has_next: page.has_next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_payload() {
        let body = r#"{
            "has_next": true,
            "page": 1,
            "quotes": [
                {"text": "“A”", "author": {"name": "X", "slug": "x"}, "tags": ["t1", "t2"]},
                {"text": "B", "author": {"name": "Y"}}
            ]
        }"#;
        let page = parse_page("fake://quotes", body).unwrap();
        assert!(page.has_next);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].get("text"), Some("“A”"));
        assert_eq!(page.records[0].get("tags"), Some("t1,t2"));
        assert_eq!(page.records[1].get("author"), Some("Y"));
        assert_eq!(page.records[1].get("tags"), Some(""));
    }

    #[test]
    fn missing_author_is_null() {
        let body = r#"{"quotes": [{"text": "C", "author": null, "tags": []}], "has_next": false}"#;
        let page = parse_page("fake://quotes", body).unwrap();
        assert!(!page.has_next);
        assert_eq!(page.records[0].get("author"), None);
    }

    #[test]
    fn bad_json_is_decode_error() {
        let err = parse_page("fake://quotes", "<html>oops</html>").unwrap_err();
        assert!(matches!(err, HarvestError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let api = QuotesApi::new("http://127.0.0.1:9/api/quotes", "harvest-test", Duration::from_millis(500))
            .unwrap();
        let err = api.fetch_page(1).await.unwrap_err();
        assert!(matches!(err, HarvestError::Transport { .. }));
    }

    #[tokio::test]
    async fn server_error_status_is_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let api = QuotesApi::new(&format!("http://{addr}/api/quotes"), "harvest-test", Duration::from_secs(5))
            .unwrap();
        match api.fetch_page(3).await.unwrap_err() {
            HarvestError::Transport { message, .. } => {
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("page 3"), "{message}");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
