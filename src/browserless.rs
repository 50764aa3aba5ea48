use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{HarvestError, Result};
use crate::reveal::{ElementHandle, RenderingSession};

/// Pause between injected scroll steps.
const SCROLL_PAUSE_MS: u64 = 300;

/// An element cut out of a rendered document. Holds its outer HTML and
/// re-parses on access, so it can cross await points.
#[derive(Debug, Clone)]
pub struct HtmlElement {
    html: String,
}

impl HtmlElement {
    pub fn from_html(html: impl Into<String>) -> Self {
        HtmlElement { html: html.into() }
    }

    fn with_element<T>(&self, f: impl FnOnce(ElementRef<'_>) -> Option<T>) -> Option<T> {
        let fragment = Html::parse_fragment(&self.html);
        let el = fragment.root_element().children().find_map(ElementRef::wrap)?;
        f(el)
    }
}

impl ElementHandle for HtmlElement {
    fn inner_text(&self) -> Option<String> {
        self.with_element(|el| Some(el.text().collect::<String>()))
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.with_element(|el| el.value().attr(name).map(String::from))
    }

    fn query_selector(&self, selector: &str) -> Option<Self> {
        let selector = Selector::parse(selector).ok()?;
        self.with_element(|el| el.select(&selector).next().map(|m| HtmlElement::from_html(m.html())))
    }
}

/// Every element in `document` matching `selector`.
pub fn select_all(document: &str, selector: &str) -> Result<Vec<HtmlElement>> {
    let parsed = Selector::parse(selector).map_err(|_| HarvestError::Selector(selector.to_string()))?;
    let doc = Html::parse_document(document);
    Ok(doc
        .select(&parsed)
        .map(|el| HtmlElement::from_html(el.html()))
        .collect())
}

/// Rendering session over a Browserless `/content` endpoint.
///
/// Browserless renders each request in a fresh page, so scroll position is
/// kept here and replayed as an injected script on the next query.
pub struct BrowserlessSession {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    url: Option<String>,
    nav_timeout: Duration,
    selector_timeout: Duration,
    scrolls: u32,
    scroll_step: u32,
    settle: Duration,
    viewport: (u32, u32),
    closed: bool,
}

impl BrowserlessSession {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| HarvestError::transport(base_url, e))?;

        Ok(BrowserlessSession {
            client,
            endpoint: format!("{}/content", base_url.trim_end_matches('/')),
            token: token.map(String::from),
            url: None,
            nav_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(15),
            scrolls: 0,
            scroll_step: 2500,
            settle: Duration::from_millis(1500),
            viewport: (1280, 900),
            closed: false,
        })
    }

    pub fn scroll_step(mut self, px: u32) -> Self {
        self.scroll_step = px;
        self
    }

    /// Extra wait after the injected scrolls have finished.
    pub fn settle(mut self, wait: Duration) -> Self {
        self.settle = wait;
        self
    }

    fn render_body(&self, url: &str, extra: Value) -> Value {
        let mut body = json!({
            "url": url,
            "gotoOptions": {
                "timeout": self.nav_timeout.as_millis() as u64,
                "waitUntil": "domcontentloaded",
            },
            "viewport": { "width": self.viewport.0, "height": self.viewport.1 },
        });
        if let (Some(obj), Value::Object(extra)) = (body.as_object_mut(), extra) {
            obj.extend(extra);
        }
        body
    }

    fn scroll_script(&self) -> String {
        format!(
            "(async () => {{ for (let i = 0; i < {}; i++) {{ window.scrollBy(0, {}); \
             await new Promise(r => setTimeout(r, {})); }} }})();",
            self.scrolls, self.scroll_step, SCROLL_PAUSE_MS
        )
    }

    /// Time the scroll script needs to run to completion, plus settle.
    fn settle_wait(&self) -> Duration {
        Duration::from_millis(SCROLL_PAUSE_MS * u64::from(self.scrolls)) + self.settle
    }

    /// Replay the reveals, let lazy content land, and require `selector` to
    /// be present before the document is captured.
    fn query_body(&self, url: &str, selector: &str) -> Value {
        self.render_body(
            url,
            json!({
                "addScriptTag": [{ "content": self.scroll_script() }],
                "waitForTimeout": self.settle_wait().as_millis() as u64,
                "waitForSelector": {
                    "selector": selector,
                    "timeout": self.selector_timeout.as_millis() as u64,
                },
            }),
        )
    }

    fn target(&self) -> Result<&str> {
        if self.closed {
            return Err(HarvestError::SessionClosed);
        }
        self.url
            .as_deref()
            .ok_or_else(|| HarvestError::transport(&self.endpoint, "session has not navigated"))
    }

    async fn render(&self, body: Value, what: &str, timeout: Duration) -> Result<String> {
        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(ref token) = self.token {
            req = req.query(&[("token", token)]);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                HarvestError::Timeout {
                    what: what.to_string(),
                    after: timeout,
                }
            } else {
                HarvestError::transport(&self.endpoint, e)
            }
        })?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| HarvestError::transport(&self.endpoint, e))?;
        debug!(status, bytes = text.len(), what, "browserless render");
        classify(&self.endpoint, status, text, what, timeout)
    }
}

/// Map a Browserless response to content, a readiness timeout, or a
/// transport failure.
fn classify(endpoint: &str, status: u16, body: String, what: &str, timeout: Duration) -> Result<String> {
    if (200..300).contains(&status) {
        return Ok(body);
    }
    if status == 408 || body.contains("TimeoutError") || body.contains("Timeout exceeded") {
        return Err(HarvestError::Timeout {
            what: what.to_string(),
            after: timeout,
        });
    }
    Err(HarvestError::transport(
        endpoint,
        format!("HTTP {status}: {}", body.chars().take(200).collect::<String>()),
    ))
}

#[async_trait]
impl RenderingSession for BrowserlessSession {
    type Element = HtmlElement;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        if self.closed {
            return Err(HarvestError::SessionClosed);
        }
        self.nav_timeout = timeout;
        self.scrolls = 0;
        let body = self.render_body(url, json!({}));
        self.render(body, url, timeout).await?;
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let url = self.target()?.to_string();
        self.selector_timeout = timeout;
        let body = self.render_body(
            &url,
            json!({ "waitForSelector": { "selector": selector, "timeout": timeout.as_millis() as u64 } }),
        );
        self.render(body, selector, timeout).await.map(|_| ())
    }

    async fn reveal(&mut self) -> Result<()> {
        self.target()?;
        self.scrolls += 1;
        Ok(())
    }

    async fn query_all(&mut self, selector: &str) -> Result<Vec<HtmlElement>> {
        let url = self.target()?.to_string();
        let body = self.query_body(&url, selector);
        let html = self.render(body, selector, self.selector_timeout).await?;
        select_all(&html, selector)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.url = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Row, TileRow};
    use crate::reveal::{extract_tile, TileSelectors};

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/tiles.html").unwrap()
    }

    #[test]
    fn element_text_and_attributes() {
        let el = HtmlElement::from_html(
            r#"<div class="card"><span class="t">Hello <b>world</b></span><i style="width: 50%"></i></div>"#,
        );
        assert_eq!(el.attribute("class").as_deref(), Some("card"));
        let t = el.query_selector(".t").unwrap();
        assert_eq!(t.inner_text().as_deref(), Some("Hello world"));
        let stars = el.query_selector("i").unwrap();
        assert_eq!(stars.attribute("style").as_deref(), Some("width: 50%"));
        assert!(el.query_selector(".missing").is_none());
        assert!(el.query_selector("[[bad").is_none());
    }

    #[test]
    fn invalid_selector_is_error() {
        let err = select_all("<p></p>", "[[bad").unwrap_err();
        assert!(matches!(err, HarvestError::Selector(_)));
    }

    #[test]
    fn fixture_tiles_normalize() {
        let sel = TileSelectors::default();
        let cards = select_all(&fixture(), &sel.item).unwrap();
        assert_eq!(cards.len(), 4);

        let rows: Vec<TileRow> = cards
            .iter()
            .map(|c| TileRow::from_raw(&extract_tile(c, &sel)))
            .collect();

        assert_eq!(rows[0].title.as_deref(), Some("Wireless Optical Mouse 2.4GHz"));
        assert_eq!(rows[0].currency.as_deref(), Some("₱"));
        assert_eq!(rows[0].price.as_deref(), Some("299.00"));
        assert_eq!(rows[0].discount.as_deref(), Some("-40%"));
        assert_eq!(rows[0].rating, Some(4.8));
        assert_eq!(rows[0].reviews, Some(1234));

        // no rating layer, no reviews
        assert_eq!(rows[1].rating, None);
        assert_eq!(rows[1].reviews, None);
        assert_eq!(rows[1].discount, None);

        // price only
        assert_eq!(rows[2].title, None);
        assert!(rows[2].has_identity());

        // neither title nor price
        assert!(!rows[3].has_identity());
    }

    #[test]
    fn classify_statuses() {
        let t = Duration::from_secs(15);
        assert_eq!(classify("e", 200, "<html/>".into(), "x", t).unwrap(), "<html/>");
        assert!(classify("e", 408, String::new(), "x", t).unwrap_err().is_timeout());
        assert!(classify("e", 500, "TimeoutError: waiting for selector".into(), "x", t)
            .unwrap_err()
            .is_timeout());
        assert!(matches!(
            classify("e", 503, "busy".into(), "x", t).unwrap_err(),
            HarvestError::Transport { .. }
        ));
    }

    #[test]
    fn render_body_merges_options() {
        let mut session = BrowserlessSession::new("http://localhost:3000/", Some("tok")).unwrap();
        session.scrolls = 3;
        assert_eq!(session.endpoint, "http://localhost:3000/content");

        let body = session.render_body("https://shop.test/", json!({ "waitForTimeout": 10 }));
        assert_eq!(body["url"], "https://shop.test/");
        assert_eq!(body["gotoOptions"]["waitUntil"], "domcontentloaded");
        assert_eq!(body["viewport"]["width"], 1280);
        assert_eq!(body["waitForTimeout"], 10);
        assert!(session.scroll_script().contains("i < 3"));
        assert!(session.scroll_script().contains("scrollBy(0, 2500)"));
    }

    #[test]
    fn query_waits_out_the_scroll_script() {
        let mut session = BrowserlessSession::new("http://localhost:3000", None)
            .unwrap()
            .settle(Duration::from_millis(500));
        session.scrolls = 10;

        let body = session.query_body("https://shop.test/", ".card");
        let script_ms = 10 * SCROLL_PAUSE_MS;
        let wait_ms = body["waitForTimeout"].as_u64().unwrap();
        assert!(wait_ms >= script_ms, "waitForTimeout {wait_ms}ms < script {script_ms}ms");
        assert_eq!(wait_ms, script_ms + 500);
        assert!(body["addScriptTag"][0]["content"].as_str().unwrap().contains("i < 10"));
    }

    #[test]
    fn query_requires_selector_presence() {
        let mut session = BrowserlessSession::new("http://localhost:3000", None).unwrap();
        session.selector_timeout = Duration::from_secs(7);

        let body = session.query_body("https://shop.test/", ".card-jfy-item-desc");
        assert_eq!(body["waitForSelector"]["selector"], ".card-jfy-item-desc");
        assert_eq!(body["waitForSelector"]["timeout"], 7000);
    }

    #[tokio::test]
    async fn closed_session_rejects_calls() {
        let mut session = BrowserlessSession::new("http://localhost:3000", None).unwrap();
        session.close().await.unwrap();
        assert!(matches!(session.reveal().await, Err(HarvestError::SessionClosed)));
        assert!(matches!(
            session.navigate("https://shop.test/", Duration::from_secs(1)).await,
            Err(HarvestError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn reveal_before_navigate_fails() {
        let mut session = BrowserlessSession::new("http://localhost:3000", None).unwrap();
        assert!(session.reveal().await.is_err());
    }
}
