use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::delay::Delay;
use crate::error::{CollectError, Result};
use crate::record::RawRecord;

/// A snapshot of one rendered element.
pub trait ElementHandle: Send + Sized {
    fn inner_text(&self) -> Option<String>;
    fn attribute(&self, name: &str) -> Option<String>;
    /// First descendant matching `selector`, if any.
    fn query_selector(&self, selector: &str) -> Option<Self>;
}

/// A rendering session over one lazily rendered page. Owned by one
/// collector run at a time.
#[async_trait]
pub trait RenderingSession: Send {
    type Element: ElementHandle;

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;
    /// Fails with `HarvestError::Timeout` if nothing matches in time.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    /// Surface more content, e.g. by scrolling the viewport.
    async fn reveal(&mut self) -> Result<()>;
    async fn query_all(&mut self, selector: &str) -> Result<Vec<Self::Element>>;
    async fn close(&mut self) -> Result<()>;
}

/// CSS selectors for a product tile and its fields.
#[derive(Debug, Clone)]
pub struct TileSelectors {
    pub item: String,
    pub title: String,
    pub currency: String,
    pub price: String,
    pub discount: String,
    pub rating_layer: String,
    pub reviews: String,
}

impl Default for TileSelectors {
    fn default() -> Self {
        TileSelectors {
            item: ".card-jfy-item-desc".into(),
            title: ".card-jfy-title".into(),
            currency: ".hp-mod-price-first-line .currency".into(),
            price: ".hp-mod-price-first-line .price".into(),
            discount: ".hp-mod-price-first-line .hp-mod-discount".into(),
            rating_layer: ".card-jfy-rating-layer.top-layer.checked".into(),
            reviews: ".card-jfy-ratings-comment".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealMode {
    /// Extract only from what is present after the last reveal.
    #[default]
    FinalPass,
    /// Extract after every reveal too; the sink drops repeats by natural key.
    EveryPass,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevealState {
    pub iterations: u32,
    pub reveals: u32,
}

#[derive(Debug, Default)]
pub struct RevealOutcome {
    pub records: Vec<RawRecord>,
    pub state: RevealState,
    /// The first item never appeared; `records` is empty.
    pub no_content_found: bool,
}

pub struct Collector {
    pub selectors: TileSelectors,
    pub max_scrolls: u32,
    pub mode: RevealMode,
    pub nav_timeout: Duration,
    pub selector_timeout: Duration,
    pub reveal_pause: Duration,
    delay: Box<dyn Delay>,
}

impl Collector {
    pub fn new(delay: Box<dyn Delay>, max_scrolls: u32) -> Self {
        Collector {
            selectors: TileSelectors::default(),
            max_scrolls,
            mode: RevealMode::FinalPass,
            nav_timeout: Duration::from_secs(30),
            selector_timeout: Duration::from_secs(15),
            reveal_pause: Duration::from_millis(800),
            delay,
        }
    }

    /// Navigate, reveal `max_scrolls` times, then extract every tile present.
    /// The session is closed on every exit path.
    pub async fn run<S: RenderingSession>(
        &self,
        mut session: S,
        url: &str,
    ) -> std::result::Result<RevealOutcome, CollectError> {
        let mut out = RevealOutcome::default();
        let result = self.collect(&mut session, url, &mut out).await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close rendering session");
        }
        match result {
            Ok(()) => Ok(out),
            Err(source) => Err(CollectError {
                collected: out.records.len(),
                reveals: out.state.reveals,
                source,
            }),
        }
    }

    async fn collect<S: RenderingSession>(
        &self,
        session: &mut S,
        url: &str,
        out: &mut RevealOutcome,
    ) -> Result<()> {
        let item = self.selectors.item.as_str();

        session.navigate(url, self.nav_timeout).await?;

        match session.wait_for_selector(item, self.selector_timeout).await {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                warn!(url, selector = item, "no items appeared; nothing to collect");
                out.no_content_found = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        while out.state.iterations < self.max_scrolls {
            session.reveal().await?;
            out.state.reveals += 1;
            self.delay.wait(self.reveal_pause).await;

            let visible = session.query_all(item).await?;
            out.state.iterations += 1;
            debug!(pass = out.state.iterations, visible = visible.len(), "revealed");
            if self.mode == RevealMode::EveryPass {
                out.records
                    .extend(visible.iter().map(|el| extract_tile(el, &self.selectors)));
            }
        }

        let present = session.query_all(item).await?;
        out.records
            .extend(present.iter().map(|el| extract_tile(el, &self.selectors)));

        info!(
            reveals = out.state.reveals,
            final_items = present.len(),
            records = out.records.len(),
            "reveal collection finished"
        );
        Ok(())
    }
}

/// Pull raw tile fields; any missing sub-element leaves its field null.
pub fn extract_tile<E: ElementHandle>(card: &E, sel: &TileSelectors) -> RawRecord {
    let text_of = |s: &str| card.query_selector(s).and_then(|el| el.inner_text());

    RawRecord::new()
        .field("title", text_of(&sel.title))
        .field("currency", text_of(&sel.currency))
        .field("price", text_of(&sel.price))
        .field("discount", text_of(&sel.discount))
        .field(
            "rating_style",
            card.query_selector(&sel.rating_layer)
                .and_then(|el| el.attribute("style")),
        )
        .field("reviews_text", text_of(&sel.reviews))
}
