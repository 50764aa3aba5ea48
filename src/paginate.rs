use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::delay::Delay;
use crate::error::{Result, RunError};
use crate::record::RawRecord;

/// One fetched page: its records and whether another page follows.
#[derive(Debug, Default)]
pub struct PageResult {
    pub records: Vec<RawRecord>,
    pub has_next: bool,
}

/// A paged data source. Must fail with `HarvestError::Transport` when a page
/// cannot be retrieved.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<PageResult>;
}

#[derive(Debug, Clone, Copy)]
struct PageCursor {
    page: u32,
    has_next: bool,
}

pub struct Paginator {
    delay: Box<dyn Delay>,
    page_delay: Duration,
    max_pages: Option<u32>,
}

impl Paginator {
    pub fn new(delay: Box<dyn Delay>, page_delay: Duration) -> Self {
        Paginator {
            delay,
            page_delay,
            max_pages: None,
        }
    }

    /// Stop after this many pages even if the source claims more.
    pub fn max_pages(mut self, cap: Option<u32>) -> Self {
        self.max_pages = cap;
        self
    }

    /// Fetch pages 1, 2, ... until `has_next` is false. A fetch failure is not
    /// retried and aborts the run.
    pub async fn run<S: PageSource + ?Sized>(
        &self,
        source: &S,
    ) -> std::result::Result<Vec<RawRecord>, RunError> {
        let mut records = Vec::new();
        let mut cursor = PageCursor {
            page: 1,
            has_next: true,
        };

        loop {
            let result = source.fetch_page(cursor.page).await.map_err(|err| RunError {
                collected: records.len(),
                page: cursor.page,
                source: err,
            })?;

            debug!(
                page = cursor.page,
                items = result.records.len(),
                has_next = result.has_next,
                "fetched page"
            );
            let page = cursor.page;
            records.extend(result.records.into_iter().map(|mut r| {
                r.page = Some(page);
                r
            }));
            cursor.has_next = result.has_next;

            if !cursor.has_next {
                break;
            }
            if self.max_pages.is_some_and(|cap| cursor.page >= cap) {
                warn!(
                    pages = cursor.page,
                    "page cap reached while source still reports more pages"
                );
                break;
            }

            cursor.page += 1;
            self.delay.wait(self.page_delay).await;
        }

        info!(pages = cursor.page, records = records.len(), "pagination finished");
        Ok(records)
    }
}
