use crate::normalize::{clean_text, parse_count, percent_to_score};

/// One untyped extraction pass over one source item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(&'static str, Option<String>)>,
    pub page: Option<u32>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_page(page: u32) -> Self {
        RawRecord {
            fields: Vec::new(),
            page: Some(page),
        }
    }

    pub fn set(&mut self, name: &'static str, value: Option<String>) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn field(mut self, name: &'static str, value: Option<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// A typed, fixed-schema output row.
pub trait Row {
    const COLUMNS: &'static [&'static str];

    fn from_raw(raw: &RawRecord) -> Self;

    /// Cells in `COLUMNS` order; absent values are empty strings.
    fn cells(&self) -> Vec<String>;

    /// True when at least one identity field is present.
    fn has_identity(&self) -> bool;

    fn natural_key(&self) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRow {
    pub text: Option<String>,
    pub author: Option<String>,
    pub tags: String,
    pub page: u32,
}

impl Row for QuoteRow {
    const COLUMNS: &'static [&'static str] = &["text", "author", "tags", "page"];

    fn from_raw(raw: &RawRecord) -> Self {
        QuoteRow {
            text: clean_text(raw.get("text")),
            author: clean_text(raw.get("author")),
            tags: raw.get("tags").unwrap_or_default().to_string(),
            page: raw.page.unwrap_or_default(),
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            opt_cell(&self.text),
            opt_cell(&self.author),
            self.tags.clone(),
            self.page.to_string(),
        ]
    }

    fn has_identity(&self) -> bool {
        self.text.is_some()
    }

    fn natural_key(&self) -> String {
        format!(
            "{}\u{1f}{}",
            self.text.as_deref().unwrap_or(""),
            self.author.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileRow {
    pub title: Option<String>,
    pub currency: Option<String>,
    pub price: Option<String>,
    pub discount: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<u64>,
}

impl Row for TileRow {
    const COLUMNS: &'static [&'static str] =
        &["title", "currency", "price", "discount", "rating", "reviews"];

    fn from_raw(raw: &RawRecord) -> Self {
        TileRow {
            title: clean_text(raw.get("title")),
            currency: clean_text(raw.get("currency")),
            price: clean_text(raw.get("price")),
            discount: clean_text(raw.get("discount")),
            rating: percent_to_score(raw.get("rating_style")),
            reviews: parse_count(raw.get("reviews_text")),
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            opt_cell(&self.title),
            opt_cell(&self.currency),
            opt_cell(&self.price),
            opt_cell(&self.discount),
            self.rating.map(|r| format!("{r:?}")).unwrap_or_default(),
            self.reviews.map(|r| r.to_string()).unwrap_or_default(),
        ]
    }

    fn has_identity(&self) -> bool {
        self.title.is_some() || self.price.is_some()
    }

    fn natural_key(&self) -> String {
        format!(
            "{}\u{1f}{}",
            self.title.as_deref().unwrap_or(""),
            self.price.as_deref().unwrap_or("")
        )
    }
}

fn opt_cell(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}
