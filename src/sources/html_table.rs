use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{load_payload, FeedSource, PayloadOrigin};
use crate::app::ports::HttpClientPort;
use crate::common::constants::HTML_TABLE_SOURCE;
use crate::common::error::{FeedError, Result};
use crate::common::types::RawRecord;

/// An HTML page carrying the fault listing as a table; each body row becomes
/// a record keyed by the column headers
pub struct HtmlTableSource {
    http: Arc<dyn HttpClientPort>,
    origin: PayloadOrigin,
    table_selector: String,
}

impl HtmlTableSource {
    pub fn new(http: Arc<dyn HttpClientPort>, origin: PayloadOrigin, table_selector: impl Into<String>) -> Self {
        Self {
            http,
            origin,
            table_selector: table_selector.into(),
        }
    }
}

#[async_trait]
impl FeedSource for HtmlTableSource {
    fn source_name(&self) -> &'static str {
        HTML_TABLE_SOURCE
    }

    #[instrument(skip(self), fields(origin = %self.origin, selector = %self.table_selector))]
    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        let html = load_payload(&self.http, &self.origin).await?;
        let records = extract_table_records(&html, &self.table_selector)?;
        info!("Extracted {} rows from HTML table", records.len());
        Ok(records)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| FeedError::Config(format!("Invalid CSS selector '{}': {:?}", css, e)))
}

/// Extract header-keyed records from the first table matching `table_css`.
pub fn extract_table_records(html: &str, table_css: &str) -> Result<Vec<RawRecord>> {
    let document = Html::parse_document(html);
    let table_selector = selector(table_css)?;
    let row_selector = selector("tr")?;
    let th_selector = selector("th")?;
    let td_selector = selector("td")?;
    let head_selector = selector("thead tr")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| FeedError::Parse(format!("No element matches '{}'", table_css)))?;

    // Prefer an explicit <thead>; otherwise take the first row made of <th> cells
    let header_row = table.select(&head_selector).next().or_else(|| {
        table
            .select(&row_selector)
            .next()
            .filter(|row| row.select(&th_selector).next().is_some() && row.select(&td_selector).next().is_none())
    });
    let headers: Vec<String> = header_row
        .map(|row| row.select(&th_selector).map(cell_text).collect())
        .unwrap_or_default();

    if headers.is_empty() {
        return Err(FeedError::Parse("Table has no header row".into()));
    }
    debug!("Table headers: {:?}", headers);

    let mut records = Vec::new();
    for row in table.select(&row_selector) {
        let cells: Vec<String> = row.select(&td_selector).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }

        let record: RawRecord = headers
            .iter()
            .zip(cells)
            .filter(|(header, cell)| !header.is_empty() && !cell.is_empty())
            .map(|(header, cell)| (header.clone(), Value::String(cell)))
            .collect();
        records.push(record);
    }

    Ok(records)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
