//! Lazy, restartable paging over `Link: rel="next"` APIs.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;
use url::Url;

use crate::connectors::ConnectorError;
use crate::connectors::http::ApiClient;

/// Largest page size GitHub and GitLab accept.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size to request when at most `cap` items are wanted.
pub fn per_page(cap: usize) -> String {
    cap.clamp(1, MAX_PAGE_SIZE).to_string()
}

/// Fetches one page per [`Pager::next_page`] call.
///
/// Items that fail to deserialize are logged and skipped so one odd record
/// does not hide the rest of the page.
pub struct Pager<'a, T> {
    client: &'a ApiClient,
    first: Url,
    next: Option<Url>,
    items_field: Option<&'static str>,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Pager<'a, T> {
    pub fn new(client: &'a ApiClient, first: Url) -> Self {
        Self {
            client,
            next: Some(first.clone()),
            first,
            items_field: None,
            _item: PhantomData,
        }
    }

    /// Read items from `field` of an object body instead of a top-level array.
    pub fn items_at(mut self, field: &'static str) -> Self {
        self.items_field = Some(field);
        self
    }

    /// `None` once the last page has been consumed.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, ConnectorError> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        let page = self.client.get_page::<JsonValue>(url).await?;
        self.next = page.next;

        let raw = match self.items_field {
            Some(field) => page.body.get(field).cloned().unwrap_or(JsonValue::Null),
            None => page.body,
        };

        let JsonValue::Array(values) = raw else {
            return Err(ConnectorError::malformed(format!(
                "expected a JSON array{}",
                self.items_field
                    .map(|f| format!(" at '{f}'"))
                    .unwrap_or_default()
            )));
        };

        let items = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<T>(value) {
                Ok(item) => Some(item),
                Err(err) => {
                    warn!(provider = self.client.provider(), error = %err, "Skipping malformed item");
                    None
                }
            })
            .collect();

        Ok(Some(items))
    }

    /// Rewind to the first page.
    pub fn restart(&mut self) {
        self.next = Some(self.first.clone());
    }

    /// Pull pages until `cap` items are collected or the pages run out.
    pub async fn collect_capped(&mut self, cap: usize) -> Result<Vec<T>, ConnectorError> {
        let mut items = Vec::new();
        while items.len() < cap {
            match self.next_page().await? {
                Some(page) if !page.is_empty() => {
                    let remaining = cap - items.len();
                    items.extend(page.into_iter().take(remaining));
                }
                _ => break,
            }
        }
        Ok(items)
    }
}
