//! Listing predicate built from the raw `q` and `status` query parameters.
//!
//! [`SearchFilter`] is a plain value and does no I/O. The store adapter
//! narrows by status and orders in SQL, then keeps the rows accepted by
//! [`SearchFilter::matches`].

use crate::db::{Item, ItemStatus};

/// Result ordering for item listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Descending creation time, ties broken by descending id
    #[default]
    NewestFirst,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "created_at DESC, id DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Lowercased, trimmed, never empty
    query: Option<String>,
    status: Option<ItemStatus>,
    order: SortOrder,
}

impl SearchFilter {
    /// Build a filter from raw user input.
    ///
    /// A status other than `lost`/`found` (any case) and a blank query both
    /// mean "no restriction".
    pub fn new(query: Option<&str>, status: Option<&str>) -> Self {
        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let status = status.and_then(ItemStatus::from_filter);

        Self {
            query,
            status,
            order: SortOrder::NewestFirst,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn status(&self) -> Option<ItemStatus> {
        self.status
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        match &self.query {
            Some(q) => {
                item.title.to_lowercase().contains(q.as_str())
                    || item.description.to_lowercase().contains(q.as_str())
            }
            None => true,
        }
    }
}
