//! Item models and DTOs.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle flag of an item. `Lost` is the initial state, `Found` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Lost,
    Found,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Lost => "lost",
            ItemStatus::Found => "found",
        }
    }

    /// Parse a value submitted with a create or edit form.
    ///
    /// Only the exact literals are accepted.
    pub fn from_form(s: &str) -> Option<Self> {
        match s {
            "lost" => Some(ItemStatus::Lost),
            "found" => Some(ItemStatus::Found),
            _ => None,
        }
    }

    /// Parse a listing filter value, ignoring case and surrounding whitespace
    pub fn from_filter(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lost" => Some(ItemStatus::Lost),
            "found" => Some(ItemStatus::Found),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub contact: String,
    pub status: ItemStatus,
    /// Storage name of the attached image, relative to the uploads directory
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set exactly when `status` is `Found`
    pub resolved_at: Option<DateTime<Utc>>,
    pub owner_id: Option<i64>,
}

impl Item {
    pub fn is_found(&self) -> bool {
        self.status == ItemStatus::Found
    }
}

/// A validated item ready to be inserted
#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub contact: String,
    pub status: ItemStatus,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub owner_id: Option<i64>,
}

impl NewItem {
    pub fn into_item(self, id: i64) -> Item {
        Item {
            id,
            title: self.title,
            description: self.description,
            contact: self.contact,
            status: self.status,
            image: self.image,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
            owner_id: self.owner_id,
        }
    }
}

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw field values of a create or edit submission
#[derive(Debug, Clone, Default)]
pub struct ItemForm {
    pub title: String,
    pub description: String,
    pub contact: String,
    /// `None` when the status field was not submitted at all
    pub status: Option<String>,
    pub image: Option<Upload>,
}
