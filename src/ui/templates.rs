// Askama template definitions

use askama::Template;

use crate::db::{Item, ItemForm, User};
use crate::engine::FieldErrors;

/// Custom filters for Askama templates
mod filters {
    /// Shorten to at most `len` characters, appending an ellipsis
    pub fn excerpt<T: std::fmt::Display>(s: T, len: usize) -> ::askama::Result<String> {
        let s = s.to_string();
        if s.chars().count() <= len {
            Ok(s)
        } else {
            let cut: String = s.chars().take(len).collect();
            Ok(format!("{}...", cut.trim_end()))
        }
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

// Item for display (using String instead of Option for templates)
pub struct ItemView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub contact: String,
    pub status: String,
    pub is_found: bool,
    pub image_url: String, // Empty string if no image
    pub created_at: String,
    pub resolved_at: String, // Empty string while lost
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            description: item.description.clone(),
            contact: item.contact.clone(),
            status: item.status.to_string(),
            is_found: item.is_found(),
            image_url: item
                .image
                .as_ref()
                .map(|name| format!("/static/uploads/{}", name))
                .unwrap_or_default(),
            created_at: item.created_at.format(DATE_FORMAT).to_string(),
            resolved_at: item
                .resolved_at
                .map(|at| at.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}

/// Values shown in the item form, re-populated after a rejected submission
#[derive(Debug, Clone, Default)]
pub struct FormValues {
    pub title: String,
    pub description: String,
    pub contact: String,
    pub status: String,
}

impl From<&ItemForm> for FormValues {
    fn from(form: &ItemForm) -> Self {
        Self {
            title: form.title.clone(),
            description: form.description.clone(),
            contact: form.contact.clone(),
            status: form.status.clone().unwrap_or_default(),
        }
    }
}

impl From<&Item> for FormValues {
    fn from(item: &Item) -> Self {
        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            contact: item.contact.clone(),
            status: item.status.to_string(),
        }
    }
}

/// Flatten field errors into display lines, in a stable order
pub fn error_lines(errors: &FieldErrors) -> Vec<String> {
    let mut fields: Vec<&String> = errors.keys().collect();
    fields.sort();
    fields
        .into_iter()
        .flat_map(|f| errors[f].iter().cloned())
        .collect()
}

/// Name shown in the navigation bar; empty for anonymous visitors
pub fn display_name(user: Option<&User>) -> String {
    user.map(|u| u.username.clone()).unwrap_or_default()
}

// Listing and search page
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub items: Vec<ItemView>,
    pub query: String,
    pub status: String,
    pub count: usize,
    pub username: String,
}

// New item form
#[derive(Template)]
#[template(path = "new.html")]
pub struct NewItemTemplate {
    pub form: FormValues,
    pub errors: Vec<String>,
    pub username: String,
}

// Item detail
#[derive(Template)]
#[template(path = "show.html")]
pub struct ShowTemplate {
    pub item: ItemView,
    pub can_edit: bool,
    /// Shown above the item when an action on it was refused
    pub notice: Option<String>,
    pub username: String,
}

// Edit form
#[derive(Template)]
#[template(path = "edit.html")]
pub struct EditTemplate {
    pub id: i64,
    pub form: FormValues,
    pub image_url: String,
    pub is_found: bool,
    pub errors: Vec<String>,
    pub username: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub login: String,
    pub username: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub errors: Vec<String>,
    pub form_username: String,
    pub form_email: String,
    pub username: String,
}
