//! Create, edit and resolve operations on items.
//!
//! Status moves one way only: `lost -> found`. [`ItemEngine::mark_found`]
//! rejects a redundant resolution, while [`ItemEngine::edit`] leaves the
//! status of a `found` item alone whatever the submitted override says.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::db::{Item, ItemForm, ItemStatus, NewItem, Upload, User};
use crate::store::{ItemStore, StoreError};

use super::{
    replace_image, storage_name, timed, AccessPolicy, AttachmentSink, EngineError,
    FieldErrorsBuilder, SearchFilter,
};

pub struct ItemEngine {
    store: Arc<dyn ItemStore>,
    attachments: Arc<dyn AttachmentSink>,
    policy: AccessPolicy,
    timeout: Duration,
}

/// Title and contact must be non-blank
fn validate_required(form: &ItemForm) -> Result<(), EngineError> {
    let mut errors = FieldErrorsBuilder::new();
    if form.title.trim().is_empty() {
        errors.add("title", "Title is required");
    }
    if form.contact.trim().is_empty() {
        errors.add("contact", "Contact information is required");
    }
    errors.finish()
}

impl ItemEngine {
    pub fn new(
        store: Arc<dyn ItemStore>,
        attachments: Arc<dyn AttachmentSink>,
        policy: AccessPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            attachments,
            policy,
            timeout,
        }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Run a store call under the configured timeout
    async fn call<T, F>(&self, fut: F) -> Result<Result<T, StoreError>, EngineError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        timed(self.timeout, fut).await
    }

    async fn fetch(&self, id: i64) -> Result<Item, EngineError> {
        self.call(self.store.get_item(id))
            .await?
            .map_err(|e| EngineError::for_item(id, e))
    }

    async fn store_upload(
        &self,
        upload: Option<Upload>,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, EngineError> {
        let Some(upload) = upload else {
            return Ok(None);
        };
        let name = storage_name(&upload.file_name, now);
        self.call(self.attachments.save(&name, &upload.bytes))
            .await??;
        info!(image = %name, "Stored uploaded image");
        Ok(Some(name))
    }

    pub async fn get(&self, id: i64) -> Result<Item, EngineError> {
        self.fetch(id).await
    }

    pub async fn list(&self, filter: &SearchFilter) -> Result<Vec<Item>, EngineError> {
        Ok(self.call(self.store.list_items(filter)).await??)
    }

    pub async fn create(&self, form: ItemForm, actor: Option<&User>) -> Result<Item, EngineError> {
        let owner_id = self.policy.authorize_post(actor)?;
        validate_required(&form)?;

        let status = form
            .status
            .as_deref()
            .and_then(ItemStatus::from_form)
            .unwrap_or_default();
        let now = Utc::now();
        let image = self.store_upload(form.image, now).await?;

        let new_item = NewItem {
            title: form.title,
            description: form.description,
            contact: form.contact,
            status,
            image,
            created_at: now,
            resolved_at: (status == ItemStatus::Found).then_some(now),
            owner_id,
        };

        let id = self.call(self.store.create_item(&new_item)).await??;
        info!(item_id = id, owner_id = ?owner_id, status = %status, "Item created");
        Ok(new_item.into_item(id))
    }

    /// Check that `actor` may edit item `id` without changing anything
    pub async fn authorize_edit(&self, id: i64, actor: Option<&User>) -> Result<Item, EngineError> {
        let item = self.fetch(id).await?;
        self.policy.authorize_mutation(actor, &item)?;
        Ok(item)
    }

    pub async fn edit(&self, id: i64, form: ItemForm, actor: Option<&User>) -> Result<Item, EngineError> {
        let mut item = self.fetch(id).await?;
        if let Err(e) = self.policy.authorize_mutation(actor, &item) {
            warn!(item_id = id, actor_id = ?actor.map(|u| u.id), "Edit rejected");
            return Err(e);
        }
        validate_required(&form)?;

        let now = Utc::now();
        match form.status.as_deref().and_then(ItemStatus::from_form) {
            // Unrecognised or absent override leaves the status alone
            None => {}
            Some(ItemStatus::Found) => {
                if item.status == ItemStatus::Lost {
                    item.status = ItemStatus::Found;
                    item.resolved_at = Some(now);
                }
            }
            Some(ItemStatus::Lost) => {
                if item.status == ItemStatus::Found {
                    debug!(item_id = id, "Ignoring request to reopen a found item");
                }
            }
        }

        let uploaded = self.store_upload(form.image, now).await?;
        item.image = replace_image(item.image.take(), uploaded);
        item.title = form.title;
        item.description = form.description;
        item.contact = form.contact;

        self.call(self.store.update_item(&item))
            .await?
            .map_err(|e| EngineError::for_item(id, e))?;

        info!(item_id = id, status = %item.status, "Item updated");
        self.fetch(id).await
    }

    pub async fn mark_found(&self, id: i64, actor: Option<&User>) -> Result<Item, EngineError> {
        let item = self.fetch(id).await?;
        if let Err(e) = self.policy.authorize_mutation(actor, &item) {
            warn!(item_id = id, actor_id = ?actor.map(|u| u.id), "Mark found rejected");
            return Err(e);
        }
        if item.status == ItemStatus::Found {
            warn!(item_id = id, "Item is already marked as found");
            return Err(EngineError::InvalidTransition {
                id,
                status: item.status,
            });
        }

        let swapped = self.call(self.store.mark_found(id, Utc::now())).await??;
        if !swapped {
            // Lost the race: the row changed between the read and the write
            let current = self.fetch(id).await?;
            warn!(item_id = id, "Concurrent resolution won the race");
            return Err(EngineError::InvalidTransition {
                id,
                status: current.status,
            });
        }

        info!(item_id = id, "Item marked as found");
        self.fetch(id).await
    }

    /// Remove every item. Uploaded images stay on disk.
    pub async fn clear_all(&self) -> Result<u64, EngineError> {
        let deleted = self.call(self.store.delete_all_items()).await??;
        warn!(deleted, "All items cleared");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{format_timestamp, init_memory, NewUser};
    use crate::engine::UploadDir;
    use crate::store::{SqliteStore, UserStore};
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::TempDir;

    struct Harness {
        engine: ItemEngine,
        owner: User,
        stranger: User,
        uploads: TempDir,
    }

    async fn harness(policy: AccessPolicy) -> Harness {
        let store = Arc::new(SqliteStore::new(init_memory().await.unwrap()));
        let uploads = tempfile::tempdir().unwrap();

        let mut users = Vec::new();
        for name in ["owner", "stranger"] {
            let id = store
                .create_user(&NewUser {
                    username: name.to_string(),
                    email: format!("{}@example.com", name),
                    password_hash: "$argon2id$stub".to_string(),
                    created_at: format_timestamp(&Utc::now()),
                })
                .await
                .unwrap();
            users.push(store.get_user(id).await.unwrap());
        }
        let stranger = users.pop().unwrap();
        let owner = users.pop().unwrap();

        let engine = ItemEngine::new(
            store,
            Arc::new(UploadDir::new(uploads.path())),
            policy,
            Duration::from_secs(5),
        );
        Harness {
            engine,
            owner,
            stranger,
            uploads,
        }
    }

    fn form(title: &str, contact: &str, status: Option<&str>) -> ItemForm {
        ItemForm {
            title: title.to_string(),
            description: "left on the 42 bus".to_string(),
            contact: contact.to_string(),
            status: status.map(str::to_string),
            image: None,
        }
    }

    fn assert_resolution_invariant(item: &Item) {
        assert_eq!(item.resolved_at.is_some(), item.status == ItemStatus::Found);
    }

    #[tokio::test]
    async fn test_create_item() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Blue Backpack", "555-0100", Some("lost")), Some(&h.owner))
            .await
            .unwrap();

        assert!(item.id > 0);
        assert_eq!(item.title, "Blue Backpack");
        assert_eq!(item.status, ItemStatus::Lost);
        assert_eq!(item.owner_id, Some(h.owner.id));
        assert_resolution_invariant(&item);
        assert_eq!(h.engine.get(item.id).await.unwrap(), item);
    }

    #[tokio::test]
    async fn test_create_defaults_invalid_status_to_lost() {
        let h = harness(AccessPolicy::default()).await;
        for status in [Some("FOUND"), Some("misplaced"), Some(""), None] {
            let item = h
                .engine
                .create(form("Umbrella", "555-0100", status), Some(&h.owner))
                .await
                .unwrap();
            assert_eq!(item.status, ItemStatus::Lost);
            assert_resolution_invariant(&item);
        }
    }

    #[tokio::test]
    async fn test_create_found_item_is_resolved_at_creation() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Glasses", "desk", Some("found")), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(item.status, ItemStatus::Found);
        assert_eq!(item.resolved_at, Some(item.created_at));
    }

    #[tokio::test]
    async fn test_create_requires_title_and_contact() {
        let h = harness(AccessPolicy::default()).await;

        let err = h
            .engine
            .create(form("", "555-0100", None), Some(&h.owner))
            .await
            .unwrap_err();
        match err {
            EngineError::Validation(fields) => {
                assert!(fields.contains_key("title"));
                assert!(!fields.contains_key("contact"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let err = h
            .engine
            .create(form("  ", "   ", None), Some(&h.owner))
            .await
            .unwrap_err();
        match err {
            EngineError::Validation(fields) => assert_eq!(fields.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }

        assert!(h.engine.list(&SearchFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_anonymous() {
        let strict = harness(AccessPolicy::default()).await;
        assert!(matches!(
            strict.engine.create(form("Keys", "555", None), None).await,
            Err(EngineError::Unauthenticated)
        ));

        let open = harness(AccessPolicy {
            require_login_to_post: false,
            enforce_ownership: false,
        })
        .await;
        let item = open.engine.create(form("Keys", "555", None), None).await.unwrap();
        assert_eq!(item.owner_id, None);
    }

    #[tokio::test]
    async fn test_create_stores_upload() {
        let h = harness(AccessPolicy::default()).await;
        let mut submission = form("Cat collar", "555-0100", None);
        submission.image = Upload::new("collar.jpg", Bytes::from_static(b"jpeg"));

        let item = h.engine.create(submission, Some(&h.owner)).await.unwrap();
        let image = item.image.expect("image reference");
        assert!(image.ends_with("_collar.jpg"));
        assert_eq!(std::fs::read(h.uploads.path().join(&image)).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_edit_overwrites_fields() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();

        let mut update = form("House keys", "555-0199", Some("lost"));
        update.description = String::new();
        let edited = h.engine.edit(item.id, update, Some(&h.owner)).await.unwrap();

        assert_eq!(edited.title, "House keys");
        assert_eq!(edited.contact, "555-0199");
        assert_eq!(edited.description, "");
        assert_eq!(edited.owner_id, item.owner_id);
        assert_eq!(edited.created_at, item.created_at);
    }

    #[tokio::test]
    async fn test_edit_missing_item() {
        let h = harness(AccessPolicy::default()).await;
        assert!(matches!(
            h.engine.edit(99, form("a", "b", None), Some(&h.owner)).await,
            Err(EngineError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_edit_by_stranger_is_forbidden() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();

        let result = h
            .engine
            .edit(item.id, form("Mine now", "666", Some("found")), Some(&h.stranger))
            .await;
        assert!(matches!(result, Err(EngineError::Forbidden(id)) if id == item.id));
        assert_eq!(h.engine.get(item.id).await.unwrap(), item);

        assert!(matches!(
            h.engine.edit(item.id, form("x", "y", None), None).await,
            Err(EngineError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_edit_validation_leaves_item_unchanged() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();

        for (title, contact) in [("", "555"), ("Keys", " ")] {
            let result = h
                .engine
                .edit(item.id, form(title, contact, Some("found")), Some(&h.owner))
                .await;
            assert!(matches!(result, Err(EngineError::Validation(_))));
        }
        assert_eq!(h.engine.get(item.id).await.unwrap(), item);
    }

    #[tokio::test]
    async fn test_edit_ignores_invalid_status_override() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();

        let edited = h
            .engine
            .edit(item.id, form("Keys", "555-0100", Some("FOUND")), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(edited.status, ItemStatus::Lost);
        assert_resolution_invariant(&edited);
    }

    #[tokio::test]
    async fn test_edit_can_resolve_and_repeat_found() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();

        let resolved = h
            .engine
            .edit(item.id, form("Keys", "555-0100", Some("found")), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(resolved.status, ItemStatus::Found);
        assert_resolution_invariant(&resolved);

        let again = h
            .engine
            .edit(item.id, form("Keys!", "555-0100", Some("found")), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(again.status, ItemStatus::Found);
        assert_eq!(again.resolved_at, resolved.resolved_at);
        assert_eq!(again.title, "Keys!");
    }

    #[tokio::test]
    async fn test_edit_does_not_reopen_found_item() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555-0100", Some("found")), Some(&h.owner))
            .await
            .unwrap();

        let edited = h
            .engine
            .edit(item.id, form("House keys", "555-0199", Some("lost")), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(edited.status, ItemStatus::Found);
        assert_eq!(edited.resolved_at, item.resolved_at);
        assert_eq!(edited.title, "House keys");
        assert_eq!(edited.contact, "555-0199");
    }

    #[tokio::test]
    async fn test_submitted_text_is_stored_verbatim() {
        let h = harness(AccessPolicy::default()).await;
        let mut submission = form("  Keys  ", " 555-0100\n", None);
        submission.description = "  on the ring\n".to_string();
        let item = h
            .engine
            .create(submission, Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(item.title, "  Keys  ");
        assert_eq!(h.engine.get(item.id).await.unwrap().contact, " 555-0100\n");

        let edited = h
            .engine
            .edit(item.id, form(" Car keys ", "555-0100 ", None), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(edited.title, " Car keys ");
        assert_eq!(edited.description, "left on the 42 bus");
        assert_eq!(edited.contact, "555-0100 ");
    }

    #[tokio::test]
    async fn test_edit_image_replace_and_preserve() {
        let h = harness(AccessPolicy::default()).await;
        let mut submission = form("Scarf", "555-0100", None);
        submission.image = Upload::new("first.png", Bytes::from_static(b"1"));
        let item = h.engine.create(submission, Some(&h.owner)).await.unwrap();
        let first = item.image.clone().unwrap();

        let kept = h
            .engine
            .edit(item.id, form("Red scarf", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(kept.image.as_deref(), Some(first.as_str()));

        let mut replacement = form("Red scarf", "555-0100", None);
        replacement.image = Upload::new("second.png", Bytes::from_static(b"2"));
        let replaced = h.engine.edit(item.id, replacement, Some(&h.owner)).await.unwrap();
        let second = replaced.image.unwrap();
        assert_ne!(second, first);
        assert!(second.ends_with("_second.png"));

        // The previous file is kept on disk
        assert!(h.uploads.path().join(&first).exists());
        assert!(h.uploads.path().join(&second).exists());
    }

    #[tokio::test]
    async fn test_mark_found_once() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Blue Backpack", "555-0100", Some("lost")), Some(&h.owner))
            .await
            .unwrap();

        let found = h.engine.mark_found(item.id, Some(&h.owner)).await.unwrap();
        assert_eq!(found.status, ItemStatus::Found);
        assert_resolution_invariant(&found);

        let second = h.engine.mark_found(item.id, Some(&h.owner)).await;
        assert!(matches!(
            second,
            Err(EngineError::InvalidTransition {
                status: ItemStatus::Found,
                ..
            })
        ));
        assert_eq!(h.engine.get(item.id).await.unwrap(), found);
    }

    #[tokio::test]
    async fn test_mark_found_missing_and_forbidden() {
        let h = harness(AccessPolicy::default()).await;
        assert!(matches!(
            h.engine.mark_found(5, Some(&h.owner)).await,
            Err(EngineError::NotFound(5))
        ));

        let item = h
            .engine
            .create(form("Keys", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();
        assert!(matches!(
            h.engine.mark_found(item.id, Some(&h.stranger)).await,
            Err(EngineError::Forbidden(_))
        ));
        assert_eq!(h.engine.get(item.id).await.unwrap().status, ItemStatus::Lost);
    }

    #[tokio::test]
    async fn test_concurrent_mark_found_has_one_winner() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555-0100", None), Some(&h.owner))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            h.engine.mark_found(item.id, Some(&h.owner)),
            h.engine.mark_found(item.id, Some(&h.owner)),
        );
        let outcomes = [a, b];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(EngineError::InvalidTransition { .. }))));
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let h = harness(AccessPolicy::default()).await;
        h.engine
            .create(form("Lost Wallet", "555", None), Some(&h.owner))
            .await
            .unwrap();
        h.engine
            .create(form("Phone", "555", Some("found")), Some(&h.owner))
            .await
            .unwrap();

        let found = h
            .engine
            .list(&SearchFilter::new(None, Some("Found")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Phone");

        assert_eq!(h.engine.clear_all().await.unwrap(), 2);
        assert!(h.engine.list(&SearchFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authorize_edit() {
        let h = harness(AccessPolicy::default()).await;
        let item = h
            .engine
            .create(form("Keys", "555", None), Some(&h.owner))
            .await
            .unwrap();
        assert_eq!(
            h.engine.authorize_edit(item.id, Some(&h.owner)).await.unwrap(),
            item
        );
        assert!(matches!(
            h.engine.authorize_edit(item.id, Some(&h.stranger)).await,
            Err(EngineError::Forbidden(_))
        ));
    }

    struct StalledStore;

    #[async_trait]
    impl ItemStore for StalledStore {
        async fn create_item(&self, _item: &NewItem) -> Result<i64, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        }
        async fn get_item(&self, _id: i64) -> Result<Item, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(StoreError::NotFound)
        }
        async fn update_item(&self, _item: &Item) -> Result<(), StoreError> {
            Ok(())
        }
        async fn mark_found(&self, _id: i64, _at: DateTime<Utc>) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn list_items(&self, _filter: &SearchFilter) -> Result<Vec<Item>, StoreError> {
            Ok(Vec::new())
        }
        async fn delete_all_items(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        let uploads = tempfile::tempdir().unwrap();
        let engine = ItemEngine::new(
            Arc::new(StalledStore),
            Arc::new(UploadDir::new(uploads.path())),
            AccessPolicy {
                require_login_to_post: false,
                enforce_ownership: false,
            },
            Duration::from_millis(20),
        );

        assert!(matches!(
            engine.get(1).await,
            Err(EngineError::Timeout(_))
        ));
        assert!(matches!(
            engine.create(form("Keys", "555", None), None).await,
            Err(EngineError::Timeout(_))
        ));
    }
}
