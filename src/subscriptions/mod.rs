//! Subscriptions: saved `postForm` results the user follows.
//!
//! A subscription remembers which source produced it and the exact form
//! values submitted, so the source can be asked again later.

mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::extensions::{ExtensionError, ExtensionRegistry, FormValues, SourceResult};

pub use store::{JsonSubscriptionStore, MemorySubscriptionStore, SubscriptionStore};

/// Page used by [`SubscriptionService::list`] when none is given. Pages start at 1.
pub const DEFAULT_PAGE: usize = 1;

/// Page size used by [`SubscriptionService::list`] when none is given.
pub const DEFAULT_AMOUNT: usize = 10;

/// Errors from subscription handling.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Subscription title is missing")]
    MissingTitle,

    #[error("No subscription with uuid {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A saved subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub uuid: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Form values the subscription was created from.
    pub params: FormValues,
    /// Id of the source.
    pub source: String,
    /// Id of the extension providing the source.
    pub extension: String,
    /// Hex color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_color: Option<String>,
    /// Cover image as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_pic: Option<String>,
    /// Extra data the extension attached on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_order: Option<u32>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played_episode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_latest_episode: Option<String>,
}

/// Fields needed to create a [`Subscription`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionDraft {
    pub title: String,
    pub description: Option<String>,
    pub params: FormValues,
    pub source: String,
    pub extension: String,
    pub cover_color: Option<String>,
    pub cover_pic: Option<String>,
    pub additional_info: Option<Value>,
}

impl SubscriptionDraft {
    /// Build a draft from what a source's `postForm` returned.
    pub fn from_result(result: &SourceResult, extension: &str, source: &str) -> Self {
        let text = |key: &str| result.get_str(key).map(str::to_string);
        Self {
            title: result.title().unwrap_or_default().to_string(),
            description: text("description"),
            params: result.params.clone(),
            source: source.to_string(),
            extension: extension.to_string(),
            cover_color: text("coverColor"),
            cover_pic: text("coverPic"),
            additional_info: result
                .payload
                .get("additionalInfo")
                .filter(|v| !v.is_null())
                .cloned(),
        }
    }

    /// Turn the draft into a new record with a fresh uuid.
    pub fn into_subscription(self) -> Result<Subscription, SubscriptionError> {
        if self.title.trim().is_empty() {
            return Err(SubscriptionError::MissingTitle);
        }
        Ok(Subscription {
            uuid: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            params: self.params,
            source: self.source,
            extension: self.extension,
            cover_color: self.cover_color,
            cover_pic: self.cover_pic,
            additional_info: self.additional_info,
            pinned: false,
            pin_order: None,
            created_at: Utc::now(),
            last_played_episode: None,
            last_latest_episode: None,
        })
    }
}

/// One page of subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPage {
    pub list: Vec<Subscription>,
    /// Number of subscriptions across all pages.
    pub total: usize,
}

/// Subscription operations on top of a [`SubscriptionStore`].
#[derive(Debug)]
pub struct SubscriptionService<S> {
    store: S,
}

impl<S: SubscriptionStore> SubscriptionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn add(&mut self, draft: SubscriptionDraft) -> Result<Subscription, SubscriptionError> {
        let subscription = draft.into_subscription()?;
        self.store.save(subscription.clone())?;
        info!(
            uuid = %subscription.uuid,
            extension = %subscription.extension,
            source = %subscription.source,
            "Subscription added"
        );
        Ok(subscription)
    }

    /// Ask a source for a result and save it as a subscription.
    pub async fn subscribe(
        &mut self,
        registry: &mut ExtensionRegistry,
        provider: &str,
        source: &str,
        params: FormValues,
    ) -> Result<Subscription, SubscriptionError> {
        let result = registry.post_form(provider, source, params).await?;
        self.add(SubscriptionDraft::from_result(&result, provider, source))
    }

    /// List subscriptions page by page, in insertion order.
    pub fn list(&self, page: Option<usize>, amount: Option<usize>) -> SubscriptionPage {
        let page = page.unwrap_or(DEFAULT_PAGE).max(1);
        let amount = amount.unwrap_or(DEFAULT_AMOUNT);

        let all = self.store.find_all();
        let total = all.len();
        let list = all
            .into_iter()
            .skip((page - 1).saturating_mul(amount))
            .take(amount)
            .collect();

        SubscriptionPage { list, total }
    }

    /// Pinned subscriptions by ascending pin order.
    pub fn list_pinned(&self) -> Vec<Subscription> {
        let mut pinned: Vec<_> = self
            .store
            .find_all()
            .into_iter()
            .filter(|s| s.pinned)
            .collect();
        pinned.sort_by_key(|s| s.pin_order.unwrap_or(u32::MAX));
        pinned
    }

    /// Pin a subscription after every other pinned one.
    pub fn pin(&mut self, uuid: &Uuid) -> Result<Subscription, SubscriptionError> {
        let mut target = self.find(uuid)?;
        if target.pinned {
            return Ok(target);
        }

        let next = self
            .store
            .find_all()
            .iter()
            .filter(|s| s.pinned)
            .filter_map(|s| s.pin_order)
            .max()
            .map_or(0, |max| max + 1);

        target.pinned = true;
        target.pin_order = Some(next);
        self.store.save(target.clone())?;
        Ok(target)
    }

    pub fn unpin(&mut self, uuid: &Uuid) -> Result<Subscription, SubscriptionError> {
        let mut target = self.find(uuid)?;
        target.pinned = false;
        target.pin_order = None;
        self.store.save(target.clone())?;
        Ok(target)
    }

    pub fn delete(&mut self, uuid: &Uuid) -> Result<(), SubscriptionError> {
        if self.store.remove(uuid)? {
            info!(%uuid, "Subscription deleted");
            Ok(())
        } else {
            Err(SubscriptionError::NotFound(*uuid))
        }
    }

    /// Reorder pinned subscriptions to follow `order`.
    ///
    /// Each pinned subscription in `order` gets its position as pin order.
    /// Unknown or unpinned uuids are ignored. Returns how many were updated.
    pub fn swap_pin_order(&mut self, order: &[Uuid]) -> Result<usize, SubscriptionError> {
        let updated: Vec<_> = order
            .iter()
            .enumerate()
            .filter_map(|(index, uuid)| {
                let mut record = self.store.find(uuid).filter(|s| s.pinned)?;
                record.pin_order = Some(index as u32);
                Some(record)
            })
            .collect();

        let count = updated.len();
        self.store.save_all(updated)?;
        Ok(count)
    }

    fn find(&self, uuid: &Uuid) -> Result<Subscription, SubscriptionError> {
        self.store
            .find(uuid)
            .ok_or(SubscriptionError::NotFound(*uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(title: &str) -> SubscriptionDraft {
        SubscriptionDraft {
            title: title.to_string(),
            source: "s1".to_string(),
            extension: "demo".to_string(),
            ..Default::default()
        }
    }

    fn service_with(titles: &[&str]) -> (SubscriptionService<MemorySubscriptionStore>, Vec<Uuid>) {
        let mut service = SubscriptionService::new(MemorySubscriptionStore::new());
        let ids = titles
            .iter()
            .map(|t| service.add(draft(t)).unwrap().uuid)
            .collect();
        (service, ids)
    }

    #[test]
    fn test_draft_from_result() {
        let result = SourceResult::merge(
            json!({
                "title": "Podcast",
                "coverColor": "#ff0000",
                "additionalInfo": { "feed": "https://example.com/rss" }
            }),
            json!({ "url": "https://example.com" }).as_object().cloned().unwrap(),
        );

        let draft = SubscriptionDraft::from_result(&result, "demo", "s1");

        assert_eq!(draft.title, "Podcast");
        assert_eq!(draft.cover_color.as_deref(), Some("#ff0000"));
        assert_eq!(draft.cover_pic, None);
        assert_eq!(draft.additional_info, Some(json!({ "feed": "https://example.com/rss" })));
        assert_eq!(draft.params["url"], json!("https://example.com"));
        assert_eq!(draft.extension, "demo");
    }

    #[test]
    fn test_add_requires_title() {
        let mut service = SubscriptionService::new(MemorySubscriptionStore::new());
        let err = service.add(draft("  ")).unwrap_err();
        assert!(matches!(err, SubscriptionError::MissingTitle));
    }

    #[test]
    fn test_list_pages() {
        let titles: Vec<String> = (0..12).map(|i| format!("Sub {i}")).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let (service, _) = service_with(&refs);

        let first = service.list(None, None);
        assert_eq!(first.total, 12);
        assert_eq!(first.list.len(), 10);
        assert_eq!(first.list[0].title, "Sub 0");

        let second = service.list(Some(2), None);
        assert_eq!(second.list.len(), 2);
        assert_eq!(second.list[1].title, "Sub 11");

        assert!(service.list(Some(5), Some(5)).list.is_empty());
    }

    #[test]
    fn test_pin_orders() {
        let (mut service, ids) = service_with(&["a", "b", "c"]);

        assert_eq!(service.pin(&ids[1]).unwrap().pin_order, Some(0));
        assert_eq!(service.pin(&ids[0]).unwrap().pin_order, Some(1));
        assert_eq!(service.pin(&ids[0]).unwrap().pin_order, Some(1));

        let pinned: Vec<_> = service.list_pinned().into_iter().map(|s| s.title).collect();
        assert_eq!(pinned, vec!["b", "a"]);

        let unpinned = service.unpin(&ids[1]).unwrap();
        assert!(!unpinned.pinned);
        assert_eq!(unpinned.pin_order, None);
        assert_eq!(service.list_pinned().len(), 1);
    }

    #[test]
    fn test_swap_pin_order() {
        let (mut service, ids) = service_with(&["a", "b", "c"]);
        service.pin(&ids[0]).unwrap();
        service.pin(&ids[1]).unwrap();

        let updated = service
            .swap_pin_order(&[ids[1], ids[2], ids[0], Uuid::new_v4()])
            .unwrap();

        assert_eq!(updated, 2);
        let pinned: Vec<_> = service
            .list_pinned()
            .into_iter()
            .map(|s| (s.title, s.pin_order))
            .collect();
        assert_eq!(
            pinned,
            vec![("b".to_string(), Some(0)), ("a".to_string(), Some(2))]
        );
    }

    #[test]
    fn test_delete() {
        let (mut service, ids) = service_with(&["a"]);
        service.delete(&ids[0]).unwrap();

        assert!(matches!(
            service.delete(&ids[0]),
            Err(SubscriptionError::NotFound(_))
        ));
        assert_eq!(service.list(None, None).total, 0);
    }

    #[test]
    fn test_unknown_uuid() {
        let (mut service, _) = service_with(&["a"]);
        assert!(matches!(
            service.pin(&Uuid::new_v4()),
            Err(SubscriptionError::NotFound(_))
        ));
    }
}
