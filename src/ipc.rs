//! Request/response channel between the UI side and the extension core.
//!
//! The UI sends a named [`HostRequest`] and awaits a [`HostReply`]. Replies
//! never carry error text produced by extension code; failures are logged
//! here and answered with a generic message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::extensions::{ExtensionRegistry, FormValues};
use crate::subscriptions::{SubscriptionError, SubscriptionService, SubscriptionStore};

/// A request from the UI side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message", content = "data", rename_all = "camelCase")]
pub enum HostRequest {
    ListExtensions,
    ListSources,
    PreForm {
        provider: String,
        source: String,
    },
    PostForm {
        provider: String,
        source: String,
        params: FormValues,
    },
    /// Run `postForm` and save the result as a subscription.
    Subscribe {
        provider: String,
        source: String,
        params: FormValues,
    },
    Subscription(SubscriptionAction),
}

/// Operations on saved subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SubscriptionAction {
    List {
        #[serde(default)]
        page: Option<usize>,
        #[serde(default)]
        amount: Option<usize>,
    },
    ListPinned,
    Pin {
        uuid: Uuid,
        operation: PinOperation,
    },
    Delete {
        uuid: Uuid,
    },
    SwapPinOrder {
        #[serde(rename = "newOrderUUIDs")]
        new_order: Vec<Uuid>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinOperation {
    Pin,
    Unpin,
}

/// Reply to a [`HostRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HostReply {
    Success {
        #[serde(default, skip_serializing_if = "Value::is_null")]
        data: Value,
    },
    Error {
        info: String,
    },
}

impl HostReply {
    pub fn success(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => HostReply::Success { data },
            Err(e) => {
                warn!(error = %e, "Unable to encode reply");
                HostReply::error("Unable to encode reply.")
            }
        }
    }

    pub fn empty() -> Self {
        HostReply::Success { data: Value::Null }
    }

    pub fn error(info: impl Into<String>) -> Self {
        HostReply::Error { info: info.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HostReply::Success { .. })
    }
}

/// A request together with the channel its reply goes to.
pub type Envelope = (HostRequest, oneshot::Sender<HostReply>);

/// Sending half of the request channel.
#[derive(Debug, Clone)]
pub struct HostClient {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl HostClient {
    /// Send a request and wait for its reply.
    pub async fn request(&self, request: HostRequest) -> HostReply {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send((request, reply_tx)).is_err() {
            return HostReply::error("Host is not running.");
        }
        reply_rx
            .await
            .unwrap_or_else(|_| HostReply::error("Host dropped the request."))
    }
}

/// Create a request channel.
pub fn channel() -> (HostClient, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HostClient { tx }, rx)
}

/// Answers requests against a registry and a subscription service.
#[derive(Debug)]
pub struct Host<S> {
    registry: ExtensionRegistry,
    subscriptions: SubscriptionService<S>,
}

impl<S: SubscriptionStore> Host<S> {
    pub fn new(registry: ExtensionRegistry, subscriptions: SubscriptionService<S>) -> Self {
        Self {
            registry,
            subscriptions,
        }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    pub fn subscriptions(&self) -> &SubscriptionService<S> {
        &self.subscriptions
    }

    /// Answer requests until every [`HostClient`] is dropped.
    pub async fn serve(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) -> Self {
        while let Some((request, reply)) = rx.recv().await {
            let response = self.handle(request).await;
            if reply.send(response).is_err() {
                debug!("Requester went away before the reply");
            }
        }
        self
    }

    pub async fn handle(&mut self, request: HostRequest) -> HostReply {
        debug!(?request, "Handling request");
        match request {
            HostRequest::ListExtensions => HostReply::success(self.registry.extensions()),
            HostRequest::ListSources => HostReply::success(self.registry.sources().snapshot()),
            HostRequest::PreForm { provider, source } => {
                match self.registry.pre_form(&provider, &source).await {
                    Ok(fields) => HostReply::success(fields),
                    Err(e) => HostReply::error(e.user_message()),
                }
            }
            HostRequest::PostForm {
                provider,
                source,
                params,
            } => match self.registry.post_form(&provider, &source, params).await {
                Ok(result) => HostReply::success(result),
                Err(e) => HostReply::error(e.user_message()),
            },
            HostRequest::Subscribe {
                provider,
                source,
                params,
            } => {
                let saved = self
                    .subscriptions
                    .subscribe(&mut self.registry, &provider, &source, params)
                    .await;
                reply_with(saved, "Error saving subscription into database.")
            }
            HostRequest::Subscription(action) => self.handle_subscription(action),
        }
    }

    fn handle_subscription(&mut self, action: SubscriptionAction) -> HostReply {
        let service = &mut self.subscriptions;
        match action {
            SubscriptionAction::List { page, amount } => HostReply::success(service.list(page, amount)),
            SubscriptionAction::ListPinned => HostReply::success(service.list_pinned()),
            SubscriptionAction::Pin { uuid, operation } => {
                let result = match operation {
                    PinOperation::Pin => service.pin(&uuid),
                    PinOperation::Unpin => service.unpin(&uuid),
                };
                reply_with(result.map(|_| ()), "Error saving pin state.")
            }
            SubscriptionAction::Delete { uuid } => {
                reply_with(service.delete(&uuid), "Error deleting subscription.")
            }
            SubscriptionAction::SwapPinOrder { new_order } => {
                reply_with(service.swap_pin_order(&new_order).map(|_| ()), "Error saving pin order.")
            }
        }
    }
}

fn reply_with<T: Serialize>(result: Result<T, SubscriptionError>, fallback: &str) -> HostReply {
    match result {
        Ok(data) => HostReply::success(data),
        Err(e) => {
            warn!(error = %e, "Subscription request failed");
            match e {
                SubscriptionError::NotFound(_) => HostReply::error("No matched subscription."),
                SubscriptionError::MissingTitle => HostReply::error("Subscription title is missing."),
                SubscriptionError::Extension(e) => HostReply::error(e.user_message()),
                SubscriptionError::Io(_) | SubscriptionError::Json(_) => HostReply::error(fallback),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::{RegistryConfig, TracingNotifier, MANIFEST_FILE};
    use crate::subscriptions::MemorySubscriptionStore;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn host(external: &std::path::Path) -> Host<MemorySubscriptionStore> {
        let config = RegistryConfig {
            external_dir: external.to_path_buf(),
            ..Default::default()
        };
        Host::new(
            ExtensionRegistry::new(config, Arc::new(TracingNotifier)),
            SubscriptionService::new(MemorySubscriptionStore::new()),
        )
    }

    fn write_feed_extension(root: &std::path::Path) {
        let dir = root.join("feeds");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), r#"{"name": "feeds", "version": "0.1.0"}"#).unwrap();
        fs::write(
            dir.join("index.js"),
            r##"
const kit = require("castkit");
kit.registerSource({
  id: "rss",
  name: "RSS",
  preForm: async () => [{ id: "url", name: "Feed URL", type: "INPUT" }],
  postForm: async ({ url }) => {
    if (!url) throw new Error("secret stack detail");
    return { title: `Feed at ${url}`, coverColor: "#123456" };
  },
});
"##,
        )
        .unwrap();
    }

    #[test]
    fn test_request_wire_format() {
        let request: HostRequest = serde_json::from_value(json!({
            "message": "postForm",
            "data": { "provider": "demo", "source": "s1", "params": { "a": 1 } }
        }))
        .unwrap();
        assert_eq!(
            request,
            HostRequest::PostForm {
                provider: "demo".to_string(),
                source: "s1".to_string(),
                params: json!({ "a": 1 }).as_object().cloned().unwrap(),
            }
        );

        let request: HostRequest = serde_json::from_value(json!({
            "message": "subscription",
            "data": { "type": "list", "payload": { "page": 2 } }
        }))
        .unwrap();
        assert_eq!(
            request,
            HostRequest::Subscription(SubscriptionAction::List {
                page: Some(2),
                amount: None
            })
        );

        let listed: HostRequest = serde_json::from_value(json!({ "message": "listSources" })).unwrap();
        assert_eq!(listed, HostRequest::ListSources);
    }

    #[test]
    fn test_reply_wire_format() {
        assert_eq!(
            serde_json::to_value(HostReply::success(vec![1, 2])).unwrap(),
            json!({ "status": "success", "data": [1, 2] })
        );
        assert_eq!(
            serde_json::to_value(HostReply::empty()).unwrap(),
            json!({ "status": "success" })
        );
        assert_eq!(
            serde_json::to_value(HostReply::error("nope")).unwrap(),
            json!({ "status": "error", "info": "nope" })
        );
    }

    #[tokio::test]
    async fn test_subscribe_flow() {
        let temp = tempdir().unwrap();
        write_feed_extension(temp.path());
        let mut host = host(temp.path());
        host.registry_mut().load_all().await;

        let reply = host
            .handle(HostRequest::Subscribe {
                provider: "feeds".to_string(),
                source: "rss".to_string(),
                params: json!({ "url": "https://example.com/rss" }).as_object().cloned().unwrap(),
            })
            .await;
        let HostReply::Success { data } = reply else {
            panic!("subscribe failed: {reply:?}");
        };
        assert_eq!(data["title"], json!("Feed at https://example.com/rss"));
        assert_eq!(data["coverColor"], json!("#123456"));
        assert_eq!(data["params"]["url"], json!("https://example.com/rss"));
        let uuid: Uuid = serde_json::from_value(data["uuid"].clone()).unwrap();

        let reply = host
            .handle(HostRequest::Subscription(SubscriptionAction::Pin {
                uuid,
                operation: PinOperation::Pin,
            }))
            .await;
        assert_eq!(reply, HostReply::empty());

        let pinned = host.subscriptions().list_pinned();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].pin_order, Some(0));
    }

    #[tokio::test]
    async fn test_extension_errors_stay_generic() {
        let temp = tempdir().unwrap();
        write_feed_extension(temp.path());
        let mut host = host(temp.path());
        host.registry_mut().load_all().await;

        let reply = host
            .handle(HostRequest::PostForm {
                provider: "feeds".to_string(),
                source: "rss".to_string(),
                params: Default::default(),
            })
            .await;

        let HostReply::Error { info } = reply else {
            panic!("expected an error reply");
        };
        assert!(!info.contains("secret"));
        assert!(host.subscriptions().list(None, None).list.is_empty());
    }

    #[tokio::test]
    async fn test_serve_over_channel() {
        let temp = tempdir().unwrap();
        write_feed_extension(temp.path());
        let mut host = host(temp.path());
        host.registry_mut().load_all().await;

        let (client, rx) = channel();
        let requests = async move {
            let sources = client.request(HostRequest::ListSources).await;
            let missing = client
                .request(HostRequest::Subscription(SubscriptionAction::Delete {
                    uuid: Uuid::new_v4(),
                }))
                .await;
            (sources, missing)
        };

        let (_, (sources, missing)) = tokio::join!(host.serve(rx), requests);

        let HostReply::Success { data } = sources else {
            panic!("listSources failed");
        };
        assert_eq!(data[0]["id"], json!("rss"));
        assert_eq!(data[0]["provider"], json!("feeds"));
        assert_eq!(missing, HostReply::error("No matched subscription."));
    }
}
