use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use byok_catalog::{
    CatalogResolveError, CatalogResolver, CooperativeCancellationToken, CredentialPromptOutcome,
    CredentialStore, InvocationMode, ModelCatalog, ModelDescriptor, OpenAiCompatibleCatalogFetcher,
    OpenAiCompatibleFetcherConfig, ProviderCredential, ProviderProfile, ResolutionEventSink,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;

struct ScriptedCredentialStore {
    stored: AsyncMutex<Option<ProviderCredential>>,
    prompt_answer: Option<&'static str>,
    prompts: AtomicUsize,
}

impl ScriptedCredentialStore {
    fn new(stored: Option<&str>, prompt_answer: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            stored: AsyncMutex::new(
                stored.map(|secret| ProviderCredential::new(secret).expect("credential")),
            ),
            prompt_answer,
            prompts: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CredentialStore for ScriptedCredentialStore {
    async fn get(&self, _provider_id: &str) -> Result<Option<ProviderCredential>> {
        Ok(self.stored.lock().await.clone())
    }

    async fn prompt_and_store(&self, _provider_id: &str) -> Result<CredentialPromptOutcome> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let Some(answer) = self.prompt_answer else {
            return Ok(CredentialPromptOutcome::Cancelled);
        };
        let credential = ProviderCredential::new(answer)?;
        *self.stored.lock().await = Some(credential.clone());
        Ok(CredentialPromptOutcome::Stored(credential))
    }
}

fn descriptor(id: &str, max_input_tokens: u32) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        display_name: id.to_string(),
        max_input_tokens,
        max_output_tokens: max_input_tokens,
        supports_tool_calling: true,
        supports_vision: false,
    }
}

fn build_resolver(
    server: &MockServer,
    defaults: Vec<ModelDescriptor>,
    store: Arc<ScriptedCredentialStore>,
) -> (CatalogResolver, Arc<Mutex<Vec<Value>>>) {
    let built_in = ModelCatalog::from_descriptors(defaults).expect("defaults");
    let profile = ProviderProfile::new("iflow", format!("{}/v1", server.base_url()), &built_in, None);
    let fetcher = OpenAiCompatibleCatalogFetcher::new(
        OpenAiCompatibleFetcherConfig {
            api_base: profile.api_base().to_string(),
            request_timeout_ms: 5_000,
        },
        profile.defaults().clone(),
    )
    .expect("fetcher");

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: ResolutionEventSink = Arc::new(move |event| {
        sink_events.lock().expect("events lock").push(event);
    });
    let resolver = CatalogResolver::new(profile, store, Arc::new(fetcher)).with_event_sink(sink);
    (resolver, events)
}

#[tokio::test]
async fn integration_remote_listing_overrides_default_limits_and_adds_models() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/models")
            .header("authorization", "Bearer sk-iflow");
        then.status(200).json_body(json!({
            "object": "list",
            "data": [
                { "id": "A", "max_input_tokens": 2000, "max_output_tokens": 2000 },
                { "id": "B", "max_input_tokens": 500, "max_output_tokens": 500 }
            ]
        }));
    });
    let store = ScriptedCredentialStore::new(Some("sk-iflow"), None);
    let (resolver, _) = build_resolver(&server, vec![descriptor("A", 1_000)], store);

    let catalog = resolver
        .resolve_catalog(InvocationMode::Silent, &CooperativeCancellationToken::new())
        .await
        .expect("resolve");
    listing.assert_calls(1);
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.get("A").map(|d| d.max_input_tokens), Some(2_000));
    assert_eq!(catalog.get("B").map(|d| d.max_input_tokens), Some(500));
}

#[tokio::test]
async fn integration_missing_models_endpoint_falls_back_to_defaults_and_warns() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/v1/models");
        then.status(404).body("404 page not found");
    });
    let store = ScriptedCredentialStore::new(Some("sk-iflow"), None);
    let (resolver, events) = build_resolver(
        &server,
        vec![descriptor("A", 1_000), descriptor("B", 900)],
        store,
    );

    let catalog = resolver
        .resolve_catalog(InvocationMode::Silent, &CooperativeCancellationToken::new())
        .await
        .expect("404 must not surface as an error");
    listing.assert_calls(1);
    assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["A", "B"]);

    let events = events.lock().expect("events lock");
    let warning = events
        .iter()
        .find(|event| event["event"] == "fetch_failed")
        .expect("fetch_failed event");
    assert_eq!(warning["level"], "warn");
    assert_eq!(warning["status"], 404);
}

#[tokio::test]
async fn integration_malformed_listing_body_falls_back_to_defaults() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/models");
        then.status(200).body("<html>maintenance</html>");
    });
    let store = ScriptedCredentialStore::new(Some("sk-iflow"), None);
    let (resolver, events) = build_resolver(&server, vec![descriptor("A", 1_000)], store);

    let catalog = resolver
        .resolve_catalog(InvocationMode::Interactive, &CooperativeCancellationToken::new())
        .await
        .expect("malformed payload must not surface as an error");
    assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["A"]);
    let events = events.lock().expect("events lock");
    assert!(events
        .iter()
        .any(|event| event["event"] == "fetch_failed" && event["error_kind"] == "malformed_payload"));
}

#[tokio::test]
async fn integration_silent_without_credential_makes_no_network_calls() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/v1/models");
        then.status(200).json_body(json!({ "data": [] }));
    });
    let store = ScriptedCredentialStore::new(None, Some("never-used"));
    let (resolver, _) = build_resolver(
        &server,
        vec![descriptor("A", 1_000), descriptor("B", 900)],
        store.clone(),
    );

    let catalog = resolver
        .resolve_catalog(InvocationMode::Silent, &CooperativeCancellationToken::new())
        .await
        .expect("resolve");
    listing.assert_calls(0);
    assert_eq!(store.prompts.load(Ordering::SeqCst), 0);
    assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["A", "B"]);
}

#[tokio::test]
async fn integration_interactive_prompt_supplies_key_used_for_fetch() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/models")
            .header("authorization", "Bearer sk-entered");
        then.status(200).json_body(json!({
            "data": [{ "id": "A" }, { "id": "C", "context_length": 64000, "max_output_tokens": 8000 }]
        }));
    });
    let store = ScriptedCredentialStore::new(None, Some("sk-entered"));
    let (resolver, _) = build_resolver(&server, vec![descriptor("A", 1_000)], store.clone());

    let catalog = resolver
        .resolve_catalog(InvocationMode::Interactive, &CooperativeCancellationToken::new())
        .await
        .expect("resolve");
    listing.assert_calls(1);
    assert_eq!(store.prompts.load(Ordering::SeqCst), 1);
    assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["A", "C"]);
    assert_eq!(catalog.get("C").map(|d| d.max_input_tokens), Some(64_000));
}

#[tokio::test]
async fn integration_interactive_declined_prompt_fails_without_network_calls() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/v1/models");
        then.status(200).json_body(json!({ "data": [] }));
    });
    let store = ScriptedCredentialStore::new(None, None);
    let (resolver, _) = build_resolver(&server, vec![descriptor("A", 1_000)], store.clone());

    let error = resolver
        .resolve_catalog(InvocationMode::Interactive, &CooperativeCancellationToken::new())
        .await
        .expect_err("declined prompt should fail");
    assert!(matches!(
        error,
        CatalogResolveError::CredentialAcquisitionCancelled { .. }
    ));
    listing.assert_calls(0);
    assert_eq!(store.prompts.load(Ordering::SeqCst), 1);
}
