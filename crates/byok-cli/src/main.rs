mod bootstrap_helpers;
mod cli_args;
mod env_credential_store;
mod known_models;

use std::sync::Arc;

use anyhow::{Context, Result};
use byok_catalog::{
    model_catalog_json, render_model_catalog, CatalogResolver, CooperativeCancellationToken,
    InvocationMode, OpenAiCompatibleCatalogFetcher, OpenAiCompatibleFetcherConfig,
    ProviderProfile, ResolutionEventSink,
};
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::env_credential_store::EnvCredentialStore;
use crate::known_models::load_known_models;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let known_models = load_known_models(cli.known_models.as_deref())?;
    let mut profile = ProviderProfile::built_in(&cli.provider, known_models.as_ref())?;
    if let Some(api_base) = cli.api_base.as_deref() {
        profile = profile.with_api_base(api_base);
    }

    let fetcher = OpenAiCompatibleCatalogFetcher::new(
        OpenAiCompatibleFetcherConfig {
            api_base: profile.api_base().to_string(),
            request_timeout_ms: cli.request_timeout_ms,
        },
        profile.defaults().clone(),
    )
    .context("failed to build remote catalog fetcher")?;

    let provider_id = profile.provider_id().to_string();
    let mut resolver = CatalogResolver::new(
        profile,
        Arc::new(EnvCredentialStore::default()),
        Arc::new(fetcher),
    );
    if cli.print_events {
        let sink: ResolutionEventSink = Arc::new(|event| eprintln!("{event}"));
        resolver = resolver.with_event_sink(sink);
    }

    let cancellation = CooperativeCancellationToken::new();
    {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        });
    }

    let mode = InvocationMode::from(cli.mode);
    let catalog = resolver
        .resolve_catalog(mode, &cancellation)
        .await
        .with_context(|| format!("failed to resolve {mode} catalog for '{provider_id}'"))?;

    if cli.json {
        let payload = serde_json::to_string_pretty(&model_catalog_json(&provider_id, &catalog))
            .context("failed to serialize resolved catalog")?;
        println!("{payload}");
    } else {
        println!("{}", render_model_catalog(&provider_id, &catalog));
    }
    Ok(())
}
