//! Install command - resolve, restore or build, configure the environment

use crate::cache::{CacheStore, LocalCacheStore};
use crate::catalog::VersionCatalog;
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::env::ProcessEnvironment;
use crate::error::ProvisionResult;
use crate::orchestrator::{InstallOrchestrator, InstallPath, InstallRequest};
use crate::platform::{Platform, PlatformFingerprint};
use crate::process::TokioProcessRunner;
use crate::provision::create_provisioner;
use crate::ui::{self, UiContext};
use std::sync::Arc;
use tracing::debug;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> ProvisionResult<()> {
    let ctx = UiContext::detect();

    let catalog = VersionCatalog::load(config.catalog.path.as_deref()).await?;
    let platform = Platform::detect();
    let fingerprint = PlatformFingerprint::detect().await;
    debug!("Platform {} ({})", platform.name(), fingerprint);

    let runner = Arc::new(TokioProcessRunner::new().with_echo(config.general.echo_output));
    let provisioner = create_provisioner(platform, config, runner, ctx.clone())?;
    let cache: Arc<dyn CacheStore> = Arc::new(LocalCacheStore::new(config.cache.dir.clone()));

    let orchestrator = InstallOrchestrator::new(
        catalog,
        provisioner,
        cache,
        Arc::new(ProcessEnvironment::detect()),
        fingerprint,
    );

    let request = InstallRequest {
        token: args.version_token().to_string(),
        cache_enabled: args.cache_enabled() && config.cache.enabled,
    };
    let outcome = orchestrator.run(&request).await?;

    ui::set_output("version", &outcome.version.minor).await?;

    ui::section(&ctx, &format!("VapourSynth {}", outcome.version.minor));
    match outcome.path {
        InstallPath::Restored => ui::step_ok_detail(
            &ctx,
            "Restored from cache",
            outcome.cache_key.as_ref().map(|k| k.as_str()).unwrap_or("-"),
        ),
        InstallPath::Built => {
            ui::step_ok(&ctx, "Built from source");
            match outcome.cache_key {
                Some(ref key) => ui::step_ok_detail(&ctx, "Saved to cache", key.as_str()),
                None if request.cache_enabled => {
                    ui::step_warn_hint(&ctx, "Not cached", "run with -v for details")
                }
                None => ui::step_info(&ctx, "Cache disabled"),
            }
        }
    }
    ui::key_value(&ctx, "vapoursynth", &outcome.version.vs_ref);
    ui::key_value(&ctx, "zimg", &outcome.version.zimg_ref);
    ui::outro_success(&ctx, "VapourSynth installation completed successfully");

    Ok(())
}
