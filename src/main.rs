use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use spectraloptica::{
    config::{Cli, Command},
    dicomizer::dicomize,
    manifest::CalibrationManifest,
    server::{AppState, router},
    store::OrthancStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = Arc::new(OrthancStore::new(&cli.store.orthanc, cli.store.credentials()));

    match cli.command {
        Command::Dicomize(args) => {
            let manifest_path = args.manifest_path();
            let manifest = CalibrationManifest::load(&manifest_path)
                .with_context(|| format!("loading {}", manifest_path.display()))?;
            info!(
                "Converting {} captures from {}",
                manifest.capture_count(),
                args.project.display()
            );
            let summary = dicomize(store.as_ref(), &args.project, &manifest).await?;
            info!(
                "Uploaded {} instances to series {}",
                summary.instances.len(),
                summary.series_id.as_deref().unwrap_or("-")
            );
        }
        Command::Serve(args) => {
            let mut state = AppState::new(store);
            if let Some(viewer_dir) = args.viewer_dir {
                state = state.with_viewer_dir(viewer_dir);
            }
            let listener = tokio::net::TcpListener::bind(args.bind)
                .await
                .with_context(|| format!("binding {}", args.bind))?;
            info!("Listening on {}, store {}", args.bind, cli.store.orthanc);
            axum::serve(listener, router(state)).await?;
        }
    }

    Ok(())
}
