//! Command line and environment configuration.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::{manifest::MANIFEST_FILE, store::Credentials};

#[derive(Debug, Parser)]
#[command(name = "spectraloptica", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a capture project to DICOM and upload it to the store.
    Dicomize(DicomizeArgs),
    /// Serve the viewer REST endpoints.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Base URL of the Orthanc server.
    #[arg(long, env = "ORTHANC_SERVER", default_value = "http://localhost:8042")]
    pub orthanc: String,

    #[arg(long, env = "ORTHANC_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "ORTHANC_PASSWD", hide_env_values = true)]
    pub password: Option<String>,
}

impl StoreArgs {
    /// Basic-auth credentials, when both halves are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Args)]
pub struct DicomizeArgs {
    /// Directory holding the captures and their manifest.
    pub project: PathBuf,

    /// Manifest path, `<project>/spectral.json` by default.
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

impl DicomizeArgs {
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.project.join(MANIFEST_FILE))
    }
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "SPECTRALOPTICA_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Directory of a built viewer to serve at `/{series}`.
    #[arg(long, env = "SPECTRALOPTICA_VIEWER_DIR")]
    pub viewer_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn dicomize_defaults_to_project_manifest() {
        let cli = Cli::try_parse_from([
            "spectraloptica",
            "--orthanc",
            "http://orthanc:8042",
            "dicomize",
            "data/sample",
        ])
        .unwrap();
        assert_eq!(cli.store.orthanc, "http://orthanc:8042");
        match cli.command {
            Command::Dicomize(args) => {
                assert_eq!(args.manifest_path(), PathBuf::from("data/sample/spectral.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn credentials_need_both_halves() {
        let store = StoreArgs {
            orthanc: "http://localhost:8042".into(),
            username: Some("orthanc".into()),
            password: None,
        };
        assert_eq!(store.credentials(), None);

        let store = StoreArgs {
            password: Some("secret".into()),
            ..store
        };
        assert_eq!(
            store.credentials(),
            Some(Credentials {
                username: "orthanc".into(),
                password: "secret".into(),
            })
        );
    }

    #[test]
    fn serve_parses_bind_address() {
        let cli = Cli::try_parse_from(["spectraloptica", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        match cli.command {
            Command::Serve(args) => assert_eq!(args.bind, "0.0.0.0:8080".parse().unwrap()),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
