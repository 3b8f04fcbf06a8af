// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::*;
use clap::Parser;
use log::*;
use oci_client::{secrets::RegistryAuth, Reference};

use image_sign::annotations::AnnotationSet;
use image_sign::auth::Auth;
use image_sign::keys::passphrase::StdPassphraseProvider;
use image_sign::mechanism::ecdsa::EcdsaMechanism;
use image_sign::registry::http::HttpSigningService;
use image_sign::sign::{self, SignRequest};

#[derive(Parser)]
#[command(name = "image-sign", about = "Sign a container image")]
struct Cli {
    /// Image reference or local image ID to sign
    image: String,

    /// Key to use for signing: a key file, or raw key material
    #[arg(short, long)]
    key: String,

    /// Annotations to add to the signature (key=value, repeatable)
    #[arg(short = 'a', long = "annotation", value_name = "KEY=VALUE")]
    annotations: Vec<String>,

    /// Base URL of the signing service
    #[arg(long, env = "IMAGE_SIGN_SERVICE", default_value = "http://localhost:8080")]
    service: String,

    /// Registry auth config; defaults to the docker config file
    #[arg(long, value_name = "PATH")]
    auth_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    let annotations = parse_annotations(&cli.annotations)?;
    let auth = registry_auth(&cli).await?;

    let service = HttpSigningService::new(&cli.service);
    let mut passphrase = StdPassphraseProvider::default();
    let request = SignRequest {
        image: cli.image,
        key: cli.key,
        annotations,
        auth,
    };

    let confirmation =
        sign::sign_image(&service, &EcdsaMechanism, &mut passphrase, &request).await?;
    info!("created signature {}", confirmation.signature_digest);

    Ok(())
}

fn parse_annotations(items: &[String]) -> Result<AnnotationSet> {
    items
        .iter()
        .map(|item| {
            item.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("annotation {item:?} is not of the form key=value"))
        })
        .collect()
}

/// Resolve a registry credential for the image being signed. Local
/// image IDs do not parse as references and stay anonymous, as does
/// anything without a matching auth entry.
async fn registry_auth(cli: &Cli) -> Result<RegistryAuth> {
    let Result::Ok(reference) = Reference::try_from(cli.image.as_str()) else {
        return Ok(RegistryAuth::Anonymous);
    };
    // An explicitly given config must load; the default location may
    // simply not exist.
    let config_path = match &cli.auth_config {
        Some(path) => path.clone(),
        None => {
            let Some(path) = default_docker_config() else {
                return Ok(RegistryAuth::Anonymous);
            };
            if !path.exists() {
                debug!("no auth config at {}", path.display());
                return Ok(RegistryAuth::Anonymous);
            }
            path
        }
    };
    let auth = Auth::from_file(&config_path).await?;
    auth.credential_for_reference(&reference)
}

fn default_docker_config() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("DOCKER_CONFIG") {
        return Some(PathBuf::from(dir).join("config.json"));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".docker/config.json"))
}
