// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

pub mod auth_config;

use std::collections::HashMap;
use std::path::Path;

use anyhow::*;
use oci_client::{secrets::RegistryAuth, Reference};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Default)]
pub struct DockerConfigFile {
    auths: HashMap<String, DockerAuthConfig>,
}

#[derive(Deserialize, Serialize, Default)]
pub struct DockerAuthConfig {
    auth: String,
}

#[derive(Default)]
pub struct Auth {
    docker_config_file: DockerConfigFile,
}

impl Auth {
    pub fn new(auth_file: &[u8]) -> Result<Self> {
        let docker_config_file: DockerConfigFile = serde_json::from_slice(auth_file)?;
        Ok(Self { docker_config_file })
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("read registry auth file {}", path.display()))?;
        Self::new(&content)
    }

    /// Get a credential (RegistryAuth) for the given Reference.
    pub fn credential_for_reference(&self, reference: &Reference) -> Result<RegistryAuth> {
        auth_config::credential_from_auth_config(reference, &self.docker_config_file.auths)
    }
}
