// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use anyhow::*;
use base64::Engine;
use oci_client::{secrets::RegistryAuth, Reference};

use super::DockerAuthConfig;

/// Alternate registry keys docker clients historically wrote for the
/// default registry.
const DOCKER_IO_ALIASES: &[&str] = &[
    "docker.io",
    "index.docker.io",
    "https://index.docker.io/v1/",
    "registry-1.docker.io",
];

/// Look up the credential for `reference` in a docker-style auths map.
/// Returns an anonymous credential when no entry matches.
pub fn credential_from_auth_config(
    reference: &Reference,
    auths: &HashMap<String, DockerAuthConfig>,
) -> Result<RegistryAuth> {
    let registry = reference.resolve_registry();

    let entry = candidate_keys(registry)
        .into_iter()
        .find_map(|key| auths.get(key.as_str()));
    let Some(entry) = entry else {
        return Ok(RegistryAuth::Anonymous);
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&entry.auth)
        .context("base64 decode registry auth entry")?;
    let decoded = String::from_utf8(decoded).context("registry auth entry is not utf-8")?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| anyhow!("registry auth entry is not `user:password`"))?;
    Ok(RegistryAuth::Basic(username.into(), password.into()))
}

fn candidate_keys(registry: &str) -> Vec<String> {
    let mut keys = vec![registry.to_string(), format!("https://{registry}")];
    if DOCKER_IO_ALIASES.contains(&registry) {
        keys.extend(DOCKER_IO_ALIASES.iter().map(|a| a.to_string()));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn auths(entries: &[(&str, &str)]) -> HashMap<String, DockerAuthConfig> {
        entries
            .iter()
            .map(|(registry, userpass)| {
                let auth = base64::engine::general_purpose::STANDARD.encode(userpass);
                (registry.to_string(), DockerAuthConfig { auth })
            })
            .collect()
    }

    #[test]
    fn exact_registry_match() {
        let auths = auths(&[("quay.io", "alice:secret")]);
        let reference = Reference::try_from("quay.io/repo:latest").unwrap();
        let cred = credential_from_auth_config(&reference, &auths).unwrap();
        assert!(matches!(
            cred,
            RegistryAuth::Basic(user, pass) if user == "alice" && pass == "secret"
        ));
    }

    #[test]
    fn docker_io_alias_match() {
        let auths = auths(&[("https://index.docker.io/v1/", "bob:hunter2")]);
        let reference = Reference::try_from("docker.io/library/busybox:latest").unwrap();
        let cred = credential_from_auth_config(&reference, &auths).unwrap();
        assert!(matches!(cred, RegistryAuth::Basic(user, _) if user == "bob"));
    }

    #[test]
    fn unknown_registry_is_anonymous() {
        let auths = auths(&[("quay.io", "alice:secret")]);
        let reference = Reference::try_from("ghcr.io/org/repo:latest").unwrap();
        let cred = credential_from_auth_config(&reference, &auths).unwrap();
        assert!(matches!(cred, RegistryAuth::Anonymous));
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let auths = auths(&[("quay.io", "no-colon-here")]);
        let reference = Reference::try_from("quay.io/repo:latest").unwrap();
        assert!(credential_from_auth_config(&reference, &auths).is_err());
    }
}
