// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

//! The simple signing envelope a signature covers.
//!
//! This is the JSON document actually signed: the image identity and
//! manifest digest under `critical`, and the assembled annotations
//! under `optional`.

use serde::{Deserialize, Serialize};

use crate::annotations::AnnotationSet;

pub const COSIGN_SIGNATURE_TYPE: &str = "cosign container image signature";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SimpleSigning {
    pub critical: Critical,
    pub optional: Option<AnnotationSet>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Critical {
    pub identity: Identity,
    pub image: TargetImage,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    #[serde(rename = "docker-reference")]
    pub docker_reference: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TargetImage {
    #[serde(rename = "docker-manifest-digest")]
    pub docker_manifest_digest: String,
}

impl SimpleSigning {
    /// Build the envelope for a `repo@digest` reference. A bare digest
    /// (no `@`) leaves the identity empty, which happens for purely
    /// local images that never got a repository name.
    pub fn new(digest_reference: &str, annotations: &AnnotationSet) -> Self {
        let (repository, digest) = match digest_reference.split_once('@') {
            Some((repository, digest)) => (repository, digest),
            None => ("", digest_reference),
        };
        Self {
            critical: Critical {
                identity: Identity {
                    docker_reference: repository.into(),
                },
                image: TargetImage {
                    docker_manifest_digest: digest.into(),
                },
                type_: COSIGN_SIGNATURE_TYPE.into(),
            },
            optional: Some(annotations.clone()),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::default_annotations;

    #[test]
    fn wire_field_names() {
        let payload = SimpleSigning::new(
            "quay.io/repo@sha256:deadbeef",
            &default_annotations("quay.io/repo:latest"),
        );
        let value: serde_json::Value =
            serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap();
        assert_eq!(
            value["critical"]["identity"]["docker-reference"],
            "quay.io/repo"
        );
        assert_eq!(
            value["critical"]["image"]["docker-manifest-digest"],
            "sha256:deadbeef"
        );
        assert_eq!(value["critical"]["type"], COSIGN_SIGNATURE_TYPE);
        assert_eq!(
            value["optional"]["image-sign.io/signed-name"],
            "quay.io/repo:latest"
        );
    }

    #[test]
    fn bare_digest_reference() {
        let payload = SimpleSigning::new("sha256:deadbeef", &AnnotationSet::new());
        assert_eq!(payload.critical.identity.docker_reference, "");
        assert_eq!(
            payload.critical.image.docker_manifest_digest,
            "sha256:deadbeef"
        );
    }
}
