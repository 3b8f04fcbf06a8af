// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

//! Registry-side collaborators: image digest resolution and signature
//! submission. The signing core only depends on the [`SigningService`]
//! capability; [`http`] provides the service-backed implementation.

use async_trait::async_trait;
use oci_client::{secrets::RegistryAuth, Reference};
use thiserror::Error;

use crate::sign::SigningResult;

pub mod http;

/// What the service knows about an image before signing.
#[derive(Debug, Clone)]
pub struct ImageDetails {
    /// Content digest of the image manifest, `sha256:...`.
    pub digest: String,
    /// Fully resolved content identity of the image.
    pub id: String,
}

/// Opaque receipt for an accepted signature.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub signature_digest: String,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("request to signing service failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("signing service rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed response from signing service: {source}")]
    MalformedResponse {
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
pub trait SigningService: Send + Sync {
    /// Resolve an image reference (or local image ID) to its details.
    async fn image_details(
        &self,
        image: &str,
        auth: &RegistryAuth,
    ) -> Result<ImageDetails, RegistryError>;

    /// Submit a finished signature for `image`. Failures surface
    /// verbatim; the core never retries.
    async fn submit_signature(
        &self,
        image: &str,
        result: &SigningResult,
        auth: &RegistryAuth,
    ) -> Result<Confirmation, RegistryError>;
}

/// True when `image` is a bare content-ID prefix (lowercase hex)
/// rather than a registry reference. Such aliases only mean something
/// on the machine that produced them, so signatures must be keyed on
/// the fully resolved identity instead.
pub fn is_local_reference(image: &str) -> bool {
    (3..=64).contains(&image.len())
        && image
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// The `repo@digest` form of the signing target. Falls back to the
/// bare digest when the image never parsed as a reference, which is
/// tolerated for purely local images.
pub fn digest_reference(reference: Option<&Reference>, digest: &str) -> String {
    match reference {
        Some(r) => Reference::with_digest(
            r.registry().to_string(),
            r.repository().to_string(),
            digest.to_string(),
        )
        .whole(),
        None => digest.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("deadbeef", true)]
    #[case("0123abc", true)]
    #[case("ab", false)] // too short to be an ID prefix
    #[case("DEADBEEF", false)]
    #[case("quay.io/repo:latest", false)]
    #[case("sha256:deadbeef", false)]
    #[case("", false)]
    fn local_reference_detection(#[case] image: &str, #[case] expect: bool) {
        assert_eq!(is_local_reference(image), expect);
    }

    #[test]
    fn digest_reference_keeps_the_repository() {
        let reference = Reference::try_from("quay.io/repo:latest").unwrap();
        let got = digest_reference(Some(&reference), "sha256:deadbeef");
        assert_eq!(got, "quay.io/repo@sha256:deadbeef");
    }

    #[test]
    fn digest_reference_without_a_reference_is_the_digest() {
        assert_eq!(digest_reference(None, "sha256:deadbeef"), "sha256:deadbeef");
    }
}
