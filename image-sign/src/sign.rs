// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

//! The signing workflow.
//!
//! One synchronous sequence per invocation: resolve the image digest,
//! build a signer from the key input, assemble annotations keyed on
//! the signed identity, sign, and submit. Any failure aborts the whole
//! operation; nothing here retries.

use base64::Engine;
use log::{debug, info};
use oci_client::{secrets::RegistryAuth, Reference};
use thiserror::Error;

use crate::annotations::{self, AnnotationSet};
use crate::keys::{self, passphrase::PassphraseProvider, KeyResolveError};
use crate::mechanism::{KeyMechanism, MechanismError};
use crate::registry::{self, Confirmation, RegistryError, SigningService};

/// One signing operation.
pub struct SignRequest {
    /// Image reference or local image ID.
    pub image: String,
    /// Key file path or raw key material.
    pub key: String,
    /// Caller-supplied annotation overrides.
    pub annotations: AnnotationSet,
    /// Registry credential forwarded to the collaborators.
    pub auth: RegistryAuth,
}

/// The finished artifact handed to the submission boundary.
#[derive(Debug, Clone)]
pub struct SigningResult {
    /// `repo@digest` form of what was signed.
    pub digest_reference: String,
    /// The payload the signature covers.
    pub payload: Vec<u8>,
    /// Base64-encoded signature over the payload.
    pub signature_b64: String,
    /// Annotations embedded in the payload.
    pub annotations: AnnotationSet,
    /// PEM-encoded verifying key, when the signer exposes one.
    pub public_key_pem: Option<String>,
}

#[derive(Error, Debug)]
pub enum SignError {
    #[error("key is required")]
    MissingKey,

    #[error("failed to parse provided annotations: {0}")]
    Annotations(#[from] annotations::AnnotationError),

    #[error("failed to resolve image details: {source}")]
    Resolution {
        #[source]
        source: RegistryError,
    },

    #[error(transparent)]
    KeyResolve(#[from] KeyResolveError),

    #[error("failed to sign image payload: {source}")]
    Sign {
        #[source]
        source: MechanismError,
    },

    #[error("failed to submit signature: {source}")]
    Submission {
        #[source]
        source: RegistryError,
    },
}

/// Produce a [`SigningResult`] without submitting it.
pub async fn generate(
    service: &dyn SigningService,
    mechanism: &dyn KeyMechanism,
    passphrase: &mut dyn PassphraseProvider,
    request: &SignRequest,
) -> Result<SigningResult, SignError> {
    if request.key.is_empty() {
        return Err(SignError::MissingKey);
    }
    // Reject bad overrides before any I/O happens.
    annotations::validate_overrides(&request.annotations)?;

    // Parse failure is tolerated: a local image ID is not a reference.
    let reference = Reference::try_from(request.image.as_str()).ok();

    let details = service
        .image_details(&request.image, &request.auth)
        .await
        .map_err(|source| SignError::Resolution { source })?;
    let digest_reference = registry::digest_reference(reference.as_ref(), &details.digest);
    info!(
        "signing image {} (digest: {digest_reference})",
        request.image
    );

    let signer = keys::resolve(&request.key, mechanism, passphrase).await?;

    // Annotations key off a stable identity: a content-ID alias is
    // replaced by the fully resolved identity before signing.
    let signed_name = match &reference {
        Some(r) if !registry::is_local_reference(&request.image) => r.whole(),
        _ => details.id.clone(),
    };
    let annotations = annotations::assemble(&signed_name, &request.annotations)?;
    debug!("payload annotations: {annotations:?}");

    let (payload, signature) = signer
        .sign(&digest_reference, &annotations)
        .map_err(|source| SignError::Sign { source })?;
    let signature_b64 = base64::engine::general_purpose::STANDARD.encode(&signature);
    let public_key_pem = signer
        .public_key_pem()
        .map_err(|source| SignError::Sign { source })?;

    Ok(SigningResult {
        digest_reference,
        payload,
        signature_b64,
        annotations,
        public_key_pem,
    })
}

/// Run the whole workflow: generate a signature and submit it.
pub async fn sign_image(
    service: &dyn SigningService,
    mechanism: &dyn KeyMechanism,
    passphrase: &mut dyn PassphraseProvider,
    request: &SignRequest,
) -> Result<Confirmation, SignError> {
    let result = generate(service, mechanism, passphrase, request).await?;
    service
        .submit_signature(&request.image, &result, &request.auth)
        .await
        .map_err(|source| SignError::Submission { source })
}
