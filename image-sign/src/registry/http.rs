// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP signing-service client.

use async_trait::async_trait;
use base64::Engine;
use log::debug;
use oci_client::secrets::RegistryAuth;
use serde::{Deserialize, Serialize};

use super::{Confirmation, ImageDetails, RegistryError, SigningService};
use crate::sign::SigningResult;

pub struct HttpSigningService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSigningService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[derive(Serialize)]
struct CredentialBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignBody<'a> {
    /// Signed payload bytes, base64-encoded for transport.
    payload: String,
    signature: &'a str,
    #[serde(rename = "publicKey", skip_serializing_if = "Option::is_none")]
    public_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<CredentialBody<'a>>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    digest: String,
    id: String,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signatureDigest")]
    signature_digest: String,
}

fn credential(auth: &RegistryAuth) -> Option<CredentialBody<'_>> {
    match auth {
        RegistryAuth::Basic(username, password) => Some(CredentialBody { username, password }),
        _ => None,
    }
}

#[async_trait]
impl SigningService for HttpSigningService {
    async fn image_details(
        &self,
        image: &str,
        auth: &RegistryAuth,
    ) -> Result<ImageDetails, RegistryError> {
        let mut request = self
            .client
            .get(self.endpoint("v1/images/details"))
            .query(&[("image", image)]);
        if let Some(cred) = credential(auth) {
            request = request.basic_auth(cred.username, Some(cred.password));
        }
        let response = request
            .send()
            .await
            .map_err(|source| RegistryError::Transport { source })?;
        if !response.status().is_success() {
            return Err(RegistryError::Rejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let details: DetailsResponse = response
            .json()
            .await
            .map_err(|source| RegistryError::MalformedResponse { source })?;
        Ok(ImageDetails {
            digest: details.digest,
            id: details.id,
        })
    }

    async fn submit_signature(
        &self,
        image: &str,
        result: &SigningResult,
        auth: &RegistryAuth,
    ) -> Result<Confirmation, RegistryError> {
        let body = SignBody {
            payload: base64::engine::general_purpose::STANDARD.encode(&result.payload),
            signature: &result.signature_b64,
            public_key: result.public_key_pem.as_deref(),
            auth: credential(auth),
        };
        debug!("submitting signature for {image}");
        let response = self
            .client
            .post(self.endpoint("v1/images/sign"))
            .query(&[("image", image)])
            .json(&body)
            .send()
            .await
            .map_err(|source| RegistryError::Transport { source })?;
        if !response.status().is_success() {
            return Err(RegistryError::Rejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let confirmed: SignResponse = response
            .json()
            .await
            .map_err(|source| RegistryError::MalformedResponse { source })?;
        Ok(Confirmation {
            signature_digest: confirmed.signature_digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_join_ignores_stray_slashes() {
        let service = HttpSigningService::new("http://localhost:8080/");
        assert_eq!(
            service.endpoint("/v1/images/sign"),
            "http://localhost:8080/v1/images/sign"
        );
    }
}
