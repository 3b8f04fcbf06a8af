// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

/// Environment variable consulted first when a private key passphrase
/// is needed. Honored even when set to the empty string.
pub const IMAGE_SIGN_PASSWORD: &str = "IMAGE_SIGN_PASSWORD";

pub mod annotations;
pub mod auth;
pub mod keys;
pub mod mechanism;
pub mod payload;
pub mod registry;
pub mod sign;
