// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

//! Signature annotation assembly.
//!
//! A signature carries a set of key/value annotations: a fixed default
//! set keyed off the signed image identity, with caller-supplied
//! overrides layered on top. Annotation keys must stay addressable by
//! label selectors, so keys are held to qualified-name syntax. Values
//! are free-form metadata; the two value-level complaints (too long,
//! bad pattern) are collected and dropped instead of failing the
//! operation.

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

/// Default annotation recording the identity the signature was made for.
pub const SIGNED_NAME_ANNOTATION: &str = "image-sign.io/signed-name";

const MAX_NAME_LEN: usize = 63;
const MAX_VALUE_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

pub type AnnotationSet = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("invalid annotation key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

/// The default annotations for a signature over `signed_identity`.
pub fn default_annotations(signed_identity: &str) -> AnnotationSet {
    let mut set = AnnotationSet::new();
    set.insert(SIGNED_NAME_ANNOTATION.into(), signed_identity.into());
    set
}

/// Check caller-supplied overrides against label-selector syntax.
///
/// Key violations are fatal. Value violations (too long, pattern) are
/// dropped, since values never need to be selector-addressable.
pub fn validate_overrides(overrides: &AnnotationSet) -> Result<(), AnnotationError> {
    for (key, value) in overrides {
        if let Err(reason) = validate_key(key) {
            return Err(AnnotationError::InvalidKey {
                key: key.clone(),
                reason,
            });
        }
        if let Some(complaint) = validate_value(value) {
            debug!("ignoring value complaint for annotation {key:?}: {complaint}");
        }
    }
    Ok(())
}

/// Merge the default annotations for `signed_identity` with the given
/// overrides, override values winning on key collision. The overrides
/// are validated first; a key violation aborts the whole assembly.
pub fn assemble(
    signed_identity: &str,
    overrides: &AnnotationSet,
) -> Result<AnnotationSet, AnnotationError> {
    validate_overrides(overrides)?;
    Ok(merged(default_annotations(signed_identity), overrides))
}

fn merged(defaults: AnnotationSet, overrides: &AnnotationSet) -> AnnotationSet {
    let mut set = defaults;
    set.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    set
}

/// A qualified name: an optional DNS subdomain prefix separated by a
/// single `/` from a name part of at most 63 characters.
fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("name part must be non-empty".into());
    }
    if key.matches('/').count() > 1 {
        return Err("a qualified name may contain at most one '/'".into());
    }
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            return Err("prefix part must be non-empty".into());
        }
        if !is_dns_subdomain(prefix) {
            return Err(format!(
                "prefix part {prefix:?} must be a lowercase DNS subdomain"
            ));
        }
    }
    if name.is_empty() {
        return Err("name part must be non-empty".into());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!(
            "name part must be no more than {MAX_NAME_LEN} characters"
        ));
    }
    if !is_label_token(name) {
        return Err(
            "name part must consist of alphanumeric characters, '-', '_' or '.', \
             and must start and end with an alphanumeric character"
                .into(),
        );
    }
    Ok(())
}

fn validate_value(value: &str) -> Option<&'static str> {
    if value.len() > MAX_VALUE_LEN {
        return Some("value is longer than 63 characters");
    }
    if !value.is_empty() && !is_label_token(value) {
        return Some("value does not match the label value pattern");
    }
    None
}

/// `[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?`
fn is_label_token(s: &str) -> bool {
    let bytes = s.as_bytes();
    let inner = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.');
    bytes.first().is_some_and(|b| b.is_ascii_alphanumeric())
        && bytes.last().is_some_and(|b| b.is_ascii_alphanumeric())
        && bytes.iter().all(|&b| inner(b))
}

fn is_dns_subdomain(s: &str) -> bool {
    let label_ok = |label: &str| {
        let bytes = label.as_bytes();
        !label.is_empty()
            && label.len() <= MAX_NAME_LEN
            && bytes.first().is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            && bytes.last().is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            && bytes
                .iter()
                .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    };
    s.len() <= MAX_PREFIX_LEN && s.split('.').all(label_ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set(entries: &[(&str, &str)]) -> AnnotationSet {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_record_the_signed_identity() {
        let defaults = default_annotations("sha256:deadbeef");
        assert_eq!(
            defaults,
            set(&[(SIGNED_NAME_ANNOTATION, "sha256:deadbeef")])
        );
    }

    #[test]
    fn overrides_win_on_collision() {
        let defaults = set(&[("a", "1"), ("b", "2")]);
        let overrides = set(&[("b", "9"), ("c", "3")]);
        assert_eq!(
            merged(defaults, &overrides),
            set(&[("a", "1"), ("b", "9"), ("c", "3")])
        );
    }

    #[test]
    fn assemble_lets_the_caller_replace_a_default() {
        let overrides = set(&[(SIGNED_NAME_ANNOTATION, "custom"), ("team", "build")]);
        let assembled = assemble("sha256:deadbeef", &overrides).unwrap();
        assert_eq!(
            assembled,
            set(&[(SIGNED_NAME_ANNOTATION, "custom"), ("team", "build")])
        );
    }

    #[rstest]
    #[case("/leading-slash")]
    #[case("")]
    #[case("two/slashes/here")]
    #[case("trailing-slash/")]
    #[case("UpperPrefix.Io/name")]
    #[case("-starts-with-dash")]
    #[case("ends.with.dot.")]
    fn bad_keys_are_fatal(#[case] key: &str) {
        let overrides = set(&[(key, "v")]);
        assert!(matches!(
            validate_overrides(&overrides),
            Err(AnnotationError::InvalidKey { .. })
        ));
    }

    #[test]
    fn over_long_key_name_is_fatal() {
        let key = "k".repeat(MAX_NAME_LEN + 1);
        let overrides = set(&[(key.as_str(), "v")]);
        assert!(validate_overrides(&overrides).is_err());
    }

    #[rstest]
    #[case("team", "build")]
    #[case("example.com/release", "v1.2.3")]
    #[case("empty-value", "")]
    fn good_entries_pass(#[case] key: &str, #[case] value: &str) {
        assert!(validate_overrides(&set(&[(key, value)])).is_ok());
    }

    #[rstest]
    #[case("has spaces in it")]
    #[case("ends-with-dash-")]
    fn value_pattern_complaints_are_dropped(#[case] value: &str) {
        let overrides = set(&[("key", value)]);
        assert!(validate_overrides(&overrides).is_ok());
        let assembled = assemble("sha256:deadbeef", &overrides).unwrap();
        assert_eq!(assembled.get("key").map(String::as_str), Some(value));
    }

    #[test]
    fn over_long_value_is_dropped_not_fatal() {
        let value = "v".repeat(MAX_VALUE_LEN + 1);
        let overrides = set(&[("key", value.as_str())]);
        assert!(validate_overrides(&overrides).is_ok());
    }
}
