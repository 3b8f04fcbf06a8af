// Copyright (c) 2025 The image-sign Authors
//
// SPDX-License-Identifier: Apache-2.0

//! Private key passphrase acquisition.
//!
//! Sources are tried in priority order: the [`IMAGE_SIGN_PASSWORD`]
//! environment variable (used verbatim whenever it is set, even to the
//! empty string), an interactive terminal prompt with echo suppressed,
//! and finally piped standard input read to EOF.
//!
//! "No passphrase" and "passphrase is the empty string" are different
//! states for key decryption, so a zero-length result always
//! normalizes to the absent marker instead of an empty byte sequence.

use std::io::{IsTerminal, Read, Write};

use log::debug;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::IMAGE_SIGN_PASSWORD;

/// A passphrase, or `None` when the caller never supplied one.
pub type Passphrase = Option<Zeroizing<Vec<u8>>>;

#[derive(Error, Debug)]
pub enum PassphraseError {
    #[error("failed to read passphrase from stdin: {source}")]
    Stdin {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to prompt for passphrase: {source}")]
    Prompt {
        #[source]
        source: std::io::Error,
    },
}

pub trait PassphraseProvider: Send {
    /// Resolve the passphrase. Called lazily, and possibly more than
    /// once per signing operation (once per signer construction
    /// attempt), so implementations must be repeatable.
    fn passphrase(&mut self) -> Result<Passphrase, PassphraseError>;
}

/// Provider backed by the process environment and standard input.
///
/// The first answer is cached: stdin can only be drained once, but the
/// key resolver may legitimately ask again for a retry attempt.
#[derive(Default)]
pub struct StdPassphraseProvider {
    cached: Option<Passphrase>,
}

impl PassphraseProvider for StdPassphraseProvider {
    fn passphrase(&mut self) -> Result<Passphrase, PassphraseError> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let pass = read_passphrase()?;
        self.cached = Some(pass.clone());
        Ok(pass)
    }
}

fn read_passphrase() -> Result<Passphrase, PassphraseError> {
    if let Some(value) = std::env::var_os(IMAGE_SIGN_PASSWORD) {
        debug!("using passphrase from ${IMAGE_SIGN_PASSWORD}");
        return Ok(normalize(os_bytes(value)));
    }
    if std::io::stdin().is_terminal() {
        return prompt("Enter password for private key: ");
    }
    drain(std::io::stdin())
}

/// Read all of `reader` and use the bytes verbatim, no trimming.
fn drain(mut reader: impl Read) -> Result<Passphrase, PassphraseError> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|source| PassphraseError::Stdin { source })?;
    Ok(normalize(buf))
}

/// Prompt on the terminal with echo suppressed. The entered line
/// terminator is stripped; interactive operators do not mean to type a
/// newline into their passphrase.
fn prompt(message: &str) -> Result<Passphrase, PassphraseError> {
    use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};

    let stdin = std::io::stdin();
    eprint!("{message}");
    let _ = std::io::stderr().flush();

    let saved = tcgetattr(&stdin).map_err(|e| PassphraseError::Prompt {
        source: std::io::Error::from_raw_os_error(e as i32),
    })?;
    let mut silent = saved.clone();
    silent.local_flags.remove(LocalFlags::ECHO);
    tcsetattr(&stdin, SetArg::TCSANOW, &silent).map_err(|e| PassphraseError::Prompt {
        source: std::io::Error::from_raw_os_error(e as i32),
    })?;

    let mut line = String::new();
    let read = stdin.read_line(&mut line);

    // Restore the terminal before looking at the read result.
    let _ = tcsetattr(&stdin, SetArg::TCSANOW, &saved);
    eprintln!();

    read.map_err(|source| PassphraseError::Stdin { source })?;
    let entered = line.trim_end_matches(['\n', '\r']);
    Ok(normalize(entered.as_bytes().to_vec()))
}

fn normalize(bytes: Vec<u8>) -> Passphrase {
    if bytes.is_empty() {
        None
    } else {
        Some(Zeroizing::new(bytes))
    }
}

#[cfg(unix)]
fn os_bytes(value: std::ffi::OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    value.into_vec()
}

#[cfg(not(unix))]
fn os_bytes(value: std::ffi::OsString) -> Vec<u8> {
    value.to_string_lossy().into_owned().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_var_wins() {
        std::env::set_var(IMAGE_SIGN_PASSWORD, "abc");
        let got = read_passphrase().unwrap();
        std::env::remove_var(IMAGE_SIGN_PASSWORD);
        assert_eq!(got.as_deref().map(|b| b.as_slice()), Some(b"abc".as_ref()));
    }

    #[test]
    #[serial]
    fn empty_env_var_means_no_passphrase() {
        std::env::set_var(IMAGE_SIGN_PASSWORD, "");
        let got = read_passphrase().unwrap();
        std::env::remove_var(IMAGE_SIGN_PASSWORD);
        assert!(got.is_none());
    }

    #[test]
    fn piped_input_is_not_trimmed() {
        let got = drain(std::io::Cursor::new(b"hunter2\n".to_vec())).unwrap();
        assert_eq!(
            got.as_deref().map(|b| b.as_slice()),
            Some(b"hunter2\n".as_ref())
        );
    }

    #[test]
    fn empty_input_normalizes_to_absent() {
        assert!(drain(std::io::Cursor::new(Vec::new())).unwrap().is_none());
        assert!(normalize(Vec::new()).is_none());
    }

    #[test]
    #[serial]
    fn provider_caches_its_first_answer() {
        std::env::set_var(IMAGE_SIGN_PASSWORD, "first");
        let mut provider = StdPassphraseProvider::default();
        let first = provider.passphrase().unwrap();
        std::env::set_var(IMAGE_SIGN_PASSWORD, "second");
        let second = provider.passphrase().unwrap();
        std::env::remove_var(IMAGE_SIGN_PASSWORD);
        assert_eq!(
            first.as_deref().map(|b| b.as_slice()),
            second.as_deref().map(|b| b.as_slice())
        );
        assert_eq!(
            first.as_deref().map(|b| b.as_slice()),
            Some(b"first".as_ref())
        );
    }
}
