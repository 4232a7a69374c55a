//! TLS context factory: builds configurations restricted to exactly one
//! protocol version (and optionally one cipher suite), and enumerates what
//! the host's OpenSSL build supports.
//!
//! Grounded in `tokio-xmpp`'s `connect::starttls` TLS setup, but the backend
//! is `openssl` rather than `rustls`/`native-tls` — see DESIGN.md for why:
//! only OpenSSL's `SslConnector`/`SslVersion` API exposes per-version pinning
//! down to SSLv3/TLSv1.0/1.1 and a cipher-list string, which spec.md §4.3
//! requires and `rustls` does not support at all.

use futures::stream::{self, BoxStream, StreamExt};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};

use crate::error::Error;
use crate::model::TlsVersion;

fn openssl_version(v: TlsVersion) -> Option<SslVersion> {
    match v {
        TlsVersion::SSLv2 => None, // OpenSSL dropped SSLv2 entirely in 1.1.0
        TlsVersion::SSLv3 => Some(SslVersion::SSL3),
        TlsVersion::TLSv1 => Some(SslVersion::TLS1),
        TlsVersion::TLSv1_1 => Some(SslVersion::TLS1_1),
        TlsVersion::TLSv1_2 => Some(SslVersion::TLS1_2),
        TlsVersion::TLSv1_3 => Some(SslVersion::TLS1_3),
    }
}

/// A TLS configuration restricted to negotiating exactly one protocol
/// version (and, if set, one cipher suite) -- hostname verification and
/// certificate trust are disabled so the handshake completes and the peer
/// certificate is captured even when untrusted or mismatched.
#[derive(Clone)]
pub struct TlsConfig {
    pub version: TlsVersion,
    pub cipher: Option<String>,
    pub(crate) connector: SslConnector,
}

fn base_builder(version: TlsVersion) -> Result<openssl::ssl::SslConnectorBuilder, Error> {
    let ssl_version = openssl_version(version).ok_or_else(|| {
        Error::Usage(format!("{} is not supported by the host TLS library", version))
    })?;
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_min_proto_version(Some(ssl_version))?;
    builder.set_max_proto_version(Some(ssl_version))?;
    // Certificates are collected, not judged: accept anything so the
    // handshake reaches completion regardless of trust or hostname match.
    builder.set_verify(SslVerifyMode::NONE);
    Ok(builder)
}

/// Which versions the host's OpenSSL build can negotiate, newest first.
/// A version is supported iff a connector restricted to exactly that version
/// can be constructed; platform-missing versions are silently absent (no
/// tag, per spec.md §7).
pub fn supported_versions(exclude: Option<TlsVersion>) -> Vec<TlsVersion> {
    TlsVersion::ALL_NEWEST_FIRST
        .into_iter()
        .filter(|v| Some(*v) != exclude)
        .filter(|v| base_builder(*v).is_ok())
        .collect()
}

/// Build a configuration that negotiates only `version`.
pub fn context_for(version: TlsVersion) -> Result<TlsConfig, Error> {
    let builder = base_builder(version)?;
    Ok(TlsConfig {
        version,
        cipher: None,
        connector: builder.build(),
    })
}

/// Unrestricted client configuration used to open a direct-TLS connection
/// for a basic probe, where no version/cipher restriction applies -- only
/// certificate verification is disabled, same as every other config here.
pub fn unrestricted() -> Result<TlsConfig, Error> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_verify(SslVerifyMode::NONE);
    Ok(TlsConfig {
        version: TlsVersion::TLSv1_3,
        cipher: None,
        connector: builder.build(),
    })
}

/// Restrict a configuration further to one cipher suite.
pub fn context_for_cipher(version: TlsVersion, cipher: &str) -> Result<TlsConfig, Error> {
    let mut builder = base_builder(version)?;
    if version == TlsVersion::TLSv1_3 {
        builder.set_ciphersuites(cipher)?;
    } else {
        builder.set_cipher_list(cipher)?;
    }
    Ok(TlsConfig {
        version,
        cipher: Some(cipher.to_string()),
        connector: builder.build(),
    })
}

/// Candidate cipher-suite names tried per protocol version. `openssl` 0.10's
/// safe API has no equivalent of `SSL_CTX_get_ciphers` to read a configured
/// list back (only `set_cipher_list`/`set_ciphersuites` to write one and
/// `SslRef::current_cipher` to inspect an established session), so this is a
/// library-native substitute for the deny-pattern enumeration spec.md §4.3
/// describes -- explicitly licensed by that section ("implementations may
/// substitute an equivalent library-native enumeration"). A name "may be
/// attempted" iff a connector can be built with it as the sole entry.
fn candidate_ciphers(version: TlsVersion) -> &'static [&'static str] {
    match version {
        TlsVersion::TLSv1_3 => &[
            "TLS_AES_256_GCM_SHA384",
            "TLS_CHACHA20_POLY1305_SHA256",
            "TLS_AES_128_GCM_SHA256",
        ],
        _ => &[
            "ECDHE-RSA-AES256-GCM-SHA384",
            "ECDHE-RSA-AES128-GCM-SHA256",
            "ECDHE-RSA-CHACHA20-POLY1305",
            "ECDHE-ECDSA-AES256-GCM-SHA384",
            "DHE-RSA-AES256-GCM-SHA384",
            "AES256-GCM-SHA384",
            "AES128-GCM-SHA256",
            "AES256-SHA",
            "DES-CBC3-SHA",
        ],
    }
}

/// Cipher-suite names that may be attempted under `version`.
pub fn ciphers_for(version: TlsVersion) -> Result<BoxStream<'static, String>, Error> {
    let names: Vec<String> = candidate_ciphers(version)
        .iter()
        .filter(|name| context_for_cipher(version, name).is_ok())
        .map(|name| name.to_string())
        .collect();
    Ok(stream::iter(names).boxed())
}

/// Cartesian product over `supported_versions()` x `ciphers_for(version)`,
/// deduplicated by cipher name (first-seen, i.e. highest version, wins).
/// This is an intentional deviation from exhaustive enumeration: a cipher
/// valid under multiple versions is probed only once, under its highest
/// version (spec.md §4.3, open question 3).
pub async fn protocol_ciphers() -> Vec<(TlsVersion, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for version in supported_versions(None) {
        let Ok(mut ciphers) = ciphers_for(version) else {
            continue;
        };
        while let Some(cipher) = ciphers.next().await {
            if seen.insert(cipher.clone()) {
                out.push((version, cipher));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sslv2_is_never_supported() {
        assert!(!supported_versions(None).contains(&TlsVersion::SSLv2));
    }

    #[test]
    fn supported_versions_are_newest_first() {
        let versions = supported_versions(None);
        for pair in versions.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[tokio::test]
    async fn cipher_dedup_is_global_across_versions() {
        let pairs = protocol_ciphers().await;
        let mut names: Vec<_> = pairs.iter().map(|(_, c)| c.clone()).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
