//! Probe kernels: `(endpoint, params) -> ProbeResult`, one function per
//! kernel (spec.md §4.5). Dispatch is a plain match over a tagged union
//! rather than a dynamic parameter-bag/iterator-trait-object pair (see
//! DESIGN.md, REDESIGN FLAGS).

pub mod basic;
pub mod socket;
pub mod tls_cipher;
pub mod tls_version;

use std::time::Duration;

use crate::model::{Endpoint, ProbeResult, TlsVersion};

pub const SOCKET_DEADLINE: Duration = Duration::from_secs(2);
pub const XMPP_DEADLINE: Duration = Duration::from_secs(10);

/// Which probe kernel to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKernel {
    Socket,
    BasicXmpp,
    TlsVersion,
    TlsCipher,
}

/// Parameters for one probe invocation. The parameter-free kernels always
/// run against a single `None`; `TlsVersion`/`TlsCipher` run once per entry
/// `get_tests` enumerates.
#[derive(Debug, Clone)]
pub enum ProbeParams {
    None,
    Version(TlsVersion),
    Cipher(TlsVersion, String),
}

/// Enumerate the parameter sets `kernel` must run, independent of any one
/// endpoint (version/cipher support is a host-wide property, not a
/// per-endpoint one).
pub async fn get_tests(kernel: ProbeKernel) -> Vec<ProbeParams> {
    match kernel {
        ProbeKernel::Socket | ProbeKernel::BasicXmpp => vec![ProbeParams::None],
        ProbeKernel::TlsVersion => crate::tls::supported_versions(None)
            .into_iter()
            .map(ProbeParams::Version)
            .collect(),
        ProbeKernel::TlsCipher => crate::tls::protocol_ciphers()
            .await
            .into_iter()
            .map(|(version, cipher)| ProbeParams::Cipher(version, cipher))
            .collect(),
    }
}

/// Run one `(endpoint, params)` tuple under `kernel`.
pub async fn run(
    kernel: ProbeKernel,
    domain: &str,
    endpoint: &Endpoint,
    params: &ProbeParams,
) -> ProbeResult {
    match kernel {
        ProbeKernel::Socket => socket::run(endpoint).await,
        ProbeKernel::BasicXmpp => basic::run(domain, endpoint).await,
        ProbeKernel::TlsVersion => {
            let ProbeParams::Version(version) = params else {
                unreachable!("scheduler paired TlsVersion kernel with non-Version params")
            };
            tls_version::run(domain, endpoint, *version).await
        }
        ProbeKernel::TlsCipher => {
            let ProbeParams::Cipher(version, cipher) = params else {
                unreachable!("scheduler paired TlsCipher kernel with non-Cipher params")
            };
            tls_cipher::run(domain, endpoint, *version, cipher).await
        }
    }
}
