//! Uniform result and record types shared by every probe kernel.

use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

/// XMPP service discovery entry for a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    /// SRV service label, e.g. `xmpp-client`.
    pub service: Service,
    /// Always `"tcp"`; kept as a field for symmetry with the DNS record shape.
    pub proto: &'static str,
    /// The domain the lookup was performed for.
    pub domain: String,
    /// Time-to-live of the SRV answer, in seconds.
    pub ttl: u32,
    /// SRV priority (lower is preferred). Preserved but not re-sorted.
    pub priority: u16,
    /// SRV weight. Preserved but not re-sorted.
    pub weight: u16,
    /// Port to connect to.
    pub port: u16,
    /// Target hostname to resolve for A/AAAA records.
    pub target: String,
}

impl SrvRecord {
    /// The owner name this record was queried under:
    /// `_{service}._{proto}.{domain}`.
    pub fn source(&self) -> String {
        format!("_{}._{}.{}", self.service.as_str(), self.proto, self.domain)
    }

    /// Direct-TLS (XEP-0368) iff the service is one of the `xmpps-*` variants.
    pub fn is_direct_tls(&self) -> bool {
        matches!(self.service, Service::XmppsClient | Service::XmppsServer)
    }
}

/// SRV service label as used in the owner name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    XmppClient,
    XmppServer,
    XmppsClient,
    XmppsServer,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::XmppClient => "xmpp-client",
            Service::XmppServer => "xmpp-server",
            Service::XmppsClient => "xmpps-client",
            Service::XmppsServer => "xmpps-server",
        }
    }
}

/// Which side of a connection is being probed: the client-facing port or the
/// server-to-server port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// One resolved address to probe: an SRV answer paired with one of its
/// resolved IP addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub srv: SrvRecord,
    pub ip: IpAddr,
    /// Position in discovery order; used only to recover a deterministic
    /// result ordering, never as a semantic sort key.
    pub(crate) order: usize,
}

impl Endpoint {
    pub fn is_direct_tls(&self) -> bool {
        self.srv.is_direct_tls()
    }

    pub fn display_target(&self) -> &str {
        &self.srv.target
    }
}

/// TLS protocol version, ordered oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum TlsVersion {
    SSLv2,
    SSLv3,
    TLSv1,
    TLSv1_1,
    TLSv1_2,
    TLSv1_3,
}

impl TlsVersion {
    /// All variants, newest first — the order `supported_versions` iterates.
    pub const ALL_NEWEST_FIRST: [TlsVersion; 6] = [
        TlsVersion::TLSv1_3,
        TlsVersion::TLSv1_2,
        TlsVersion::TLSv1_1,
        TlsVersion::TLSv1,
        TlsVersion::SSLv3,
        TlsVersion::SSLv2,
    ];
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TlsVersion::SSLv2 => "SSLv2",
            TlsVersion::SSLv3 => "SSLv3",
            TlsVersion::TLSv1 => "TLSv1",
            TlsVersion::TLSv1_1 => "TLSv1.1",
            TlsVersion::TLSv1_2 => "TLSv1.2",
            TlsVersion::TLSv1_3 => "TLSv1.3",
        };
        write!(f, "{}", s)
    }
}

/// Observed STARTTLS advertisement policy for a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StarttlsPolicy {
    /// Negotiation never reached `stream:features`.
    #[default]
    Unknown,
    /// The endpoint is direct-TLS; STARTTLS does not apply.
    NotApplicable,
    /// `stream:features` was seen and contained no `<starttls/>`.
    NotSupported,
    /// `<starttls/>` present without `<required/>`.
    Optional,
    /// `<starttls><required/></starttls>` present.
    Required,
}

/// A TLS observation attached to a version- or cipher-restricted probe result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsObservation {
    pub version: TlsVersion,
    pub cipher: Option<String>,
}

/// Uniform result record for any probe kernel.
///
/// Composition replaces the source's `Result -> BasicConnect -> TlsVersion ->
/// TlsCipher` inheritance chain: every kernel produces this same struct, with
/// `tls`/`starttls` populated according to which kernel ran.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub source: String,
    pub target: String,
    pub ip: IpAddr,
    pub port: u16,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starttls: Option<StarttlsPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsObservation>,
}

impl ProbeResult {
    pub fn new(endpoint: &Endpoint, success: bool) -> Self {
        Self {
            source: endpoint.srv.source(),
            target: endpoint.srv.target.clone(),
            ip: endpoint.ip,
            port: endpoint.srv.port,
            success,
            starttls: None,
            tls: None,
        }
    }
}

/// Severity of a [`DiagnosticTag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// A domain-wide diagnostic observation, orthogonal to any single endpoint's
/// result. `id`/`group` are the stable identifier downstream tooling matches
/// on; `message` is free-form.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticTag {
    pub id: u32,
    pub level: TagLevel,
    pub message: String,
    pub group: &'static str,
}

/// Reserved diagnostic tag ids for `group = "dns"` (spec §6).
pub mod dns_tag_ids {
    pub const SRV_MISSING: u32 = 0;
    pub const NO_A_OR_AAAA: u32 = 2;
    pub const NO_A_RECORDS: u32 = 3;
    pub const NO_AAAA_RECORDS: u32 = 4;
}
