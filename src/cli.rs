//! Command-line surface: `<tool> [-c|-s] [--no-ipv4] [--no-ipv6] [--no-xmpps]
//! [-f table|json|csv] <subcommand> <domain>` (spec.md §6).

use clap::{Parser, Subcommand, ValueEnum};

use crate::dns::DnsFilter;
use crate::model::Side;
use crate::probe::ProbeKernel;
use crate::scheduler::EngineConfig;

#[derive(Parser)]
#[command(name = "xmpp-probe", author, version, about = "Diagnostic probe engine for XMPP service deployments")]
pub struct Cli {
    /// Probe client-side SRV families (default).
    #[arg(short = 'c', long = "client", conflicts_with = "server")]
    pub client: bool,

    /// Probe server-side SRV families.
    #[arg(short = 's', long = "server")]
    pub server: bool,

    /// Skip A-record resolution.
    #[arg(long = "no-ipv4")]
    pub no_ipv4: bool,

    /// Skip AAAA-record resolution.
    #[arg(long = "no-ipv6")]
    pub no_ipv6: bool,

    /// Skip direct-TLS (XEP-0368) SRV records.
    #[arg(long = "no-xmpps")]
    pub no_xmpps: bool,

    /// Output renderer.
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
pub enum Command {
    /// Enumerate endpoints only, no probing.
    Dns { domain: String },
    /// Bare TCP reachability.
    Socket { domain: String },
    /// Basic XMPP stream negotiation, no TLS.
    Basic { domain: String },
    /// STARTTLS/direct-TLS restricted to one protocol version at a time.
    TlsVersion { domain: String },
    /// STARTTLS/direct-TLS restricted to one (version, cipher) pair at a time.
    TlsCipher { domain: String },
}

impl Cli {
    pub fn domain(&self) -> &str {
        match &self.command {
            Command::Dns { domain }
            | Command::Socket { domain }
            | Command::Basic { domain }
            | Command::TlsVersion { domain }
            | Command::TlsCipher { domain } => domain,
        }
    }

    pub fn kernel(&self) -> Option<ProbeKernel> {
        match self.command {
            Command::Dns { .. } => None,
            Command::Socket { .. } => Some(ProbeKernel::Socket),
            Command::Basic { .. } => Some(ProbeKernel::BasicXmpp),
            Command::TlsVersion { .. } => Some(ProbeKernel::TlsVersion),
            Command::TlsCipher { .. } => Some(ProbeKernel::TlsCipher),
        }
    }

    fn side(&self) -> Side {
        if self.server {
            Side::Server
        } else {
            Side::Client
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            domain: self.domain().to_string(),
            filter: DnsFilter {
                side: self.side(),
                ipv4: !self.no_ipv4,
                ipv6: !self.no_ipv6,
                include_direct_tls: !self.no_xmpps,
            },
        }
    }
}
