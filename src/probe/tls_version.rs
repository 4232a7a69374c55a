//! Kernel 3: STARTTLS (or direct-TLS) restricted to exactly one protocol
//! version. `get_tests` drives this once per entry of `tls::supported_versions`.

use crate::model::{Endpoint, ProbeResult, TlsVersion};
use crate::xmppstream::{self, StreamParams};

use super::XMPP_DEADLINE;

pub async fn run(domain: &str, endpoint: &Endpoint, version: TlsVersion) -> ProbeResult {
    let mut result = ProbeResult::new(endpoint, false);

    let tls_cfg = match crate::tls::context_for(version) {
        Ok(cfg) => cfg,
        Err(_) => return result,
    };

    let outcome = xmppstream::run(StreamParams {
        host: domain.to_string(),
        ip: endpoint.ip,
        port: endpoint.srv.port,
        direct_tls: endpoint.is_direct_tls(),
        tls: Some(tls_cfg),
        deadline: XMPP_DEADLINE,
    })
    .await;

    result.success = outcome.success;
    result.starttls = Some(outcome.starttls);
    result.tls = outcome.tls;
    result
}
