//! Kernel 4: STARTTLS (or direct-TLS) restricted to one `(version, cipher)`
//! pair. `get_tests` drives this once per entry of `tls::protocol_ciphers`.

use crate::model::{Endpoint, ProbeResult, TlsVersion};
use crate::xmppstream::{self, StreamParams};

use super::XMPP_DEADLINE;

pub async fn run(domain: &str, endpoint: &Endpoint, version: TlsVersion, cipher: &str) -> ProbeResult {
    let mut result = ProbeResult::new(endpoint, false);

    let tls_cfg = match crate::tls::context_for_cipher(version, cipher) {
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
