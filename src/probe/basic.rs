//! Kernel 2: basic XMPP stream negotiation, no TLS requested. `success` iff
//! negotiation reaches `stream:features`; the observed STARTTLS policy is
//! attached regardless of outcome value.

use crate::model::{Endpoint, ProbeResult};
use crate::xmppstream::{self, StreamParams};

use super::XMPP_DEADLINE;

pub async fn run(domain: &str, endpoint: &Endpoint) -> ProbeResult {
    let outcome = xmppstream::run(StreamParams {
        host: domain.to_string(),
        ip: endpoint.ip,
        port: endpoint.srv.port,
        direct_tls: endpoint.is_direct_tls(),
        tls: None,
        deadline: XMPP_DEADLINE,
    })
    .await;

    let mut result = ProbeResult::new(endpoint, outcome.success);
    result.starttls = Some(outcome.starttls);
    result
}
