//! Test scheduler: fans out one task per `(endpoint, params)` tuple for a
//! probe kernel and joins them back into a deterministically ordered result
//! list, per spec.md §4.6. The only state shared across tasks is the tag
//! sink; every probe owns its own socket and TLS context.

use std::sync::Arc;

use futures::StreamExt;

use crate::dns::{self, DnsBackend, DnsFilter};
use crate::error::Error;
use crate::model::{DiagnosticTag, ProbeResult};
use crate::probe::{self, ProbeKernel};
use crate::tags::TagSink;

/// What one engine invocation runs against.
pub struct EngineConfig {
    pub domain: String,
    pub filter: DnsFilter,
}

/// The `dns` subcommand's view: endpoint enumeration only, no probing --
/// every discovered endpoint is trivially `success = true`.
pub async fn run_dns<B: DnsBackend>(
    backend: Arc<B>,
    config: EngineConfig,
) -> Result<(Vec<ProbeResult>, Vec<DiagnosticTag>), Error> {
    let tags = Arc::new(TagSink::new());
    let mut endpoints = dns::enumerate(backend, config.domain, config.filter, tags.clone())?;

    let mut data = Vec::new();
    while let Some(endpoint) = endpoints.next().await {
        data.push(ProbeResult::new(&endpoint, true));
    }
    Ok((data, tags.drain()))
}

/// Run `kernel` against every endpoint `config` enumerates. One concurrent
/// task per `(endpoint, params)` tuple, unbounded fan-out (spec.md §4.6):
/// a probe's failure or deadline never cancels its siblings. Results are
/// returned in `(endpoint-enumeration-order, params-enumeration-order)`,
/// not completion order.
pub async fn run<B: DnsBackend>(
    kernel: ProbeKernel,
    backend: Arc<B>,
    config: EngineConfig,
) -> Result<(Vec<ProbeResult>, Vec<DiagnosticTag>), Error> {
    let tags = Arc::new(TagSink::new());
    let domain = Arc::new(config.domain.clone());
    let mut endpoints = dns::enumerate(backend, config.domain, config.filter, tags.clone())?;

    // Parameter sets for TlsVersion/TlsCipher are a host-capability property,
    // not a per-endpoint one, so they are enumerated once up front rather
    // than rediscovered for each endpoint.
    let params_per_endpoint = probe::get_tests(kernel).await;

    let mut join_set = tokio::task::JoinSet::new();
    let mut slots: Vec<Option<ProbeResult>> = Vec::new();

    while let Some(endpoint) = endpoints.next().await {
        let endpoint = Arc::new(endpoint);
        for params in &params_per_endpoint {
            let slot = slots.len();
            slots.push(None);
            let domain = domain.clone();
            let endpoint = endpoint.clone();
            let params = params.clone();
            join_set.spawn(async move {
                let result = probe::run(kernel, &domain, &endpoint, &params).await;
                (slot, result)
            });
        }
    }

    while let Some(joined) = join_set.join_next().await {
        let (slot, result) = joined.expect("probe task panicked");
        slots[slot] = Some(result);
    }

    let data = slots
        .into_iter()
        .map(|r| r.expect("every slot is populated before join_next drains the set"))
        .collect();
    Ok((data, tags.drain()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::FakeResolver;
    use crate::model::Side;
    use crate::probe::ProbeKernel;

    fn filter() -> DnsFilter {
        DnsFilter {
            side: Side::Client,
            ipv4: true,
            ipv6: true,
            include_direct_tls: false,
        }
    }

    fn resolver_with_one_endpoint() -> FakeResolver {
        let mut resolver = FakeResolver::default();
        resolver.srv.insert(
            "_xmpp-client._tcp.example.org".into(),
            vec![crate::dns::SrvAnswer {
                ttl: 300,
                priority: 0,
                weight: 0,
                port: 58222,
                target: "xmpp1.example.org".into(),
            }],
        );
        resolver
            .v4
            .insert("xmpp1.example.org".into(), vec!["127.0.0.1".parse().unwrap()]);
        resolver
    }

    #[tokio::test]
    async fn run_dns_marks_every_enumerated_endpoint_successful() {
        let config = EngineConfig {
            domain: "example.org".into(),
            filter: filter(),
        };
        let (data, _tags) = run_dns(Arc::new(resolver_with_one_endpoint()), config)
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert!(data[0].success);
    }

    #[tokio::test]
    async fn socket_run_produces_exactly_one_result_per_endpoint() {
        // Socket is parameter-free, so result count == endpoint count
        // (spec.md §8 "result conservation").
        let config = EngineConfig {
            domain: "example.org".into(),
            filter: filter(),
        };
        let (data, _tags) = run(ProbeKernel::Socket, Arc::new(resolver_with_one_endpoint()), config)
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        // Nothing listens on 127.0.0.1:58222 in the test sandbox.
        assert!(!data[0].success);
    }

    #[tokio::test]
    async fn no_endpoints_yields_no_results() {
        let config = EngineConfig {
            domain: "example.org".into(),
            filter: filter(),
        };
        let (data, tags) = run(ProbeKernel::Socket, Arc::new(FakeResolver::default()), config)
            .await
            .unwrap();
        assert!(data.is_empty());
        assert!(!tags.is_empty());
    }
}
