//! Asynchronous SRV + A/AAAA resolution producing an ordered lazy stream of
//! [`Endpoint`]s.
//!
//! Grounded in `tokio-xmpp`'s `connect::dns` module (hickory-resolver usage),
//! generalized from "connect to one server" to "enumerate every matching
//! endpoint". The resolution step is modelled as a bounded channel per the
//! design note in spec.md §9: this module is the producer, the scheduler is
//! the consumer.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use hickory_resolver::config::LookupIpStrategy;
use hickory_resolver::TokioAsyncResolver;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Error;
use crate::model::{dns_tag_ids, Endpoint, Service, Side, SrvRecord, TagLevel};
use crate::tags::TagSink;

/// One answer from a SRV lookup.
#[derive(Debug, Clone)]
pub struct SrvAnswer {
    pub ttl: u32,
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// DNS lookups needed by the engine, behind a trait so tests can supply a
/// fixed in-memory table instead of hitting the network.
pub trait DnsBackend: Send + Sync + 'static {
    fn lookup_srv(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<SrvAnswer>, Error>> + Send;

    fn lookup_ipv4(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Ipv4Addr>, Error>> + Send;

    fn lookup_ipv6(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Ipv6Addr>, Error>> + Send;
}

/// Production DNS backend: `hickory_resolver` over the system configuration.
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    pub fn new() -> Result<Self, Error> {
        let (config, mut options) = hickory_resolver::system_conf::read_system_conf()?;
        options.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        let resolver = TokioAsyncResolver::tokio(config, options);
        Ok(Self { resolver })
    }
}

impl DnsBackend for SystemResolver {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvAnswer>, Error> {
        let lookup = self.resolver.srv_lookup(name).await?;
        Ok(lookup
            .iter()
            .map(|srv| SrvAnswer {
                ttl: lookup.as_lookup().record_iter().next().map(|r| r.ttl()).unwrap_or(0),
                priority: srv.priority(),
                weight: srv.weight(),
                port: srv.port(),
                target: srv.target().to_ascii().trim_end_matches('.').to_string(),
            })
            .collect())
    }

    async fn lookup_ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, Error> {
        match self.resolver.ipv4_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|r| r.0).collect()),
            Err(e) if matches!(e.kind(), hickory_resolver::error::ResolveErrorKind::NoRecordsFound { .. }) => {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup_ipv6(&self, name: &str) -> Result<Vec<Ipv6Addr>, Error> {
        match self.resolver.ipv6_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|r| r.0).collect()),
            Err(e) if matches!(e.kind(), hickory_resolver::error::ResolveErrorKind::NoRecordsFound { .. }) => {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Filter mask controlling which SRV families and address families
/// `enumerate` considers.
#[derive(Debug, Clone, Copy)]
pub struct DnsFilter {
    pub side: Side,
    pub ipv4: bool,
    pub ipv6: bool,
    pub include_direct_tls: bool,
}

impl DnsFilter {
    fn validate(&self) -> Result<(), Error> {
        if !self.ipv4 && !self.ipv6 {
            return Err(Error::Usage(
                "at least one of ipv4/ipv6 must be requested".into(),
            ));
        }
        Ok(())
    }

    /// SRV services to query, in order. Preserves the bug-compatible
    /// inclusion of `xmpps-client` (not `xmpps-server`) on the server side —
    /// see DESIGN.md open question 1.
    fn services(&self) -> Vec<Service> {
        let mut services = match self.side {
            Side::Client => vec![Service::XmppClient],
            Side::Server => vec![Service::XmppServer],
        };
        if self.include_direct_tls {
            services.push(Service::XmppsClient);
        }
        services
    }
}

/// Resolve `domain` under `filter`, streaming [`Endpoint`]s as they are
/// discovered. DNS partial failures are recorded on `tags` rather than
/// surfaced as an error; only the `ipv4=false, ipv6=false` usage error is
/// returned directly, before any query is issued.
pub fn enumerate<B: DnsBackend>(
    backend: Arc<B>,
    domain: String,
    filter: DnsFilter,
    tags: Arc<TagSink>,
) -> Result<ReceiverStream<Endpoint>, Error> {
    filter.validate()?;
    let domain = idna::domain_to_ascii(&domain)?;

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut order = 0usize;
        for service in filter.services() {
            let source = format!("_{}._tcp.{}", service.as_str(), domain);
            let srv_answers = match backend.lookup_srv(&source).await {
                Ok(answers) if !answers.is_empty() => answers,
                _ => {
                    tags.emit(
                        TagLevel::Error,
                        dns_tag_ids::SRV_MISSING,
                        format!("SRV lookup for {} failed or returned no records", source),
                        "dns",
                    );
                    continue;
                }
            };

            for answer in srv_answers {
                let srv = SrvRecord {
                    service,
                    proto: "tcp",
                    domain: domain.clone(),
                    ttl: answer.ttl,
                    priority: answer.priority,
                    weight: answer.weight,
                    port: answer.port,
                    target: answer.target.clone(),
                };

                let (v4, v6) = tokio::join!(
                    async {
                        if filter.ipv4 {
                            backend.lookup_ipv4(&answer.target).await.unwrap_or_default()
                        } else {
                            Vec::new()
                        }
                    },
                    async {
                        if filter.ipv6 {
                            backend.lookup_ipv6(&answer.target).await.unwrap_or_default()
                        } else {
                            Vec::new()
                        }
                    },
                );

                if filter.ipv4 && v4.is_empty() {
                    tags.emit(
                        TagLevel::Warning,
                        dns_tag_ids::NO_A_RECORDS,
                        format!("{} has no A records", answer.target),
                        "dns",
                    );
                }
                if filter.ipv6 && v6.is_empty() {
                    tags.emit(
                        TagLevel::Warning,
                        dns_tag_ids::NO_AAAA_RECORDS,
                        format!("{} has no AAAA records", answer.target),
                        "dns",
                    );
                }
                if filter.ipv4 && filter.ipv6 && v4.is_empty() && v6.is_empty() {
                    tags.emit(
                        TagLevel::Error,
                        dns_tag_ids::NO_A_OR_AAAA,
                        format!("{} has neither A nor AAAA records", answer.target),
                        "dns",
                    );
                }

                for ip in v4.into_iter().map(IpAddr::V4).chain(v6.into_iter().map(IpAddr::V6)) {
                    let endpoint = Endpoint {
                        srv: srv.clone(),
                        ip,
                        order,
                    };
                    order += 1;
                    if tx.send(endpoint).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    Ok(ReceiverStream::new(rx))
}

/// In-memory [`DnsBackend`] for hermetic tests, shared with `scheduler`'s
/// test module.
#[cfg(test)]
#[derive(Default, Clone)]
pub(crate) struct FakeResolver {
    pub srv: std::collections::HashMap<String, Vec<SrvAnswer>>,
    pub v4: std::collections::HashMap<String, Vec<Ipv4Addr>>,
    pub v6: std::collections::HashMap<String, Vec<Ipv6Addr>>,
}

#[cfg(test)]
impl DnsBackend for FakeResolver {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvAnswer>, Error> {
        Ok(self.srv.get(name).cloned().unwrap_or_default())
    }
    async fn lookup_ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, Error> {
        Ok(self.v4.get(name).cloned().unwrap_or_default())
    }
    async fn lookup_ipv6(&self, name: &str) -> Result<Vec<Ipv6Addr>, Error> {
        Ok(self.v6.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn filter(side: Side, ipv4: bool, ipv6: bool, xmpps: bool) -> DnsFilter {
        DnsFilter {
            side,
            ipv4,
            ipv6,
            include_direct_tls: xmpps,
        }
    }

    #[tokio::test]
    async fn scenario_1_two_results_and_missing_xmpps_tag() {
        let mut resolver = FakeResolver::default();
        resolver.srv.insert(
            "_xmpp-client._tcp.example.org".into(),
            vec![SrvAnswer {
                ttl: 300,
                priority: 0,
                weight: 0,
                port: 5222,
                target: "xmpp1.example.org".into(),
            }],
        );
        resolver
            .v4
            .insert("xmpp1.example.org".into(), vec!["1.2.3.4".parse().unwrap()]);
        resolver
            .v6
            .insert("xmpp1.example.org".into(), vec!["::1".parse().unwrap()]);
        // `_xmpps-client._tcp.example.org` left absent -> NXDOMAIN-equivalent.

        let tags = Arc::new(TagSink::new());
        let stream = enumerate(
            Arc::new(resolver),
            "example.org".into(),
            filter(Side::Client, true, true, true),
            tags.clone(),
        )
        .unwrap();
        let endpoints: Vec<_> = stream.collect().await;
        assert_eq!(endpoints.len(), 2);

        let drained = tags.drain();
        assert_eq!(drained.iter().filter(|t| t.id == dns_tag_ids::SRV_MISSING).count(), 1);
    }

    #[tokio::test]
    async fn scenario_6_no_srv_yields_two_error_tags() {
        let resolver = FakeResolver::default();
        let tags = Arc::new(TagSink::new());
        let stream = enumerate(
            Arc::new(resolver),
            "example.org".into(),
            filter(Side::Client, true, true, true),
            tags.clone(),
        )
        .unwrap();
        let endpoints: Vec<_> = stream.collect().await;
        assert!(endpoints.is_empty());
        let drained = tags.drain();
        assert_eq!(drained.iter().filter(|t| t.id == dns_tag_ids::SRV_MISSING).count(), 2);
    }

    #[test]
    fn filter_validation_rejects_both_families_disabled() {
        let f = filter(Side::Client, false, false, false);
        assert!(matches!(f.validate(), Err(Error::Usage(_))));
    }

    #[tokio::test]
    async fn endpoint_bijection_matches_address_record_counts() {
        let mut resolver = FakeResolver::default();
        resolver.srv.insert(
            "_xmpp-client._tcp.example.org".into(),
            vec![SrvAnswer {
                ttl: 300,
                priority: 0,
                weight: 0,
                port: 5222,
                target: "xmpp1.example.org".into(),
            }],
        );
        resolver.v4.insert(
            "xmpp1.example.org".into(),
            vec!["1.2.3.4".parse().unwrap(), "1.2.3.5".parse().unwrap()],
        );
        resolver
            .v6
            .insert("xmpp1.example.org".into(), vec!["::1".parse().unwrap()]);

        let tags = Arc::new(TagSink::new());
        let stream = enumerate(
            Arc::new(resolver),
            "example.org".into(),
            filter(Side::Client, true, true, false),
            tags,
        )
        .unwrap();
        let endpoints: Vec<_> = stream.collect().await;
        assert_eq!(endpoints.len(), 3); // 2 A + 1 AAAA
    }
}
