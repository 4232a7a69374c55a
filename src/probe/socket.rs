//! Kernel 1: bare TCP reachability, no XMPP spoken at all.

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::model::{Endpoint, ProbeResult};

use super::SOCKET_DEADLINE;

pub async fn run(endpoint: &Endpoint) -> ProbeResult {
    let success = timeout(SOCKET_DEADLINE, TcpStream::connect((endpoint.ip, endpoint.srv.port)))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
    ProbeResult::new(endpoint, success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use crate::model::{Service, SrvRecord};
    use tokio::net::TcpListener;

    fn endpoint(ip: IpAddr, port: u16) -> Endpoint {
        Endpoint {
            srv: SrvRecord {
                service: Service::XmppClient,
                proto: "tcp",
                domain: "example.org".into(),
                ttl: 300,
                priority: 0,
                weight: 0,
                port,
                target: "xmpp1.example.org".into(),
            },
            ip,
            order: 0,
        }
    }

    #[tokio::test]
    async fn connect_succeeds_against_a_live_listener() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let result = run(&endpoint(IpAddr::V4(Ipv4Addr::LOCALHOST), port)).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn connect_fails_against_a_closed_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener); // frees the port without anything listening on it

        let result = run(&endpoint(IpAddr::V4(Ipv4Addr::LOCALHOST), port)).await;
        assert!(!result.success);
    }
}
