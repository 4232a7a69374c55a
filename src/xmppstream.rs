//! Minimal XMPP stream client: just enough protocol to reach `stream:features`
//! and, optionally, complete one STARTTLS upgrade.
//!
//! Built directly on `rxml::AsyncReader` the way `tokio-xmpp`'s
//! `xmlstream::common` drives a raw stream, but collapsed to the narrow job
//! this engine needs: no `xso`/`minidom`, no authentication, no stanza
//! routing, no resource binding -- only enough to answer "did stream
//! negotiation reach features, and what did it say about STARTTLS".

use std::net::IpAddr;
use std::time::Duration;

use openssl::ssl::Ssl;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;

use crate::error::{Error, ProtocolError};
use crate::model::{StarttlsPolicy, TlsObservation};
use crate::tls::TlsConfig;

const STREAM_NS: &str = "http://etherx.jabber.org/streams";
const TLS_NS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// Parameters for one connection attempt. The dialer uses `ip`/`port`
/// verbatim; `host` only ever appears in the stream header's `to=` attribute.
pub struct StreamParams {
    pub host: String,
    pub ip: IpAddr,
    pub port: u16,
    pub direct_tls: bool,
    /// Present for TLS-version/TLS-cipher probes; absent for basic probes.
    pub tls: Option<TlsConfig>,
    pub deadline: Duration,
}

/// Outcome of one connection attempt. The specific failure cause is not
/// retained here -- it collapses to `success = false` (it may be logged).
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    pub success: bool,
    pub starttls: StarttlsPolicy,
    pub tls: Option<TlsObservation>,
}

/// Drive one connection attempt to completion or to its deadline. On
/// failure after `stream:features` has already been read, the STARTTLS
/// policy observed there is kept -- only `success`/`tls` collapse to their
/// failure defaults, since that policy was genuinely seen on the wire and is
/// more informative than `Unknown`.
pub async fn run(params: StreamParams) -> StreamOutcome {
    match timeout(params.deadline, attempt(&params)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err((e, starttls))) => {
            log::debug!("probe to {}:{} failed: {}", params.ip, params.port, e);
            StreamOutcome {
                starttls,
                ..StreamOutcome::default()
            }
        }
        Err(_) => {
            log::debug!("probe to {}:{} timed out", params.ip, params.port);
            StreamOutcome::default()
        }
    }
}

/// The error type carries the STARTTLS policy observed so far (`Unknown` if
/// failure happened before `stream:features` was read), so `run` can still
/// report it even when a later step (the upgrade itself) fails.
async fn attempt(params: &StreamParams) -> Result<StreamOutcome, (Error, StarttlsPolicy)> {
    let tcp = TcpStream::connect((params.ip, params.port))
        .await
        .map_err(|e| (e.into(), StarttlsPolicy::Unknown))?;

    if params.direct_tls {
        // Basic probes carry no TLSConfig; fall back to an unrestricted
        // client configuration so the direct-TLS wrap still completes.
        let default_cfg;
        let tls_cfg = match params.tls.as_ref() {
            Some(cfg) => cfg,
            None => {
                default_cfg =
                    crate::tls::unrestricted().map_err(|e| (e, StarttlsPolicy::NotApplicable))?;
                &default_cfg
            }
        };
        let mut stream = tls_handshake(tcp, tls_cfg)
            .await
            .map_err(|e| (e, StarttlsPolicy::NotApplicable))?;
        negotiate(&mut stream, &params.host)
            .await
            .map_err(|e| (e, StarttlsPolicy::NotApplicable))?;
        return Ok(StreamOutcome {
            success: true,
            starttls: StarttlsPolicy::NotApplicable,
            tls: params.tls.as_ref().map(|_| observation(tls_cfg)),
        });
    }

    let mut plain = tcp;
    let features = negotiate(&mut plain, &params.host)
        .await
        .map_err(|e| (e, StarttlsPolicy::Unknown))?;
    let starttls = features.policy();

    let Some(tls_cfg) = params.tls.as_ref() else {
        return Ok(StreamOutcome {
            success: true,
            starttls,
            tls: None,
        });
    };

    plain
        .write_all(format!("<starttls xmlns=\"{TLS_NS}\"/>").as_bytes())
        .await
        .map_err(|e| (e.into(), starttls))?;
    plain.flush().await.map_err(|e| (e.into(), starttls))?;
    await_proceed(&mut plain).await.map_err(|e| (e, starttls))?;

    let mut tls_stream = tls_handshake(plain, tls_cfg)
        .await
        .map_err(|e| (e, starttls))?;
    negotiate(&mut tls_stream, &params.host)
        .await
        .map_err(|e| (e, starttls))?;

    Ok(StreamOutcome {
        success: true,
        starttls,
        tls: Some(observation(tls_cfg)),
    })
}

fn observation(tls_cfg: &TlsConfig) -> TlsObservation {
    TlsObservation {
        version: tls_cfg.version,
        cipher: tls_cfg.cipher.clone(),
    }
}

async fn tls_handshake<S>(stream: S, tls_cfg: &TlsConfig) -> Result<SslStream<S>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ssl = Ssl::new(tls_cfg.connector.context())?;
    let mut stream = SslStream::new(ssl, stream)?;
    std::pin::Pin::new(&mut stream).connect().await?;
    Ok(stream)
}

/// What `stream:features` said about STARTTLS.
#[derive(Debug)]
struct FeaturesInfo {
    starttls_present: bool,
    starttls_required: bool,
}

impl FeaturesInfo {
    fn policy(&self) -> StarttlsPolicy {
        if self.starttls_required {
            StarttlsPolicy::Required
        } else if self.starttls_present {
            StarttlsPolicy::Optional
        } else {
            StarttlsPolicy::NotSupported
        }
    }
}

/// Send the stream header and read events, depth-tracked, until
/// `stream:features` closes -- no DOM, just a small nesting-depth counter and
/// two booleans for the `starttls`/`required` children that matter.
async fn negotiate<S>(stream: &mut S, host: &str) -> Result<FeaturesInfo, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let header = format!(
        "<stream:stream to=\"{host}\" xmlns:stream=\"{STREAM_NS}\" xmlns=\"jabber:client\" xml:lang=\"en\" version=\"1.0\">"
    );
    stream.write_all(header.as_bytes()).await?;
    stream.flush().await?;

    let buf = BufReader::new(&mut *stream);
    let mut reader = rxml::AsyncReader::new(buf);

    let mut depth: u32 = 0;
    let mut in_features = false;
    let mut in_starttls = false;
    let mut info = FeaturesInfo {
        starttls_present: false,
        starttls_required: false,
    };

    loop {
        let event = reader.read().await?.ok_or(ProtocolError::StreamClosed)?;

        match event {
            rxml::Event::StartElement(_, (ns, name), _) => {
                depth += 1;
                match depth {
                    1 if ns != STREAM_NS || name.as_str() != "stream" => {
                        return Err(ProtocolError::InvalidStreamStart.into());
                    }
                    1 => {}
                    2 if ns == STREAM_NS && name.as_str() == "features" => {
                        in_features = true;
                    }
                    2 if ns == STREAM_NS && name.as_str() == "error" => {
                        return Err(ProtocolError::StreamError.into());
                    }
                    3 if in_features && name.as_str() == "starttls" => {
                        in_starttls = true;
                        info.starttls_present = true;
                    }
                    4 if in_starttls && name.as_str() == "required" => {
                        info.starttls_required = true;
                    }
                    _ => {}
                }
            }
            rxml::Event::EndElement(_) => {
                if in_features && depth == 2 {
                    return Ok(info);
                }
                if in_starttls && depth == 3 {
                    in_starttls = false;
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }
}

/// Wait for the literal `<proceed/>` the server sends after `<starttls/>`.
async fn await_proceed<S>(stream: &mut S) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let buf = BufReader::new(&mut *stream);
    let mut reader = rxml::AsyncReader::new(buf);

    loop {
        let event = reader.read().await?.ok_or(ProtocolError::StreamClosed)?;

        if let rxml::Event::StartElement(_, (ns, name), _) = event {
            if ns == TLS_NS && name.as_str() == "proceed" {
                return Ok(());
            }
            if ns == TLS_NS && name.as_str() == "failure" {
                return Err(ProtocolError::StreamError.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    const STREAM_HEADER: &[u8] = b"<stream:stream xmlns:stream=\"http://etherx.jabber.org/streams\" xmlns=\"jabber:client\" from=\"example.org\" id=\"abc\" version=\"1.0\">";

    /// Drain whatever the client under test wrote (its own stream header) so
    /// the duplex pipe doesn't fill up, then feed `reply` back to it.
    async fn respond(mut server: tokio::io::DuplexStream, reply: Vec<u8>) {
        let mut buf = [0u8; 4096];
        let _ = server.read(&mut buf).await.unwrap();
        server.write_all(&reply).await.unwrap();
        server.flush().await.unwrap();
    }

    #[tokio::test]
    async fn negotiate_detects_required_starttls() {
        let (mut client, server) = tokio::io::duplex(4096);
        let reply = [
            STREAM_HEADER,
            b"<stream:features><starttls xmlns=\"urn:ietf:params:xml:ns:xmpp-tls\"><required/></starttls></stream:features>",
        ]
        .concat();
        let server_task = tokio::spawn(respond(server, reply));

        let info = negotiate(&mut client, "example.org").await.unwrap();
        assert_eq!(info.policy(), StarttlsPolicy::Required);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn negotiate_detects_optional_starttls() {
        let (mut client, server) = tokio::io::duplex(4096);
        let reply = [
            STREAM_HEADER,
            b"<stream:features><starttls xmlns=\"urn:ietf:params:xml:ns:xmpp-tls\"/></stream:features>",
        ]
        .concat();
        let server_task = tokio::spawn(respond(server, reply));

        let info = negotiate(&mut client, "example.org").await.unwrap();
        assert_eq!(info.policy(), StarttlsPolicy::Optional);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn negotiate_detects_no_starttls() {
        let (mut client, server) = tokio::io::duplex(4096);
        let reply = [STREAM_HEADER, b"<stream:features/>"].concat();
        let server_task = tokio::spawn(respond(server, reply));

        let info = negotiate(&mut client, "example.org").await.unwrap();
        assert_eq!(info.policy(), StarttlsPolicy::NotSupported);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn negotiate_errors_on_stream_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        let reply = [STREAM_HEADER, b"<stream:error/>"].concat();
        let server_task = tokio::spawn(respond(server, reply));

        let err = negotiate(&mut client, "example.org").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::StreamError)
        ));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn await_proceed_succeeds_on_proceed() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let server_task = tokio::spawn(async move {
            server
                .write_all(b"<proceed xmlns=\"urn:ietf:params:xml:ns:xmpp-tls\"/>")
                .await
                .unwrap();
            server.flush().await.unwrap();
        });

        await_proceed(&mut client).await.unwrap();
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn await_proceed_errors_on_failure() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let server_task = tokio::spawn(async move {
            server
                .write_all(b"<failure xmlns=\"urn:ietf:params:xml:ns:xmpp-tls\"/>")
                .await
                .unwrap();
            server.flush().await.unwrap();
        });

        let err = await_proceed(&mut client).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::StreamError)
        ));
        server_task.await.unwrap();
    }
}
