//! Optional HTTP collaborator surface (feature `http`): `POST /test/{typ}/`
//! accepting the documented JSON body and returning the same `{data, tags}`
//! shape the CLI's `json` renderer produces. The engine crate has zero
//! dependency on this module when the feature is disabled.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dns::{DnsFilter, SystemResolver};
use crate::model::Side;
use crate::output::render;
use crate::probe::ProbeKernel;
use crate::scheduler::{self, EngineConfig};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct TestRequest {
    pub domain: String,
    #[serde(default)]
    pub typ: TestSide,
    #[serde(default = "default_true")]
    pub ipv4: bool,
    #[serde(default = "default_true")]
    pub ipv6: bool,
    #[serde(default = "default_true")]
    pub xmpps: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestSide {
    #[default]
    Client,
    Server,
}

pub fn router() -> Router {
    Router::new().route("/test/:subcommand/", post(run_test))
}

async fn run_test(
    Path(subcommand): Path<String>,
    Json(body): Json<TestRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let kernel = match subcommand.as_str() {
        "dns" => None,
        "socket" => Some(ProbeKernel::Socket),
        "basic" => Some(ProbeKernel::BasicXmpp),
        "tls_version" => Some(ProbeKernel::TlsVersion),
        "tls_cipher" => Some(ProbeKernel::TlsCipher),
        other => {
            return Err((StatusCode::NOT_FOUND, format!("unknown subcommand: {other}")));
        }
    };

    let config = EngineConfig {
        domain: body.domain,
        filter: DnsFilter {
            side: match body.typ {
                TestSide::Client => Side::Client,
                TestSide::Server => Side::Server,
            },
            ipv4: body.ipv4,
            ipv6: body.ipv6,
            include_direct_tls: body.xmpps,
        },
    };

    let resolver = Arc::new(
        SystemResolver::new().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?,
    );

    let (data, tags) = match kernel {
        None => scheduler::run_dns(resolver, config).await,
        Some(k) => scheduler::run(k, resolver, config).await,
    }
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let rendered = render(crate::cli::OutputFormat::Json, kernel, &data, &tags);
    let value: Value = serde_json::from_str(&rendered).unwrap_or_else(|_| json!({}));
    Ok(Json(value))
}
