//! Output renderers for the `{data, tags}` result shape (spec.md §6). Each
//! subcommand reveals a different, cumulative slice of `ProbeResult`: `dns`
//! and `socket` show the bare identity fields, `basic` adds `starttls`,
//! `tls_version` adds `protocol`/`starttls_required`, `tls_cipher` adds
//! `cipher` on top of that.

use serde_json::{json, Map, Value};

use crate::cli::OutputFormat;
use crate::model::{DiagnosticTag, ProbeResult, StarttlsPolicy};
use crate::probe::ProbeKernel;

fn result_to_map(kernel: Option<ProbeKernel>, result: &ProbeResult) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("source".into(), json!(result.source));
    map.insert("target".into(), json!(result.target));
    map.insert("ip".into(), json!(result.ip.to_string()));
    map.insert("port".into(), json!(result.port));
    map.insert("success".into(), json!(result.success));

    match kernel {
        Some(ProbeKernel::BasicXmpp) => {
            map.insert("starttls".into(), json!(result.starttls));
        }
        Some(ProbeKernel::TlsVersion) | Some(ProbeKernel::TlsCipher) => {
            if let Some(tls) = &result.tls {
                map.insert("protocol".into(), json!(tls.version.to_string()));
            }
            map.insert(
                "starttls_required".into(),
                json!(result.starttls == Some(StarttlsPolicy::Required)),
            );
            if kernel == Some(ProbeKernel::TlsCipher) {
                if let Some(tls) = &result.tls {
                    map.insert("cipher".into(), json!(tls.cipher));
                }
            }
        }
        Some(ProbeKernel::Socket) | None => {}
    }
    map
}

fn tag_to_value(tag: &DiagnosticTag) -> Value {
    json!({
        "id": tag.id,
        "level": tag.level,
        "message": tag.message,
        "group": tag.group,
    })
}

pub fn render(
    format: OutputFormat,
    kernel: Option<ProbeKernel>,
    data: &[ProbeResult],
    tags: &[DiagnosticTag],
) -> String {
    match format {
        OutputFormat::Json => render_json(kernel, data, tags),
        OutputFormat::Csv => render_csv(kernel, data),
        OutputFormat::Table => render_table(kernel, data, tags),
    }
}

fn render_json(kernel: Option<ProbeKernel>, data: &[ProbeResult], tags: &[DiagnosticTag]) -> String {
    let data: Vec<Value> = data.iter().map(|r| Value::Object(result_to_map(kernel, r))).collect();
    let tags: Vec<Value> = tags.iter().map(tag_to_value).collect();
    serde_json::to_string_pretty(&json!({ "data": data, "tags": tags }))
        .expect("result/tag maps are always valid JSON")
}

fn csv_field(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

fn render_csv(kernel: Option<ProbeKernel>, data: &[ProbeResult]) -> String {
    let rows: Vec<Map<String, Value>> = data.iter().map(|r| result_to_map(kernel, r)).collect();
    let mut columns: Vec<String> = vec!["source", "target", "ip", "port", "success"]
        .into_iter()
        .map(String::from)
        .collect();
    match kernel {
        Some(ProbeKernel::BasicXmpp) => columns.push("starttls".into()),
        Some(ProbeKernel::TlsVersion) => {
            columns.push("protocol".into());
            columns.push("starttls_required".into());
        }
        Some(ProbeKernel::TlsCipher) => {
            columns.push("protocol".into());
            columns.push("starttls_required".into());
            columns.push("cipher".into());
        }
        Some(ProbeKernel::Socket) | None => {}
    }

    let mut out = String::new();
    out.push_str(&columns.join(","));
    out.push('\n');
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| csv_field(row.get(c).unwrap_or(&Value::Null)))
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn render_table(kernel: Option<ProbeKernel>, data: &[ProbeResult], tags: &[DiagnosticTag]) -> String {
    let rows: Vec<Map<String, Value>> = data.iter().map(|r| result_to_map(kernel, r)).collect();
    let mut columns: Vec<&str> = vec!["source", "target", "ip", "port", "success"];
    match kernel {
        Some(ProbeKernel::BasicXmpp) => columns.push("starttls"),
        Some(ProbeKernel::TlsVersion) => {
            columns.push("protocol");
            columns.push("starttls_required");
        }
        Some(ProbeKernel::TlsCipher) => {
            columns.push("protocol");
            columns.push("starttls_required");
            columns.push("cipher");
        }
        Some(ProbeKernel::Socket) | None => {}
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| match row.get(*c) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => "-".to_string(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    for (i, col) in columns.iter().enumerate() {
        out.push_str(&format!("{:<width$}  ", col, width = widths[i]));
    }
    out.push('\n');
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            out.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
        }
        out.push('\n');
    }

    if !tags.is_empty() {
        out.push('\n');
        out.push_str("tags:\n");
        for tag in tags {
            out.push_str(&format!(
                "  [{}] {}#{} {}\n",
                format!("{:?}", tag.level).to_lowercase(),
                tag.group,
                tag.id,
                tag.message
            ));
        }
    }
    out
}
