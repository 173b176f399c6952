//! Landing page served on every path other than the telemetry path.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::state::SharedState;

#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing landing page request");
    state.metrics.record_request("root", 200);

    let uptime_secs = state.start_time.elapsed().as_secs();
    let uptime_str = format!(
        "{}h {}m {}s",
        uptime_secs / 3600,
        (uptime_secs % 3600) / 60,
        uptime_secs % 60
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>BOSH Exporter</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }}
        .container {{ max-width: 720px; margin: 0 auto; background: white; padding: 32px; border-radius: 8px; }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 12px; }}
        .info-label {{ font-weight: 600; color: #555; }}
        a {{ color: #007bff; font-weight: 600; }}
    </style>
</head>
<body>
<div class="container">
    <h1>BOSH Exporter</h1>
    <p><span class="info-label">Version:</span> {version}</p>
    <p><span class="info-label">Director:</span> {name} ({uuid})</p>
    <p><span class="info-label">Environment:</span> {environment}</p>
    <p><span class="info-label">Uptime:</span> {uptime}</p>
    <p><a href="{path}">Metrics</a></p>
</div>
</body>
</html>"#,
        version = bosh_exporter::build_info::VERSION,
        name = escape(&state.director_name),
        uuid = escape(&state.director_uuid),
        environment = escape(state.config.environment()),
        uptime = uptime_str,
        path = escape(state.config.telemetry_path()),
    );

    Html(html)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">&"#), "&lt;a href=&quot;x&quot;&gt;&amp;");
    }
}
