// src/listing.rs
//! Static HTML index listing every zone feed, grouped by center.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write as _;
use std::path::Path;

use crate::feed::feed_url;
use crate::registry::{Registry, ZoneKey};
use crate::store::local::write_atomic;

pub const DEFAULT_INDEX_PATH: &str = "index.html";

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Avalanche Forecast RSS Feeds</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 52rem; margin: 2rem auto; padding: 0 1rem; }
    h2 { border-bottom: 1px solid #ccc; padding-bottom: .25rem; }
    ul { list-style: none; padding-left: 0; }
    li { margin: .35rem 0; }
    code { background: #f4f4f4; padding: 0 .25rem; }
    footer { color: #666; font-size: .85rem; margin-top: 3rem; }
  </style>
</head>
<body>
"#;

/// Render the index page. `generated_at` is the only time-dependent input.
pub fn render_index(registry: &Registry, base_url: &str, generated_at: DateTime<Utc>) -> String {
    let mut html = String::from(HEAD);
    let _ = writeln!(html, "  <h1>Avalanche Forecast RSS Feeds</h1>");
    let _ = writeln!(
        html,
        "  <p>{} centers, {} zones. Subscribe to a zone's feed in any RSS reader.</p>",
        registry.centers.len(),
        registry.zone_count()
    );

    for center in &registry.centers {
        let _ = writeln!(html, "  <h2>{}</h2>", text(&center.name));
        let _ = writeln!(html, "  <ul>");
        for zone in &center.zones {
            let url = feed_url(
                base_url,
                &ZoneKey::new(&center.slug, &zone.slug),
            );
            let _ = writeln!(
                html,
                "    <li>{} <a href=\"{}\"><code>{}</code></a></li>",
                text(&zone.name),
                attr(&url),
                text(&url)
            );
        }
        let _ = writeln!(html, "  </ul>");
    }

    let _ = writeln!(
        html,
        "  <footer>Generated {}</footer>\n</body>\n</html>",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    html
}

pub async fn write_index(
    path: &Path,
    registry: &Registry,
    base_url: &str,
    generated_at: DateTime<Utc>,
) -> Result<()> {
    let html = render_index(registry, base_url, generated_at);
    write_atomic(path, html.as_bytes())
        .await
        .with_context(|| format!("writing index to {}", path.display()))?;
    tracing::info!(path = %path.display(), zones = registry.zone_count(), "wrote index");
    Ok(())
}
