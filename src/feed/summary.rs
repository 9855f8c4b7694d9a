// src/feed/summary.rs
//! HTML body of a feed entry. Sections always appear in the same order; a
//! section whose data is missing renders a placeholder line instead.

use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

use super::extract::{DangerLevel, DangerRating, ForecastDigest};

pub const BOTTOM_LINE_PLACEHOLDER: &str = "Bottom line not available.";
pub const DANGER_PLACEHOLDER: &str = "Danger ratings not available.";
pub const PROBLEMS_PLACEHOLDER: &str = "No avalanche problems listed.";

const DANGER_ICON_BASE: &str = "https://nac-web-platforms.s3.us-west-1.amazonaws.com/assets/danger-icons";

const HEADING: &str = "font-size: 18px; font-weight: bold; margin: 0 0 10px 0; text-transform: uppercase;";
const CELL: &str = "padding: 8px; border: 1px solid #ddd;";

pub fn render(digest: &ForecastDigest, source_link: &str) -> String {
    let mut html = String::new();

    if let Some(author) = &digest.author {
        let _ = write!(
            html,
            "<p style='color: #666;'><strong>Forecaster:</strong> {}</p>\n",
            encode_text(author)
        );
    }

    render_bottom_line(&mut html, digest);
    render_danger(&mut html, digest.today.as_ref(), digest.tomorrow.as_ref());
    render_problems(&mut html, digest);

    let _ = write!(
        html,
        "<p><a href=\"{}\">View Full Forecast on Avalanche Center Website</a></p>",
        encode_double_quoted_attribute(source_link)
    );
    html
}

fn danger_icon(level: DangerLevel, height: u32) -> String {
    match level.0 {
        Some(n) => format!(
            "<img src='{DANGER_ICON_BASE}/{n}.png' alt='{}' height='{height}' style='vertical-align: middle;' /> ",
            level.label()
        ),
        None => String::new(),
    }
}

fn render_bottom_line(html: &mut String, digest: &ForecastDigest) {
    let icon = digest
        .today
        .and_then(|t| t.overall())
        .map(|l| danger_icon(l, 30))
        .unwrap_or_default();
    let _ = write!(
        html,
        "<div style='margin: 20px 0; padding: 15px; background-color: #f5f5f5;'>\n<p style='{HEADING}'>{icon}The Bottom Line</p>\n"
    );
    match &digest.bottom_line {
        // Upstream bottom lines are already HTML.
        Some(text) => {
            let _ = write!(html, "<div>{text}</div>\n");
        }
        None => {
            let _ = write!(html, "<p><em>{BOTTOM_LINE_PLACEHOLDER}</em></p>\n");
        }
    }
    html.push_str("</div>\n");
}

fn render_danger(html: &mut String, today: Option<&DangerRating>, tomorrow: Option<&DangerRating>) {
    let _ = write!(html, "<div style='margin: 20px 0;'>\n<p style='{HEADING}'>Avalanche Danger</p>\n");
    let Some(today) = today else {
        let _ = write!(html, "<p><em>{DANGER_PLACEHOLDER}</em></p>\n</div>\n");
        return;
    };

    html.push_str("<table style='border-collapse: collapse; width: 100%; max-width: 700px;'>\n");
    let _ = write!(html, "<tr><th style='{CELL}'></th><th style='{CELL}'>Today</th>");
    if tomorrow.is_some() {
        let _ = write!(html, "<th style='{CELL}'>Tomorrow</th>");
    }
    html.push_str("</tr>\n");

    let bands: [(&str, fn(&DangerRating) -> DangerLevel); 3] = [
        ("Above Treeline", |r| r.upper),
        ("Treeline", |r| r.middle),
        ("Below Treeline", |r| r.lower),
    ];
    for (band, pick) in bands {
        let now = pick(today);
        let _ = write!(
            html,
            "<tr><td style='{CELL} background-color: {}; font-weight: bold;'>{band}</td>",
            now.color()
        );
        danger_cell(html, now);
        if let Some(t) = tomorrow {
            danger_cell(html, pick(t));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n</div>\n");
}

fn danger_cell(html: &mut String, level: DangerLevel) {
    let _ = write!(
        html,
        "<td style='{CELL}'>{}<strong>{}</strong></td>",
        danger_icon(level, 25),
        level.label()
    );
}

fn render_problems(html: &mut String, digest: &ForecastDigest) {
    let _ = write!(
        html,
        "<div style='margin: 20px 0;'>\n<p style='{HEADING}'>Avalanche Problems ({})</p>\n",
        digest.problems.len()
    );
    if digest.problems.is_empty() {
        let _ = write!(html, "<p><em>{PROBLEMS_PLACEHOLDER}</em></p>\n");
    }
    for (idx, problem) in digest.problems.iter().enumerate() {
        let name = problem.name.as_deref().unwrap_or("Unknown");
        let likelihood = problem
            .likelihood
            .as_deref()
            .map(capitalize)
            .unwrap_or_else(|| "Unknown".to_string());
        let size = problem.size_range().unwrap_or_else(|| "Unknown".to_string());
        let _ = write!(
            html,
            "<div style='margin: 10px 0; padding: 10px; border-left: 4px solid #333;'>\n\
             <p style='font-weight: bold; text-transform: uppercase;'>Problem #{}: {}</p>\n\
             <p style='font-style: italic;'>Likelihood: <strong>{}</strong> | Size: <strong>{}</strong></p>\n\
             </div>\n",
            idx + 1,
            encode_text(name),
            encode_text(&likelihood),
            encode_text(&size)
        );
    }
    html.push_str("</div>\n");
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::extract::digest;
    use serde_json::json;

    #[test]
    fn today_column_precedes_tomorrow() {
        let d = digest(&json!({
            "danger": [
                { "valid_day": "tomorrow", "upper": 4, "middle": 4, "lower": 4 },
                { "valid_day": "current", "upper": 2, "middle": 2, "lower": 2 }
            ]
        }));
        let html = render(&d, "https://example.org/f");
        let today = html.find(">Today<").unwrap();
        let tomorrow = html.find(">Tomorrow<").unwrap();
        assert!(today < tomorrow);
        // first row: Moderate (today) before High (tomorrow)
        let moderate = html.find("Moderate").unwrap();
        let high = html.find("<strong>High</strong>").unwrap();
        assert!(moderate < high);
    }

    #[test]
    fn empty_digest_renders_every_placeholder() {
        let html = render(&ForecastDigest::default(), "https://example.org/f?a=1&b=2");
        assert!(html.contains(BOTTOM_LINE_PLACEHOLDER));
        assert!(html.contains(DANGER_PLACEHOLDER));
        assert!(html.contains(PROBLEMS_PLACEHOLDER));
        assert!(!html.contains("Forecaster"));
        assert!(html.contains("href=\"https://example.org/f?a=1&amp;b=2\""));
    }

    #[test]
    fn problem_text_is_escaped_and_capitalized() {
        let d = digest(&json!({
            "forecast_avalanche_problems": [
                { "name": "Wind <Slab>", "likelihood": "very LIKELY", "size": [1, 2.5] }
            ]
        }));
        let html = render(&d, "x");
        assert!(html.contains("Problem #1: Wind &lt;Slab&gt;"));
        assert!(html.contains("<strong>Very likely</strong>"));
        assert!(html.contains("<strong>D1-D2.5</strong>"));
        assert!(html.contains("Avalanche Problems (1)"));
    }

    #[test]
    fn bottom_line_icon_uses_highest_band() {
        let d = digest(&json!({
            "bottom_line": "Careful.",
            "danger": [{ "valid_day": "current", "upper": 3, "middle": 2, "lower": 1 }]
        }));
        let html = render(&d, "x");
        assert!(html.contains("danger-icons/3.png' alt='Considerable' height='30'"));
    }
}
