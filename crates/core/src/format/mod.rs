//! Rendering of the final recommendation for email (HTML) and for the UI (Markdown).
//!
//! Everything here is infallible: the input is free text from a model and any string,
//! including an empty one, must render.

pub mod html;
pub mod markdown;

pub use html::{format_analysis_content, format_result_as_html};
pub use markdown::{format_failure_report, format_report_markdown};

use chrono::{DateTime, TimeZone};

pub const DISCLAIMER: &str = "This is an automated AI-generated research report for \
educational purposes only. Always conduct your own due diligence and consult with a qualified \
financial advisor before making any investment decisions. Past performance does not guarantee \
future results.";

/// `October 19, 2026 at 02:05 PM`
pub fn analysis_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%B %d, %Y at %I:%M %p").to_string()
}
