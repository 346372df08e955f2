use crate::format::{analysis_timestamp, DISCLAIMER};
use chrono::{DateTime, TimeZone};

pub const EMAIL_SENT_LINE: &str = "✅ **Email sent successfully!**";
pub const EMAIL_FAILED_LINE: &str = "⚠️ **Results generated but email delivery failed.**";

/// Report shown in the UI. The model text is embedded verbatim; the UI renders Markdown itself.
pub fn format_report_markdown<Tz: TimeZone>(
    result: &str,
    sector: &str,
    email: &str,
    at: &DateTime<Tz>,
    email_sent: bool,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let status = if email_sent {
        EMAIL_SENT_LINE
    } else {
        EMAIL_FAILED_LINE
    };
    let timestamp = analysis_timestamp(at);

    format!(
        "\n{status}\n\n---\n\n\
         ## 📈 Stock Investment Recommendation\n\n\
         **Sector:** `{sector}`  \n\
         **Analysis Date:** {timestamp}  \n\
         **Delivered to:** {email}\n\n---\n\n\
         {result}\n\n---\n\n\
         ### ⚠️ Disclaimer\n*{DISCLAIMER}*\n"
    )
}

/// Report shown when the pipeline fails. Names the credential variables to check; never their
/// values.
pub fn format_failure_report(err: &anyhow::Error) -> String {
    format!(
        "\n## ❌ Analysis Failed\n\n\
         **Error:** {err:#}\n\n\
         Please check:\n\
         - API keys are configured correctly (PERPLEXITY_API_KEY, OPENAI_API_KEY, SENDGRID_API_KEY, FROM_EMAIL)\n\
         - Rate limits haven't been exceeded\n\
         - Try again in a few moments\n\n\
         **Technical Details:**\n```\n{err:?}\n```\n\n\
         If the issue persists, please check the crew configuration (agents.yaml, tasks.yaml).\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use chrono::{FixedOffset, TimeZone};

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 16, 45, 0)
            .unwrap()
    }

    #[test]
    fn report_embeds_metadata_and_raw_text() {
        let raw = "## Pick\n**NVDA** - best in class";
        let md = format_report_markdown(raw, "Technology", "me@example.com", &at(), true);
        assert!(md.contains(EMAIL_SENT_LINE));
        assert!(md.contains("**Sector:** `Technology`"));
        assert!(md.contains("**Delivered to:** me@example.com"));
        assert!(md.contains("October 19, 2026 at 04:45 PM"));
        // Markdown is kept as-is, bullets included.
        assert!(md.contains(raw));
        assert!(md.contains(DISCLAIMER));
    }

    #[test]
    fn report_flags_failed_delivery() {
        let md = format_report_markdown("text", "Energy", "me@example.com", &at(), false);
        assert!(md.contains(EMAIL_FAILED_LINE));
        assert!(!md.contains(EMAIL_SENT_LINE));
    }

    #[test]
    fn failure_report_contains_message_and_chain() {
        let err = Err::<(), _>(anyhow::anyhow!("status=401 Unauthorized"))
            .context("task find_trending_companies failed")
            .unwrap_err();
        let md = format_failure_report(&err);
        assert!(md.contains("## ❌ Analysis Failed"));
        assert!(md.contains("status=401 Unauthorized"));
        assert!(md.contains("task find_trending_companies failed"));
        assert!(md.contains("Caused by"));
        assert!(md.contains("OPENAI_API_KEY"));
    }
}
