use crate::format::analysis_timestamp;
use chrono::{DateTime, Datelike, TimeZone};
use regex::Regex;
use std::sync::OnceLock;

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            line-height: 1.6;
            color: #2c3e50;
            background-color: #f4f7f9;
            padding: 20px;
        }
        .email-container {
            max-width: 650px;
            margin: 0 auto;
            background-color: #ffffff;
            border-radius: 12px;
            overflow: hidden;
            box-shadow: 0 10px 30px rgba(0,0,0,0.1);
        }
        .header {
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            color: white;
            padding: 40px 30px;
            text-align: center;
        }
        .header h1 { font-size: 32px; font-weight: 700; margin-bottom: 10px; }
        .header p { font-size: 16px; opacity: 0.95; margin-top: 5px; }
        .badge {
            display: inline-block;
            background-color: rgba(255,255,255,0.2);
            padding: 8px 20px;
            border-radius: 20px;
            font-size: 14px;
            font-weight: 600;
            margin-top: 15px;
        }
        .content { padding: 40px 30px; }
        .info-section {
            background-color: #f8f9fa;
            border-left: 4px solid #667eea;
            padding: 20px;
            margin-bottom: 30px;
            border-radius: 8px;
        }
        .info-row { display: flex; justify-content: space-between; margin-bottom: 12px; align-items: center; }
        .info-row:last-child { margin-bottom: 0; }
        .info-label { font-weight: 600; color: #667eea; font-size: 14px; text-transform: uppercase; letter-spacing: 0.5px; }
        .info-value { color: #2c3e50; font-weight: 500; font-size: 15px; }
        .section-title {
            font-size: 24px;
            font-weight: 700;
            color: #2c3e50;
            margin-bottom: 20px;
            padding-bottom: 12px;
            border-bottom: 3px solid #667eea;
        }
        .analysis-content {
            background-color: #ffffff;
            padding: 25px;
            border-radius: 8px;
            border: 1px solid #e1e8ed;
            margin-bottom: 25px;
            line-height: 1.8;
        }
        .analysis-content h2 { color: #667eea; margin-top: 25px; margin-bottom: 15px; font-size: 20px; }
        .analysis-content h3 { color: #764ba2; margin-top: 20px; margin-bottom: 12px; font-size: 18px; }
        .analysis-content strong { color: #764ba2; font-weight: 600; }
        .analysis-content p { margin-bottom: 15px; }
        .divider { height: 2px; background: linear-gradient(90deg, transparent, #667eea, transparent); margin: 30px 0; }
        .footer { background-color: #2c3e50; color: #ecf0f1; padding: 30px; text-align: center; }
        .footer p { margin-bottom: 10px; font-size: 14px; }
        .disclaimer { background-color: #fff3cd; border: 1px solid #ffc107; border-radius: 8px; padding: 20px; margin-top: 30px; }
        .disclaimer-title { color: #856404; font-weight: 700; font-size: 16px; margin-bottom: 10px; }
        .disclaimer-text { color: #856404; font-size: 13px; line-height: 1.6; }
        .icon { font-size: 24px; margin-right: 10px; }
        @media only screen and (max-width: 600px) {
            .email-container { border-radius: 0; }
            .header { padding: 30px 20px; }
            .header h1 { font-size: 24px; }
            .content { padding: 25px 20px; }
            .info-row { flex-direction: column; align-items: flex-start; }
            .info-value { margin-top: 5px; }
        }
"#;

const EMAIL_DISCLAIMER_HTML: &str = "This is an automated AI-generated research report for \
<strong>educational purposes only</strong>. This is <strong>NOT financial advice</strong>. \
Always conduct your own thorough due diligence and consult with qualified financial advisors \
before making any investment decisions. Past performance does not guarantee future results. \
Investments carry risk, and you may lose money.";

struct Rules {
    h2: Regex,
    h3: Regex,
    bold: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        h2: Regex::new(r"(?m)^## (.*?)$").expect("h2 regex is valid"),
        h3: Regex::new(r"(?m)^### (.*?)$").expect("h3 regex is valid"),
        bold: Regex::new(r"\*\*(.*?)\*\*").expect("bold regex is valid"),
    })
}

/// `'` is left as-is: escaped text only lands in element bodies and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Converts model text into the HTML body of the email.
///
/// Only headings, bold runs and `- ` bullets are recognised. The bullet rule is a plain
/// substring replacement, so a `- ` inside prose becomes `• ` as well.
pub fn format_analysis_content(result: &str) -> String {
    let rules = rules();

    // Markup in the model's text is shown literally.
    let text = escape_html(result);
    let text = rules.h2.replace_all(&text, "<h2>${1}</h2>");
    let text = rules.h3.replace_all(&text, "<h3>${1}</h3>");
    let text = rules.bold.replace_all(&text, "<strong>${1}</strong>");
    let text = text.replace("- ", "• ");

    let mut out = String::with_capacity(text.len() + 64);
    let mut in_paragraph = false;
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            if in_paragraph {
                out.push_str("</p>");
                in_paragraph = false;
            }
            out.push_str("<br>");
            continue;
        }

        if !line.starts_with("<h") && !in_paragraph {
            out.push_str("<p>");
            in_paragraph = true;
        }
        out.push_str(line);
        out.push_str("<br>");
    }
    if in_paragraph {
        out.push_str("</p>");
    }

    out
}

/// Full email document: brand header, info block, analysis body, disclaimer, footer.
pub fn format_result_as_html<Tz: TimeZone>(result: &str, sector: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let body = format_analysis_content(result);
    let sector = escape_html(sector);
    let timestamp = analysis_timestamp(at);
    let year = at.year();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Stock Investment Recommendation</title>
    <style>{STYLE}    </style>
</head>
<body>
    <div class="email-container">
        <div class="header">
            <div class="icon">📈</div>
            <h1>Investment Recommendation</h1>
            <p>AI-Powered Stock Analysis Report</p>
            <div class="badge">{sector} Sector</div>
        </div>
        <div class="content">
            <div class="info-section">
                <div class="info-row">
                    <span class="info-label">📊 Sector</span>
                    <span class="info-value">{sector}</span>
                </div>
                <div class="info-row">
                    <span class="info-label">📅 Analysis Date</span>
                    <span class="info-value">{timestamp}</span>
                </div>
                <div class="info-row">
                    <span class="info-label">🤖 Generated By</span>
                    <span class="info-value">AI Multi-Agent System</span>
                </div>
            </div>
            <div class="divider"></div>
            <h2 class="section-title">📋 Investment Analysis</h2>
            <div class="analysis-content">
                {body}
            </div>
            <div class="disclaimer">
                <div class="disclaimer-title">⚠️ Important Disclaimer</div>
                <div class="disclaimer-text">{EMAIL_DISCLAIMER_HTML}</div>
            </div>
        </div>
        <div class="footer">
            <p style="font-size: 16px; font-weight: 600; margin-bottom: 15px;">🚀 Powered by AI Stock Picker</p>
            <p style="opacity: 0.8;">Multi-agent AI system powered by Perplexity &amp; OpenAI</p>
            <p style="opacity: 0.7; font-size: 12px; margin-top: 15px;">© {year} AI Stock Picker. For educational purposes only.</p>
        </div>
    </div>
</body>
</html>
"#
    )
}
