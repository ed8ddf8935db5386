use std::fmt::Write as _;

use crossterm::style::{StyledContent, Stylize};

use crate::error::ActionError;
use crate::highlight::{self, Mark};
use crate::pipeline::{RedactionOutcome, RedactionStage};
use crate::session::SessionContext;
use crate::verdict::{ClassificationResult, Severity, Tone};

const BAR_CELLS: usize = 20;

fn paint(text: &str, tone: Tone) -> StyledContent<String> {
    let text = text.to_string();
    match tone {
        Tone::Danger => text.red().bold(),
        Tone::Warning => text.yellow().bold(),
        Tone::Safe => text.green().bold(),
        Tone::Muted => text.dark_grey(),
    }
}

fn bar(percent: u8) -> String {
    let filled = (percent.min(100) as usize * BAR_CELLS + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

fn severity_icon(severity: Severity) -> StyledContent<&'static str> {
    match severity {
        Severity::High => "●".red(),
        Severity::Medium => "●".yellow(),
        Severity::Low => "●".dark_grey(),
    }
}

/// Full result card for one classification, with the analysed text
/// highlighted underneath.
pub fn verdict_card(result: &ClassificationResult, text: &str) -> String {
    let tone = result.verdict.tone();
    let mut out = String::new();

    let _ = writeln!(out, "{}", paint(result.verdict.banner(), tone));
    let _ = writeln!(
        out,
        "  Confidence {} {:>3}%",
        paint(&bar(result.confidence), tone),
        result.confidence
    );
    let _ = writeln!(out, "  Spam score {} {:>3}%", bar(result.spam_score), result.spam_score);
    let _ = writeln!(
        out,
        "  Category: {}   Sentiment: {}",
        result.category.as_str().bold(),
        result.sentiment.as_str()
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", result.reason);

    if !result.signals.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", "Signals".bold());
        for signal in &result.signals {
            let _ = writeln!(out, "   {} {}", severity_icon(signal.severity), signal.label);
        }
    }

    if result.reasons.len() > 1 {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", "Reasons".bold());
        for reason in &result.reasons {
            let _ = writeln!(out, "   - {}", reason);
        }
    }

    if !result.suspicious_words.is_empty() {
        let _ = writeln!(
            out,
            "  {} {}",
            "Suspicious words:".red(),
            result.suspicious_words.join(", ")
        );
    }
    if !result.safe_words.is_empty() {
        let _ = writeln!(
            out,
            "  {} {}",
            "Legitimate indicators:".green(),
            result.safe_words.join(", ")
        );
    }
    if let Some(recommendation) = &result.recommendation {
        let _ = writeln!(out, "  {} {}", "Recommendation:".bold(), recommendation);
    }

    if !result.suspicious_words.is_empty() || !result.safe_words.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", highlighted(result, text));
    }
    out
}

/// Safe words are only marked when the message was not judged spam.
fn marked_safe_words(result: &ClassificationResult) -> &[String] {
    if result.verdict.is_spam() {
        &[]
    } else {
        &result.safe_words
    }
}

fn highlighted(result: &ClassificationResult, text: &str) -> String {
    highlight::highlight(text, &result.suspicious_words, marked_safe_words(result))
        .into_iter()
        .map(|span| match span.mark {
            Mark::Plain => span.text,
            Mark::Suspicious => span.text.on_dark_red().white().to_string(),
            Mark::Safe => span.text.on_dark_green().white().to_string(),
        })
        .collect()
}

pub fn stats_line(session: &SessionContext) -> String {
    let stats = session.stats();
    let (spam, safe) = session.running_counts();
    format!(
        "Total {}  {} {}  {} {}  {} {}   (session: {} spam, {} safe)",
        stats.total,
        "spam".red(),
        stats.spam,
        "suspicious".yellow(),
        stats.suspicious,
        "clean".green(),
        stats.clean,
        spam,
        safe
    )
}

pub fn history_list(session: &SessionContext) -> String {
    if session.history().is_empty() {
        return "No messages analyzed yet.".dark_grey().to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!("Last {} messages, newest first", session.history().len()).bold()
    );
    for entry in session.history().iter() {
        let at = entry.recorded_at;
        let _ = writeln!(
            out,
            "{:02}:{:02}:{:02}  {:<10} {:>3}%  {:<18} {}",
            at.hour(),
            at.minute(),
            at.second(),
            paint(entry.verdict.as_str(), entry.verdict.tone()),
            entry.confidence,
            entry.category.as_str(),
            entry.preview
        );
    }
    out
}

pub fn redaction_report(outcome: &RedactionOutcome) -> String {
    let result = &outcome.result;
    let mut out = String::new();

    let stage = match outcome.stage {
        RedactionStage::AiWithFallback => "AI + pattern pass",
        RedactionStage::FallbackOnly => "pattern pass only",
    };
    let _ = writeln!(
        out,
        "{} {} ({})",
        "Redactions:".bold(),
        result.redaction_count,
        stage.dark_grey()
    );
    for item in &result.redacted_items {
        let _ = writeln!(out, "  - {}", item);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", result.clean_text);
    out
}

pub fn error_line(err: &ActionError) -> String {
    let tone = match err {
        ActionError::Validation(_) => Tone::Warning,
        _ => Tone::Danger,
    };
    paint(&err.user_message(), tone).to_string()
}
