use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::llm::CompletionOptions;
use crate::redaction::{Placeholder, RedactionRuleSet};

/// Max characters of user text embedded in a classification prompt.
pub const CLASSIFICATION_CHAR_LIMIT: usize = 3000;
/// Max characters of document text embedded in a redaction prompt.
pub const REDACTION_CHAR_LIMIT: usize = 6000;

const DETAILED_SYSTEM_PROMPT: &str = "You are a precision spam detection engine. Always return valid JSON only. No extra text, no markdown fences.";
const BINARY_SYSTEM_PROMPT: &str =
    "You are a spam detection expert. Analyze content accurately and return only valid JSON.";
const REDACTION_SYSTEM_PROMPT: &str = "You are a document privacy engine. You remove sensitive personal data from documents and return valid JSON only.";
const IMAGE_SYSTEM_PROMPT: &str =
    "You are an OCR engine. You transcribe text from images exactly as written.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Lenient,
    #[default]
    Balanced,
    Strict,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Lenient => "lenient",
            Sensitivity::Balanced => "balanced",
            Sensitivity::Strict => "strict",
        }
    }

    fn detailed_instruction(&self) -> &'static str {
        match self {
            Sensitivity::Balanced => "Use balanced judgment.",
            Sensitivity::Strict => "Be strict — flag anything remotely suspicious.",
            Sensitivity::Lenient => "Only flag clear, obvious spam.",
        }
    }

    fn binary_instruction(&self) -> &'static str {
        match self {
            Sensitivity::Lenient => {
                "Be lenient. Only flag obvious spam. Prefer safe over spam when uncertain."
            }
            Sensitivity::Balanced => {
                "Be balanced. Flag clear spam patterns but avoid false positives."
            }
            Sensitivity::Strict => "Be strict. Flag anything suspicious, even if mildly spammy.",
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" | "low" => Ok(Sensitivity::Lenient),
            "balanced" | "medium" | "auto" => Ok(Sensitivity::Balanced),
            "strict" | "high" => Ok(Sensitivity::Strict),
            other => Err(format!("Unknown detection mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    AutoDetect,
    Email,
    Sms,
    SocialMedia,
    Comment,
    Chat,
    Url,
}

impl ContentType {
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::AutoDetect => "Auto-detect",
            ContentType::Email => "Email",
            ContentType::Sms => "SMS / Text Message",
            ContentType::SocialMedia => "Social Media Post",
            ContentType::Comment => "Comment / Review",
            ContentType::Chat => "Chat Message",
            ContentType::Url => "URL / Link",
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "auto-detect" | "auto_detect" => Ok(ContentType::AutoDetect),
            "email" => Ok(ContentType::Email),
            "sms" | "text" => Ok(ContentType::Sms),
            "social" | "social_media" | "post" => Ok(ContentType::SocialMedia),
            "comment" | "review" => Ok(ContentType::Comment),
            "chat" => Ok(ContentType::Chat),
            "url" | "link" => Ok(ContentType::Url),
            other => Err(format!("Unknown content type: {}", other)),
        }
    }
}

/// Optional detection focus areas added to the detailed prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Phishing,
    Urgency,
    Offers,
    Impersonation,
    Sentiment,
}

impl Check {
    pub fn defaults() -> BTreeSet<Check> {
        [
            Check::Phishing,
            Check::Urgency,
            Check::Offers,
            Check::Impersonation,
        ]
        .into_iter()
        .collect()
    }

    fn instruction(&self) -> &'static str {
        match self {
            Check::Phishing => "phishing links, deceptive URLs, lookalike domains",
            Check::Urgency => "urgency tactics, pressure language, countdown threats",
            Check::Offers => {
                "fake prize claims, lottery wins, suspicious offers, 'too good to be true' deals"
            }
            Check::Impersonation => "impersonation of banks, government, brands, support teams",
            Check::Sentiment => "overall sentiment and emotional manipulation",
        }
    }
}

impl std::str::FromStr for Check {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phishing" => Ok(Check::Phishing),
            "urgency" => Ok(Check::Urgency),
            "offers" | "prizes" => Ok(Check::Offers),
            "impersonation" => Ok(Check::Impersonation),
            "sentiment" => Ok(Check::Sentiment),
            other => Err(format!("Unknown check: {}", other)),
        }
    }
}

/// Which JSON response contract the classification prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// SPAM | SUSPICIOUS | CLEAN with severity-tagged signals.
    #[default]
    Detailed,
    /// SPAM | NOT SPAM with word lists and a recommendation.
    Binary,
}

impl std::str::FromStr for ResponseFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "detailed" => Ok(ResponseFormat::Detailed),
            "binary" => Ok(ResponseFormat::Binary),
            other => Err(format!("Unknown response format: {}", other)),
        }
    }
}

/// A fully rendered instruction pair plus the sampling options it was
/// designed for.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Prompt {
    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            image: None,
        }
    }
}

/// Returns the longest prefix of `text` that holds at most `max_chars` chars.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRequest {
    text: String,
    pub format: ResponseFormat,
    pub content_type: ContentType,
    pub sensitivity: Sensitivity,
    pub checks: BTreeSet<Check>,
}

impl ClassificationRequest {
    pub fn new(
        raw_text: &str,
        format: ResponseFormat,
        content_type: ContentType,
        sensitivity: Sensitivity,
        checks: BTreeSet<Check>,
    ) -> Self {
        Self {
            text: truncate_chars(raw_text, CLASSIFICATION_CHAR_LIMIT).to_string(),
            format,
            content_type,
            sensitivity,
            checks,
        }
    }

    /// The (possibly truncated) text that will be embedded.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn prompt(&self) -> Prompt {
        match self.format {
            ResponseFormat::Detailed => self.detailed_prompt(),
            ResponseFormat::Binary => self.binary_prompt(),
        }
    }

    fn detailed_prompt(&self) -> Prompt {
        let content_hint = match self.content_type {
            ContentType::AutoDetect => String::new(),
            other => format!(" The content type is: {}.", other.label()),
        };

        let checks = if self.checks.is_empty() {
            "- General spam patterns".to_string()
        } else {
            self.checks
                .iter()
                .map(|c| format!("- {}", c.instruction()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let user = format!(
            r#"You are an expert spam and scam detection AI. Analyze the following message thoroughly.{content_hint}

DETECTION MODE: {mode}

CHECK FOR:
{checks}
- General spam indicators (excessive caps, excessive punctuation, grammar errors)
- Social engineering tactics
- Request for personal information, passwords, OTPs, money transfers

Respond ONLY with a valid JSON object (no markdown, no extra text):
{{
  "verdict": "SPAM" | "SUSPICIOUS" | "CLEAN",
  "confidence": <integer 0-100>,
  "reason": "<2-3 sentence explanation of the verdict>",
  "signals": [
    {{"label": "<signal name>", "severity": "high" | "medium" | "low"}}
  ],
  "spam_score": <integer 0-100>,
  "category": "<one of: Phishing | Scam | Promotional | Malware | Social Engineering | Legitimate | Unknown>",
  "sentiment": "<Neutral | Alarming | Enticing | Threatening | Friendly>"
}}

MESSAGE TO ANALYZE:
"""
{text}
"""
"#,
            mode = self.sensitivity.detailed_instruction(),
            text = self.text,
        );

        Prompt {
            system: DETAILED_SYSTEM_PROMPT.to_string(),
            user,
            temperature: 0.1,
            max_tokens: 800,
        }
    }

    fn binary_prompt(&self) -> Prompt {
        let kind = match self.content_type {
            ContentType::AutoDetect => "message",
            other => other.label(),
        };

        let user = format!(
            r#"You are an expert AI spam detection engine. Analyze the following {kind} content and determine if it is spam or not.

DETECTION SENSITIVITY: {sensitivity}

SPAM INDICATORS TO CHECK:
- Unsolicited promotions, offers, prizes, lottery wins
- Urgency language: "Act now!", "Limited time!", "You won!", "Claim your prize!"
- Suspicious URLs, phishing links, unknown domains
- Requests for personal info, passwords, OTPs, bank details
- Excessive capitalization, exclamation marks, emojis used manipulatively
- Too-good-to-be-true claims (free money, weight loss, miracle cures)
- Impersonation of banks, government, celebrities
- Grammatical errors typical of spam
- Suspicious sender patterns

Analyze this {kind}:
"""{text}"""

Return ONLY a valid JSON object with these exact fields:
{{
  "verdict": "SPAM" or "NOT SPAM",
  "confidence": <number 0-100>,
  "spam_score": <number 0-100>,
  "category": <one of: "Phishing", "Promotional", "Scam", "Malware", "Social Engineering", "Legitimate", "Suspicious">,
  "reasons": [<list of 2-4 specific reasons for the verdict>],
  "suspicious_words": [<list of specific words/phrases that are suspicious, empty list if none>],
  "safe_words": [<list of 2-3 words that indicate legitimacy, empty list if spam>],
  "recommendation": <one short action sentence for the user>
}}

Return ONLY valid JSON. No markdown, no explanation."#,
            sensitivity = self.sensitivity.binary_instruction(),
            text = self.text,
        );

        Prompt {
            system: BINARY_SYSTEM_PROMPT.to_string(),
            user,
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedactionRequest {
    text: String,
    pub rules: RedactionRuleSet,
    pub placeholder: Placeholder,
}

impl RedactionRequest {
    pub fn new(raw_text: &str, rules: RedactionRuleSet, placeholder: Placeholder) -> Self {
        Self {
            text: truncate_chars(raw_text, REDACTION_CHAR_LIMIT).to_string(),
            rules,
            placeholder,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn prompt(&self) -> Prompt {
        let mut rules = String::new();
        for rule in self.rules.rule_descriptions() {
            let _ = writeln!(rules, "- {}", rule);
        }
        if rules.is_empty() {
            rules.push_str("- Nothing. Return the document unchanged.\n");
        }

        let user = format!(
            r#"Redact sensitive personal information from the document below.

REDACT THE FOLLOWING:
{rules}
Replace every redacted value with the exact token {token} and keep all other text, labels and line breaks unchanged.

DOCUMENT:
"""
{text}
"""

Return ONLY a valid JSON object with these exact fields:
{{
  "clean_text": "<the full document text with redactions applied>",
  "redacted_items": [<short description of each kind of item redacted>],
  "redaction_count": <integer number of redactions made>
}}

Return ONLY valid JSON. No markdown, no explanation."#,
            token = self.placeholder.token(),
            text = self.text,
        );

        Prompt {
            system: REDACTION_SYSTEM_PROMPT.to_string(),
            user,
            temperature: 0.0,
            max_tokens: 4000,
        }
    }
}

/// Prompt for transcribing an attached image; the answer is plain text.
pub fn image_to_text_prompt() -> Prompt {
    Prompt {
        system: IMAGE_SYSTEM_PROMPT.to_string(),
        user: "Extract all text from this image exactly as it appears, preserving line breaks. Return only the extracted text with no commentary.".to_string(),
        temperature: 0.0,
        max_tokens: 4000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::RedactionCategory;

    fn detailed(text: &str, checks: BTreeSet<Check>) -> ClassificationRequest {
        ClassificationRequest::new(
            text,
            ResponseFormat::Detailed,
            ContentType::AutoDetect,
            Sensitivity::Balanced,
            checks,
        )
    }

    #[test]
    fn truncation_keeps_exact_prefix() {
        let long = "a".repeat(CLASSIFICATION_CHAR_LIMIT + 500) + "TAIL";
        let req = detailed(&long, Check::defaults());
        assert_eq!(req.text().chars().count(), CLASSIFICATION_CHAR_LIMIT);
        assert!(!req.prompt().user.contains("TAIL"));
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let text = "é".repeat(10);
        assert_eq!(truncate_chars(&text, 4), "éééé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn redaction_text_is_capped_at_its_own_limit() {
        let long = "b".repeat(REDACTION_CHAR_LIMIT + 1);
        let req = RedactionRequest::new(&long, RedactionRuleSet::all(), Placeholder::Tag);
        assert_eq!(req.text().chars().count(), REDACTION_CHAR_LIMIT);
    }

    #[test]
    fn detailed_prompt_lists_enabled_checks_in_order() {
        let checks: BTreeSet<Check> = [Check::Sentiment, Check::Phishing].into_iter().collect();
        let p = detailed("hello there", checks).prompt();
        let phishing = p.user.find("phishing links").unwrap();
        let sentiment = p.user.find("overall sentiment").unwrap();
        assert!(phishing < sentiment);
        assert!(!p.user.contains("urgency tactics"));
        assert!(p.user.contains("DETECTION MODE: Use balanced judgment."));
        assert!(!p.user.contains("The content type is"));
        assert_eq!(p.max_tokens, 800);
    }

    #[test]
    fn detailed_prompt_without_checks_falls_back_to_general_patterns() {
        let p = detailed("hello there", BTreeSet::new()).prompt();
        assert!(p.user.contains("- General spam patterns"));
    }

    #[test]
    fn content_hint_is_added_for_explicit_types() {
        let req = ClassificationRequest::new(
            "hello there",
            ResponseFormat::Detailed,
            ContentType::Email,
            Sensitivity::Strict,
            Check::defaults(),
        );
        let p = req.prompt();
        assert!(p.user.contains(" The content type is: Email."));
        assert!(p.user.contains("Be strict — flag anything remotely suspicious."));
    }

    #[test]
    fn binary_prompt_asks_for_alternate_contract() {
        let req = ClassificationRequest::new(
            "hello there",
            ResponseFormat::Binary,
            ContentType::Sms,
            Sensitivity::Lenient,
            Check::defaults(),
        );
        let p = req.prompt();
        assert!(p.user.contains("\"suspicious_words\""));
        assert!(p.user.contains("Analyze this SMS / Text Message:"));
        assert!(p.user.contains("Prefer safe over spam"));
        assert_eq!(p.max_tokens, 1000);
    }

    #[test]
    fn redaction_prompt_mirrors_enabled_rules() {
        let rules = RedactionRuleSet::only(&[RedactionCategory::Ids, RedactionCategory::Names]);
        let p = RedactionRequest::new("Name: Asha", rules, Placeholder::Block).prompt();
        assert!(p.user.contains(RedactionCategory::Ids.rule_description()));
        assert!(p.user.contains(RedactionCategory::Names.rule_description()));
        assert!(!p.user.contains(RedactionCategory::Banking.rule_description()));
        assert!(p.user.contains(Placeholder::Block.token()));
        assert!(p.user.contains("\"clean_text\""));
    }

    #[test]
    fn parses_option_aliases() {
        assert_eq!("HIGH".parse::<Sensitivity>(), Ok(Sensitivity::Strict));
        assert_eq!("sms".parse::<ContentType>(), Ok(ContentType::Sms));
        assert_eq!("binary".parse::<ResponseFormat>(), Ok(ResponseFormat::Binary));
        assert!("loud".parse::<Sensitivity>().is_err());
    }
}
