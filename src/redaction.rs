use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Kinds of sensitive data the redactor knows about.
///
/// Each variant maps to a prompt rule and to the fallback patterns through
/// exhaustive matches, so both stay gated by the same flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionCategory {
    Ids,
    Phones,
    Banking,
    Passwords,
    Names,
    Dates,
}

impl RedactionCategory {
    /// Order used when listing rules in the prompt.
    pub const ALL: [RedactionCategory; 6] = [
        RedactionCategory::Ids,
        RedactionCategory::Phones,
        RedactionCategory::Banking,
        RedactionCategory::Passwords,
        RedactionCategory::Names,
        RedactionCategory::Dates,
    ];

    /// Order used by the fallback pass. Cards go first so the 12-digit ID
    /// pattern never takes part of one, and phones precede IDs so a compact
    /// `+91` number is not read as a 12-digit ID.
    const FALLBACK_ORDER: [RedactionCategory; 6] = [
        RedactionCategory::Banking,
        RedactionCategory::Phones,
        RedactionCategory::Ids,
        RedactionCategory::Dates,
        RedactionCategory::Names,
        RedactionCategory::Passwords,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionCategory::Ids => "ids",
            RedactionCategory::Phones => "phones",
            RedactionCategory::Banking => "banking",
            RedactionCategory::Passwords => "passwords",
            RedactionCategory::Names => "names",
            RedactionCategory::Dates => "dates",
        }
    }

    pub fn rule_description(&self) -> &'static str {
        match self {
            RedactionCategory::Ids => {
                "Government ID numbers: Aadhaar numbers (12 digits, often written as 1234 5678 9012) and PAN numbers (like ABCDE1234F)"
            }
            RedactionCategory::Phones => "Phone numbers and email addresses",
            RedactionCategory::Banking => {
                "Bank account numbers, debit/credit card numbers, IFSC codes and UPI IDs"
            }
            RedactionCategory::Passwords => "Passwords, PINs, OTPs and other secret codes",
            RedactionCategory::Names => {
                "Personal names of individuals (keep field labels such as 'Name:')"
            }
            RedactionCategory::Dates => {
                "Dates of birth (keep field labels such as 'DOB:' or 'Date of Birth:')"
            }
        }
    }

    fn patterns(&self) -> &'static [PatternRule] {
        match self {
            RedactionCategory::Ids => ID_PATTERNS.as_slice(),
            RedactionCategory::Phones => PHONE_PATTERNS.as_slice(),
            RedactionCategory::Banking => BANKING_PATTERNS.as_slice(),
            RedactionCategory::Passwords => PASSWORD_PATTERNS.as_slice(),
            RedactionCategory::Names => NAME_PATTERNS.as_slice(),
            RedactionCategory::Dates => DATE_PATTERNS.as_slice(),
        }
    }
}

impl std::str::FromStr for RedactionCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ids" | "id" | "aadhaar" | "pan" => Ok(RedactionCategory::Ids),
            "phones" | "phone" | "email" | "contact" => Ok(RedactionCategory::Phones),
            "banking" | "bank" | "cards" => Ok(RedactionCategory::Banking),
            "passwords" | "password" | "secrets" => Ok(RedactionCategory::Passwords),
            "names" | "name" => Ok(RedactionCategory::Names),
            "dates" | "dob" => Ok(RedactionCategory::Dates),
            other => Err(format!("Unknown redaction category: {}", other)),
        }
    }
}

/// Token written in place of redacted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    #[default]
    Tag,
    Block,
}

impl Placeholder {
    pub fn token(&self) -> &'static str {
        match self {
            Placeholder::Tag => "[REDACTED]",
            Placeholder::Block => "████████",
        }
    }
}

impl std::str::FromStr for Placeholder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tag" | "redacted" => Ok(Placeholder::Tag),
            "block" | "glyph" => Ok(Placeholder::Block),
            other => Err(format!("Unknown placeholder style: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionRuleSet {
    enabled: BTreeSet<RedactionCategory>,
}

impl Default for RedactionRuleSet {
    fn default() -> Self {
        Self::all()
    }
}

impl RedactionRuleSet {
    pub fn all() -> Self {
        Self {
            enabled: RedactionCategory::ALL.into_iter().collect(),
        }
    }

    pub fn only(categories: &[RedactionCategory]) -> Self {
        Self {
            enabled: categories.iter().copied().collect(),
        }
    }

    pub fn set(&mut self, category: RedactionCategory, enabled: bool) {
        if enabled {
            self.enabled.insert(category);
        } else {
            self.enabled.remove(&category);
        }
    }

    pub fn is_enabled(&self, category: RedactionCategory) -> bool {
        self.enabled.contains(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    /// Enabled categories in prompt order.
    pub fn categories(&self) -> impl Iterator<Item = RedactionCategory> + '_ {
        RedactionCategory::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
    }

    pub fn rule_descriptions(&self) -> Vec<&'static str> {
        self.categories().map(|c| c.rule_description()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionResult {
    pub clean_text: String,
    pub redacted_items: Vec<String>,
    pub redaction_count: u32,
}

struct PatternRule {
    label: &'static str,
    regex: Regex,
    /// Labeled fields keep capture groups 1 and 2 (label and separator).
    keeps_label: bool,
}

fn rule(label: &'static str, pattern: &str) -> PatternRule {
    PatternRule {
        label,
        regex: Regex::new(pattern).unwrap(),
        keeps_label: false,
    }
}

fn labeled(label: &'static str, pattern: &str) -> PatternRule {
    PatternRule {
        keeps_label: true,
        ..rule(label, pattern)
    }
}

// Values of labeled fields must not start with '[' or a block glyph, which
// keeps a second pass from re-matching its own placeholders.
static ID_PATTERNS: LazyLock<[PatternRule; 2]> = LazyLock::new(|| {
    [
        rule("Aadhaar number", r"\b\d{4} ?\d{4} ?\d{4}\b"),
        rule("PAN number", r"\b[A-Z]{5}\d{4}[A-Z]\b"),
    ]
});

// Emails first: a digit run inside the local part must not be taken as a
// phone number.
static PHONE_PATTERNS: LazyLock<[PatternRule; 2]> = LazyLock::new(|| {
    [
        rule(
            "Email address",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        ),
        rule(
            "Phone number",
            r"(?:\+\d{2}[ -]?|\b\d{2}[ -]|\b)[6-9]\d{9}\b",
        ),
    ]
});

static BANKING_PATTERNS: LazyLock<[PatternRule; 2]> = LazyLock::new(|| {
    [
        rule("Card number", r"\b\d{4}[ -]?\d{4}[ -]?\d{4}[ -]?\d{1,4}\b"),
        rule("IFSC code", r"\b[A-Z]{4}\d[A-Z0-9]{6}\b"),
    ]
});

static PASSWORD_PATTERNS: LazyLock<[PatternRule; 1]> = LazyLock::new(|| {
    [labeled(
        "Password",
        r"(?i)(\b(?:password|passcode|passwd|pwd|pin|otp))(\s*[:=]\s*)([^\s\[█]\S*)",
    )]
});

static NAME_PATTERNS: LazyLock<[PatternRule; 1]> = LazyLock::new(|| {
    [labeled(
        "Name",
        r"(?i)(\bname|नाम)([ \t]*[:\-][ \t]*)(\p{L}[\p{L}\p{M} ]{2,39})",
    )]
});

static DATE_PATTERNS: LazyLock<[PatternRule; 2]> = LazyLock::new(|| {
    [
        rule("Date of birth", r"\b\d{1,2}[/-]\d{1,2}[/-]\d{4}\b"),
        labeled(
            "Date of birth",
            r"(?i)(\b(?:DOB|D\.O\.B\.?|Date of Birth)|जन्म तिथि)([ \t]*:[ \t]*)([0-9A-Za-z][0-9A-Za-z ,./-]*)",
        ),
    ]
});

/// Safety cap on fixpoint passes. Placeholders never match a pattern, so
/// real input settles in two or three.
const MAX_PASSES: usize = 8;

/// Deterministic pattern-based redactor.
///
/// Counting is per category, not per match: a category that changed the
/// text contributes one item description and adds one to the count.
pub struct FallbackRedactor {
    rules: RedactionRuleSet,
    placeholder: Placeholder,
}

impl FallbackRedactor {
    pub fn new(rules: RedactionRuleSet, placeholder: Placeholder) -> Self {
        Self { rules, placeholder }
    }

    pub fn redact(&self, input: &str) -> RedactionResult {
        let mut out = input.to_string();
        let mut found: Vec<(RedactionCategory, Vec<&'static str>)> = Vec::new();

        // Removing a value can open a word boundary for a pattern that ran
        // earlier, so passes repeat until the text settles.
        for _ in 0..MAX_PASSES {
            let mut changed = false;
            for category in RedactionCategory::FALLBACK_ORDER {
                if !self.rules.is_enabled(category) {
                    continue;
                }
                for pattern in category.patterns() {
                    let Some(next) = self.apply(pattern, &out) else {
                        continue;
                    };
                    out = next;
                    changed = true;

                    let at = match found.iter().position(|(c, _)| *c == category) {
                        Some(at) => at,
                        None => {
                            found.push((category, Vec::new()));
                            found.len() - 1
                        }
                    };
                    let labels = &mut found[at].1;
                    if !labels.contains(&pattern.label) {
                        labels.push(pattern.label);
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let items: Vec<String> = found
            .into_iter()
            .map(|(category, labels)| {
                tracing::debug!(category = category.as_str(), "fallback redaction applied");
                labels.join(", ")
            })
            .collect();

        RedactionResult {
            clean_text: out,
            redaction_count: items.len() as u32,
            redacted_items: items,
        }
    }

    /// Replaces every match of `pattern`, or returns `None` when nothing
    /// matched.
    fn apply(&self, pattern: &PatternRule, text: &str) -> Option<String> {
        let token = self.placeholder.token();
        let replaced = pattern.regex.replace_all(text, |caps: &Captures| {
            if pattern.keeps_label {
                format!("{}{}{}", &caps[1], &caps[2], token)
            } else {
                token.to_string()
            }
        });
        match replaced {
            Cow::Owned(next) => Some(next),
            Cow::Borrowed(_) => None,
        }
    }

    /// Runs the fallback over an AI-redacted result and merges the two.
    ///
    /// Item lists are concatenated without deduplication and the counts are
    /// summed.
    pub fn reinforce(&self, ai: RedactionResult) -> RedactionResult {
        let second = self.redact(&ai.clean_text);
        let mut items = ai.redacted_items;
        items.extend(second.redacted_items);
        RedactionResult {
            clean_text: second.clean_text,
            redacted_items: items,
            redaction_count: ai.redaction_count + second.redaction_count,
        }
    }
}
