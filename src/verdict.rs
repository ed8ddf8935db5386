use serde::{Deserialize, Serialize};

pub const MIN_THRESHOLD: u8 = 10;
pub const MAX_THRESHOLD: u8 = 90;
pub const DEFAULT_THRESHOLD: u8 = 50;

/// Lifecycle: `Pending` until a response is parsed, then one of the
/// terminal verdicts. `Suspicious` may be escalated to `Spam` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pending,
    Spam,
    Suspicious,
    Clean,
    NotSpam,
    Unknown,
}

impl Verdict {
    /// Maps a model label; anything unrecognised becomes `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "SPAM" => Verdict::Spam,
            "SUSPICIOUS" => Verdict::Suspicious,
            "CLEAN" => Verdict::Clean,
            "NOT SPAM" => Verdict::NotSpam,
            _ => Verdict::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pending => "PENDING",
            Verdict::Spam => "SPAM",
            Verdict::Suspicious => "SUSPICIOUS",
            Verdict::Clean => "CLEAN",
            Verdict::NotSpam => "NOT SPAM",
            Verdict::Unknown => "UNKNOWN",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::Pending)
    }

    pub fn is_spam(&self) -> bool {
        matches!(self, Verdict::Spam)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Verdict::Clean | Verdict::NotSpam)
    }

    /// Visual treatment; `Unknown` borrows the suspicious styling but keeps
    /// its own label.
    pub fn tone(&self) -> Tone {
        match self {
            Verdict::Spam => Tone::Danger,
            Verdict::Clean | Verdict::NotSpam => Tone::Safe,
            Verdict::Suspicious | Verdict::Unknown => Tone::Warning,
            Verdict::Pending => Tone::Muted,
        }
    }

    pub fn banner(&self) -> &'static str {
        match self {
            Verdict::Pending => "… ANALYZING",
            Verdict::Spam => "🚨 SPAM DETECTED",
            Verdict::Suspicious => "⚠️ SUSPICIOUS",
            Verdict::Clean => "✅ CLEAN",
            Verdict::NotSpam => "✅ NOT SPAM",
            Verdict::Unknown => "❓ UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Danger,
    Warning,
    Safe,
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Category {
    Phishing,
    Scam,
    Promotional,
    Malware,
    SocialEngineering,
    Legitimate,
    Suspicious,
    #[default]
    Unknown,
}

impl Category {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "phishing" => Category::Phishing,
            "scam" => Category::Scam,
            "promotional" => Category::Promotional,
            "malware" => Category::Malware,
            "social engineering" => Category::SocialEngineering,
            "legitimate" => Category::Legitimate,
            "suspicious" => Category::Suspicious,
            _ => Category::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Phishing => "Phishing",
            Category::Scam => "Scam",
            Category::Promotional => "Promotional",
            Category::Malware => "Malware",
            Category::SocialEngineering => "Social Engineering",
            Category::Legitimate => "Legitimate",
            Category::Suspicious => "Suspicious",
            Category::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sentiment {
    #[default]
    Neutral,
    Alarming,
    Enticing,
    Threatening,
    Friendly,
}

impl Sentiment {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "alarming" => Sentiment::Alarming,
            "enticing" => Sentiment::Enticing,
            "threatening" => Sentiment::Threatening,
            "friendly" => Sentiment::Friendly,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Neutral => "Neutral",
            Sentiment::Alarming => "Alarming",
            Sentiment::Enticing => "Enticing",
            Sentiment::Threatening => "Threatening",
            Sentiment::Friendly => "Friendly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    #[default]
    Low,
}

impl Severity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub label: String,
    pub severity: Severity,
}

/// One classification, whichever response contract it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub verdict: Verdict,
    pub confidence: u8,
    pub spam_score: u8,
    pub category: Category,
    pub sentiment: Sentiment,
    pub reason: String,
    pub signals: Vec<Signal>,
    pub reasons: Vec<String>,
    pub suspicious_words: Vec<String>,
    pub safe_words: Vec<String>,
    pub recommendation: Option<String>,
}

impl ClassificationResult {
    /// Escalates a confident `Suspicious` verdict to `Spam`.
    ///
    /// `confidence == threshold` escalates. No other field changes.
    pub fn apply_threshold(self, threshold: u8) -> Self {
        if self.verdict == Verdict::Suspicious && self.confidence >= threshold {
            Self {
                verdict: Verdict::Spam,
                ..self
            }
        } else {
            self
        }
    }
}

/// Clamps a user-provided threshold into the supported range.
pub fn clamp_threshold(threshold: u8) -> u8 {
    threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suspicious(confidence: u8) -> ClassificationResult {
        ClassificationResult {
            verdict: Verdict::Suspicious,
            confidence,
            spam_score: 40,
            category: Category::Scam,
            sentiment: Sentiment::Enticing,
            reason: "Too good to be true.".into(),
            signals: vec![Signal {
                label: "Prize claim".into(),
                severity: Severity::High,
            }],
            reasons: vec![],
            suspicious_words: vec![],
            safe_words: vec![],
            recommendation: None,
        }
    }

    #[test]
    fn escalates_iff_confidence_reaches_threshold() {
        for threshold in MIN_THRESHOLD..=MAX_THRESHOLD {
            for confidence in 0..=100u8 {
                let out = suspicious(confidence).apply_threshold(threshold);
                if confidence >= threshold {
                    assert_eq!(out.verdict, Verdict::Spam, "C={confidence} T={threshold}");
                } else {
                    assert_eq!(out.verdict, Verdict::Suspicious, "C={confidence} T={threshold}");
                }
            }
        }
    }

    #[test]
    fn escalation_touches_only_the_verdict() {
        let before = suspicious(80);
        let after = before.clone().apply_threshold(50);
        assert_eq!(
            ClassificationResult {
                verdict: Verdict::Suspicious,
                ..after
            },
            before
        );
    }

    #[test]
    fn other_verdicts_are_never_overridden() {
        for verdict in [Verdict::Clean, Verdict::NotSpam, Verdict::Unknown, Verdict::Spam] {
            let result = ClassificationResult {
                verdict,
                ..suspicious(99)
            };
            assert_eq!(result.apply_threshold(10).verdict, verdict);
        }
    }

    #[test]
    fn maps_labels_leniently() {
        assert_eq!(Verdict::from_label("spam"), Verdict::Spam);
        assert_eq!(Verdict::from_label("NOT_SPAM"), Verdict::NotSpam);
        assert_eq!(Verdict::from_label("maybe"), Verdict::Unknown);
        assert_eq!(Category::from_label("social engineering"), Category::SocialEngineering);
        assert_eq!(Category::from_label("Crypto"), Category::Unknown);
        assert_eq!(Severity::from_label("HIGH"), Severity::High);
        assert_eq!(Severity::from_label("???"), Severity::Low);
    }

    #[test]
    fn unknown_uses_suspicious_styling_with_its_own_label() {
        assert_eq!(Verdict::Unknown.tone(), Verdict::Suspicious.tone());
        assert_ne!(Verdict::Unknown.banner(), Verdict::Suspicious.banner());
        assert!(!Verdict::Pending.is_terminal());
        assert!(Verdict::Unknown.is_terminal());
    }

    #[test]
    fn threshold_is_clamped() {
        assert_eq!(clamp_threshold(0), MIN_THRESHOLD);
        assert_eq!(clamp_threshold(95), MAX_THRESHOLD);
        assert_eq!(clamp_threshold(55), 55);
    }
}
