#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::config::{DetectionSettings, RedactionSettings};
    use crate::error::ActionError;
    use crate::extract::{BasicExtractor, DocumentKind, Extracted, TextExtractor};
    use crate::llm::{CompletionOptions, GatewayError, ImagePayload, ModelGateway};
    use crate::pipeline::{self, RedactionStage};
    use crate::prompt::{ResponseFormat, CLASSIFICATION_CHAR_LIMIT};
    use crate::redaction::{Placeholder, RedactionCategory, RedactionRuleSet};
    use crate::session::SessionContext;
    use crate::verdict::{Category, Verdict};

    struct Call {
        user: String,
        options: CompletionOptions,
    }

    /// Replays canned completions in order and records what it was asked.
    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn replying(raw: &str) -> Self {
            Self::new(vec![Ok(raw.to_string())])
        }

        fn failing() -> Self {
            Self::new(vec![Err(GatewayError::Status {
                status: 503,
                body: "unavailable".into(),
            })])
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            options: CompletionOptions,
        ) -> Result<String, GatewayError> {
            self.calls.lock().unwrap().push(Call {
                user: user.to_string(),
                options,
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::EmptyCompletion))
        }
    }

    const PHISHING: &str =
        "URGENT: Your account has been suspended! Click here... http://secure-bank-login.xyz";
    const MEETING: &str = "Hi, just a reminder that our team meeting is tomorrow at 10am.";

    #[tokio::test]
    async fn phishing_message_is_spam() {
        let gateway = ScriptedGateway::replying(
            r#"```json
{"verdict": "SPAM", "confidence": 96, "reason": "Urgent account suspension with a lookalike link.",
 "signals": [{"label": "Suspicious URL", "severity": "high"}], "spam_score": 94,
 "category": "Phishing", "sentiment": "Alarming"}
```"#,
        );
        let settings = DetectionSettings::default();

        let result = pipeline::classify(&gateway, &settings, PHISHING).await.unwrap();

        assert_eq!(result.verdict, Verdict::Spam);
        assert!(result.confidence >= settings.threshold);
        assert_eq!(result.category, Category::Phishing);
        assert_eq!(gateway.call_count(), 1);
        assert!(gateway.calls.lock().unwrap()[0].user.contains(PHISHING));
    }

    #[tokio::test]
    async fn meeting_reminder_is_clean() {
        let gateway = ScriptedGateway::replying(
            r#"{"verdict": "CLEAN", "confidence": 92, "reason": "Routine internal reminder.",
 "signals": [], "spam_score": 3, "category": "Legitimate", "sentiment": "Friendly"}"#,
        );

        let result = pipeline::classify(&gateway, &DetectionSettings::default(), MEETING)
            .await
            .unwrap();

        assert_eq!(result.verdict, Verdict::Clean);
        assert!(result.spam_score < 20);
        assert_eq!(result.category, Category::Legitimate);
    }

    #[tokio::test]
    async fn confident_suspicious_is_escalated() {
        let reply = r#"{"verdict": "SUSPICIOUS", "confidence": 70, "spam_score": 60}"#;
        let mut settings = DetectionSettings::default();

        settings.set_threshold(70);
        let gateway = ScriptedGateway::replying(reply);
        let at = pipeline::classify(&gateway, &settings, MEETING).await.unwrap();
        assert_eq!(at.verdict, Verdict::Spam);

        settings.set_threshold(71);
        let gateway = ScriptedGateway::replying(reply);
        let below = pipeline::classify(&gateway, &settings, MEETING).await.unwrap();
        assert_eq!(below.verdict, Verdict::Suspicious);
    }

    #[tokio::test]
    async fn binary_format_fills_word_lists() {
        let gateway = ScriptedGateway::replying(
            r#"{"verdict": "NOT SPAM", "confidence": 88, "spam_score": 5, "category": "Legitimate",
 "reasons": ["Known sender", "No links"], "suspicious_words": [], "safe_words": ["meeting"],
 "recommendation": "Safe to read."}"#,
        );
        let settings = DetectionSettings {
            format: ResponseFormat::Binary,
            ..DetectionSettings::default()
        };

        let result = pipeline::classify(&gateway, &settings, MEETING).await.unwrap();

        assert_eq!(result.verdict, Verdict::NotSpam);
        assert_eq!(result.safe_words, vec!["meeting".to_string()]);
        assert_eq!(result.recommendation.as_deref(), Some("Safe to read."));
        assert_eq!(gateway.calls.lock().unwrap()[0].options.max_tokens, 1000);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_gateway() {
        let gateway = ScriptedGateway::replying("{}");
        let settings = DetectionSettings::default();

        for input in ["", "   ", "abc"] {
            let err = pipeline::classify(&gateway, &settings, input).await.unwrap_err();
            assert!(matches!(err, ActionError::Validation(_)), "{input:?}");

            let err = pipeline::redact(Some(&gateway), &RedactionSettings::default(), input)
                .await
                .unwrap_err();
            assert!(matches!(err, ActionError::Validation(_)), "{input:?}");
        }
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_output_and_gateway_failure_are_distinct() {
        let settings = DetectionSettings::default();

        let garbled = ScriptedGateway::replying("I think this is spam, maybe.");
        let err = pipeline::classify(&garbled, &settings, PHISHING).await.unwrap_err();
        assert!(matches!(err, ActionError::MalformedResponse(_)));
        assert_eq!(
            err.user_message(),
            "AI returned malformed response. Please try again."
        );

        let down = ScriptedGateway::failing();
        let err = pipeline::classify(&down, &settings, PHISHING).await.unwrap_err();
        assert!(matches!(err, ActionError::Gateway(_)));
        assert!(err.user_message().starts_with("Analysis failed"));
    }

    #[tokio::test]
    async fn long_input_is_truncated_before_embedding() {
        let gateway = ScriptedGateway::replying(r#"{"verdict": "CLEAN"}"#);
        let text = format!("{}{}", "a".repeat(CLASSIFICATION_CHAR_LIMIT), "TAILMARKER");

        pipeline::classify(&gateway, &DetectionSettings::default(), &text)
            .await
            .unwrap();

        let calls = gateway.calls.lock().unwrap();
        assert!(!calls[0].user.contains("TAILMARKER"));
    }

    #[tokio::test]
    async fn session_records_successes_only() {
        let gateway = ScriptedGateway::new(vec![
            Ok(r#"{"verdict": "SPAM", "confidence": 90}"#.into()),
            Ok("not json".into()),
        ]);
        let settings = DetectionSettings::default();
        let mut session = SessionContext::new();

        pipeline::classify_in_session(&gateway, &settings, &mut session, PHISHING)
            .await
            .unwrap();
        let _ = pipeline::classify_in_session(&gateway, &settings, &mut session, MEETING).await;

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.running_counts(), (1, 0));
    }

    fn ids_only() -> RedactionSettings {
        RedactionSettings {
            rules: RedactionRuleSet::only(&[RedactionCategory::Ids]),
            placeholder: Placeholder::Tag,
            use_ai: true,
        }
    }

    #[tokio::test]
    async fn aadhaar_is_redacted_when_ai_fails() {
        let text = "Applicant Aadhaar 1234 5678 9012 attached.";
        let gateway = ScriptedGateway::failing();

        let outcome = pipeline::redact(Some(&gateway), &ids_only(), text).await.unwrap();

        assert_eq!(outcome.stage, RedactionStage::FallbackOnly);
        assert_eq!(outcome.result.clean_text, "Applicant Aadhaar [REDACTED] attached.");
        assert_eq!(outcome.result.redacted_items, vec!["Aadhaar number".to_string()]);
        assert_eq!(outcome.result.redaction_count, 1);
    }

    #[tokio::test]
    async fn aadhaar_is_redacted_without_ai() {
        let gateway = ScriptedGateway::replying("{}");
        let settings = RedactionSettings {
            use_ai: false,
            ..ids_only()
        };

        let outcome = pipeline::redact(Some(&gateway), &settings, "ID 1234 5678 9012")
            .await
            .unwrap();
        assert_eq!(outcome.result.clean_text, "ID [REDACTED]");
        assert_eq!(gateway.call_count(), 0);

        let outcome = pipeline::redact(None, &ids_only(), "ID 1234 5678 9012")
            .await
            .unwrap();
        assert_eq!(outcome.stage, RedactionStage::FallbackOnly);
        assert_eq!(outcome.result.redaction_count, 1);
    }

    #[tokio::test]
    async fn nothing_enabled_skips_the_model() {
        let gateway = ScriptedGateway::replying("{}");
        let settings = RedactionSettings {
            rules: RedactionRuleSet::only(&[]),
            ..RedactionSettings::default()
        };

        let outcome = pipeline::redact(Some(&gateway), &settings, "ID 1234 5678 9012")
            .await
            .unwrap();

        assert_eq!(outcome.result.clean_text, "ID 1234 5678 9012");
        assert_eq!(outcome.result.redaction_count, 0);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn unparseable_redaction_falls_back() {
        let gateway = ScriptedGateway::replying("Sorry, I can't help with that.");
        let outcome = pipeline::redact(Some(&gateway), &ids_only(), "ID 1234 5678 9012")
            .await
            .unwrap();
        assert_eq!(outcome.stage, RedactionStage::FallbackOnly);
        assert_eq!(outcome.result.clean_text, "ID [REDACTED]");
    }

    #[tokio::test]
    async fn fallback_reinforces_ai_redaction() {
        let text = "Name: Ravi Kumar\nMobile: 9876543210";
        let gateway = ScriptedGateway::replying(
            r#"{"clean_text": "Name: [REDACTED]\nMobile: 9876543210",
 "redacted_items": ["Full name"], "redaction_count": 1}"#,
        );

        let outcome = pipeline::redact(Some(&gateway), &RedactionSettings::default(), text)
            .await
            .unwrap();

        assert_eq!(outcome.stage, RedactionStage::AiWithFallback);
        assert_eq!(outcome.result.clean_text, "Name: [REDACTED]\nMobile: [REDACTED]");
        assert_eq!(outcome.result.redaction_count, 2);
        assert_eq!(outcome.result.redacted_items[0], "Full name");
        assert_eq!(gateway.calls.lock().unwrap()[0].options.temperature, 0.0);
    }

    #[tokio::test]
    async fn text_documents_are_extracted_and_redacted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("form.txt");
        fs::write(&path, "PAN: ABCDE1234F\n").unwrap();

        let outcome = pipeline::redact_document(
            None,
            &BasicExtractor,
            &RedactionSettings::default(),
            &path,
        )
        .await
        .unwrap();

        assert_eq!(outcome.result.clean_text, "PAN: [REDACTED]");
    }

    #[tokio::test]
    async fn images_go_through_the_vision_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.png");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let gateway = ScriptedGateway::replying("```\nInvoice #42\nTotal due: 300\n```");

        let text = pipeline::extract_document(Some(&gateway), &BasicExtractor, &path)
            .await
            .unwrap();

        assert_eq!(text, "Invoice #42\nTotal due: 300");
        let calls = gateway.calls.lock().unwrap();
        let image = calls[0].options.image.as_ref().unwrap();
        assert_eq!(image.mime, "image/png");
    }

    /// A PDF with no text layer whose pages render to a PNG.
    struct ScannedPdfExtractor;

    impl TextExtractor for ScannedPdfExtractor {
        fn extract(&self, _kind: DocumentKind, _bytes: &[u8]) -> anyhow::Result<Extracted> {
            Ok(Extracted::Text(" \n".into()))
        }

        fn render_image(&self, kind: DocumentKind, bytes: &[u8]) -> Option<ImagePayload> {
            (kind == DocumentKind::Pdf).then(|| ImagePayload {
                mime: "image/png".into(),
                bytes: bytes.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn textless_pdf_is_read_by_the_vision_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        fs::write(&path, b"%PDF-1.7").unwrap();
        let gateway = ScriptedGateway::replying("Aadhaar 1234 5678 9012");

        let text = pipeline::extract_document(Some(&gateway), &ScannedPdfExtractor, &path)
            .await
            .unwrap();

        assert_eq!(text, "Aadhaar 1234 5678 9012");
        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let image = calls[0].options.image.as_ref().unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(image.bytes, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn textless_pdf_without_gateway_fails_extraction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        fs::write(&path, b"%PDF-1.7").unwrap();

        let err = pipeline::extract_document(None, &ScannedPdfExtractor, &path)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Extraction(m) if m.contains("API key")));
    }

    #[tokio::test]
    async fn unreadable_documents_fail_extraction() {
        let dir = TempDir::new().unwrap();

        let pdf = dir.path().join("report.pdf");
        fs::write(&pdf, b"%PDF-1.7").unwrap();
        let err = pipeline::extract_document(None, &BasicExtractor, &pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Extraction(_)));

        let blank = dir.path().join("blank.txt");
        fs::write(&blank, "  \n ").unwrap();
        let err = pipeline::extract_document(None, &BasicExtractor, &blank)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Extraction(_)));

        let png = dir.path().join("scan.png");
        fs::write(&png, [0x89]).unwrap();
        let err = pipeline::extract_document(None, &BasicExtractor, &png)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Extraction(_)));
    }
}
