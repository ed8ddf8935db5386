use regex::RegexBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Plain,
    Suspicious,
    Safe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub mark: Mark,
}

/// Splits `text` into spans, marking case-insensitive occurrences of the
/// given words. Longer phrases win over their substrings; a word listed as
/// both suspicious and safe is marked suspicious.
pub fn highlight(text: &str, suspicious: &[String], safe: &[String]) -> Vec<Span> {
    let mut words: Vec<&str> = suspicious
        .iter()
        .chain(safe.iter())
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect();
    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    words.dedup_by(|a, b| a.eq_ignore_ascii_case(b));

    if words.is_empty() {
        return vec![Span {
            text: text.to_string(),
            mark: Mark::Plain,
        }];
    }

    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    let Ok(re) = RegexBuilder::new(&alternation).case_insensitive(true).build() else {
        return vec![Span {
            text: text.to_string(),
            mark: Mark::Plain,
        }];
    };

    let is_suspicious = |m: &str| suspicious.iter().any(|w| w.trim().eq_ignore_ascii_case(m));
    let mut spans = Vec::new();
    let mut last = 0;
    for found in re.find_iter(text) {
        if found.start() > last {
            spans.push(Span {
                text: text[last..found.start()].to_string(),
                mark: Mark::Plain,
            });
        }
        spans.push(Span {
            text: found.as_str().to_string(),
            mark: if is_suspicious(found.as_str()) {
                Mark::Suspicious
            } else {
                Mark::Safe
            },
        });
        last = found.end();
    }
    if last < text.len() {
        spans.push(Span {
            text: text[last..].to_string(),
            mark: Mark::Plain,
        });
    }
    spans
}
