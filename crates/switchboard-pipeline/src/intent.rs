//! End-of-call intent detection.
//!
//! A small closed set of English phrases, matched case-insensitively on
//! whole-word boundaries. Deliberately not a grammar: "goodbyes are hard"
//! must not hang up on the caller.

use regex::Regex;
use std::sync::OnceLock;

fn hangup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:goodbye|bye|hang\s+up|end\s+call|that[’']?s\s+all)\b")
            .expect("hangup pattern is a valid regex")
    })
}

/// Whether the utterance expresses end-of-call intent.
pub fn wants_hangup(utterance: &str) -> bool {
    hangup_pattern().is_match(utterance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_each_phrase() {
        for utterance in [
            "goodbye",
            "bye",
            "hang up",
            "end call",
            "that's all",
            "that’s all",
        ] {
            assert!(wants_hangup(utterance), "{utterance:?} should match");
        }
    }

    #[test]
    fn case_insensitive() {
        assert!(wants_hangup("GOODBYE"));
        assert!(wants_hangup("Bye!"));
        assert!(wants_hangup("OK, End Call please"));
    }

    #[test]
    fn matches_inside_sentences() {
        assert!(wants_hangup("I need to hang up now"));
        assert!(wants_hangup("okay bye"));
        assert!(wants_hangup("I think that's all for today"));
    }

    #[test]
    fn word_boundaries_not_substrings() {
        assert!(!wants_hangup("goodbyes are hard"));
        assert!(!wants_hangup("the byelaws changed"));
        assert!(!wants_hangup("hanging upside down"));
    }

    #[test]
    fn unrelated_utterances_do_not_match() {
        assert!(!wants_hangup("what's the weather tomorrow"));
        assert!(!wants_hangup(""));
    }
}
