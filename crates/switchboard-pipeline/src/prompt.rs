//! Channel-tagged prompt assembly for the assistant.

use switchboard_types::Channel;

/// Builds the assistant prompt from the caller's utterance and optional
/// auxiliary context. Empty context sections are omitted entirely.
pub fn build_prompt(utterance: &str, channel: Channel, relevant: &str, memory: &str) -> String {
    let mut prompt = format!("[channel: {}]\n", channel.label());

    if !memory.trim().is_empty() {
        prompt.push_str("Known about the user:\n");
        prompt.push_str(memory.trim());
        prompt.push_str("\n\n");
    }

    if !relevant.trim().is_empty() {
        prompt.push_str("Relevant recent conversation:\n");
        prompt.push_str(relevant.trim());
        prompt.push_str("\n\n");
    }

    prompt.push_str("The user said: ");
    prompt.push_str(utterance.trim());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_prompt_has_channel_tag_and_utterance() {
        let prompt = build_prompt("what time is it", Channel::Voice, "", "");
        assert!(prompt.starts_with("[channel: voice]\n"));
        assert!(prompt.ends_with("The user said: what time is it"));
        assert!(!prompt.contains("Known about the user"));
        assert!(!prompt.contains("Relevant recent conversation"));
    }

    #[test]
    fn context_sections_appear_when_present() {
        let prompt = build_prompt(
            "remind me about dinner",
            Channel::Voice,
            "user mentioned dinner plans yesterday",
            "user's name is Sam",
        );
        assert!(prompt.contains("Known about the user:\nuser's name is Sam"));
        assert!(prompt.contains("Relevant recent conversation:\nuser mentioned dinner plans yesterday"));
        let memory = prompt.find("Known about").unwrap();
        let relevant = prompt.find("Relevant recent").unwrap();
        let said = prompt.find("The user said").unwrap();
        assert!(memory < relevant && relevant < said);
    }

    #[test]
    fn whitespace_only_context_is_omitted() {
        let prompt = build_prompt("hello", Channel::Voice, "  \n ", "\t");
        assert!(!prompt.contains("Known about the user"));
        assert!(!prompt.contains("Relevant recent conversation"));
    }
}
