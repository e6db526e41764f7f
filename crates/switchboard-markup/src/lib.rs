//! Control-markup documents for the telephony provider.
//!
//! Every webhook response is a small XML document with a `<Response>` root
//! whose ordered children tell the provider what to do next: speak a line
//! (`Say`), record the caller (`Record`), wait (`Pause`), or re-request a
//! route (`Redirect`). A `<Response>` with a single `Say` and no further
//! directive makes the provider hang up after speaking.
//!
//! The builder is infallible: any string content is XML-escaped on render.

/// Settings for a `Record` directive.
///
/// `trim="trim-silence"` and `playBeep="false"` are fixed: the bridge always
/// trims trailing silence and never beeps at the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSettings {
    /// Route the provider posts the finished recording to.
    pub action: String,
    /// Hard cap on recording length, in seconds. Must stay well under the
    /// provider's per-request limit.
    pub max_length_secs: u32,
    /// Seconds of silence after which the recording stops.
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say { voice: String, text: String },
    Record(RecordSettings),
    Pause { length_secs: u32 },
    Redirect { method: String, url: String },
}

/// An ordered control-markup document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    verbs: Vec<Verb>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `Say` directive (text-to-speech line).
    pub fn say(mut self, voice: &str, text: &str) -> Self {
        self.verbs.push(Verb::Say {
            voice: voice.to_string(),
            text: text.to_string(),
        });
        self
    }

    /// Appends a `Record` directive.
    pub fn record(mut self, settings: RecordSettings) -> Self {
        self.verbs.push(Verb::Record(settings));
        self
    }

    /// Appends a `Pause` directive.
    pub fn pause(mut self, length_secs: u32) -> Self {
        self.verbs.push(Verb::Pause { length_secs });
        self
    }

    /// Appends a `Redirect` directive.
    pub fn redirect(mut self, method: &str, url: &str) -> Self {
        self.verbs.push(Verb::Redirect {
            method: method.to_string(),
            url: url.to_string(),
        });
        self
    }

    /// Renders the document as XML.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Say { voice, text } => {
                    out.push_str(&format!(
                        "<Say voice=\"{}\">{}</Say>",
                        escape_xml(voice),
                        escape_xml(text)
                    ));
                }
                Verb::Record(settings) => {
                    out.push_str(&format!(
                        "<Record action=\"{}\" maxLength=\"{}\" timeout=\"{}\" \
                         trim=\"trim-silence\" playBeep=\"false\"/>",
                        escape_xml(&settings.action),
                        settings.max_length_secs,
                        settings.timeout_secs
                    ));
                }
                Verb::Pause { length_secs } => {
                    out.push_str(&format!("<Pause length=\"{}\"/>", length_secs));
                }
                Verb::Redirect { method, url } => {
                    out.push_str(&format!(
                        "<Redirect method=\"{}\">{}</Redirect>",
                        escape_xml(method),
                        escape_xml(url)
                    ));
                }
            }
        }
        out.push_str("</Response>");
        out
    }
}

/// A speak-then-record turn: opening line, recording, and a fallback line
/// spoken only if the recording never starts (caller silent until timeout).
pub fn gather_turn(voice: &str, line: &str, record: RecordSettings, fallback: &str) -> Response {
    Response::new()
        .say(voice, line)
        .record(record)
        .say(voice, fallback)
}

/// The wait loop: a short pause, then re-request the poll route. The provider
/// keeps the caller on the line while the pipeline finishes in the background.
pub fn thinking(poll_url: &str) -> Response {
    Response::new().pause(1).redirect("POST", poll_url)
}

/// A final spoken line with no further directive; the provider hangs up.
pub fn terminal(voice: &str, line: &str) -> Response {
    Response::new().say(voice, line)
}

/// Escapes text for use in XML element bodies and attribute values.
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RecordSettings {
        RecordSettings {
            action: "/voice/recording".to_string(),
            max_length_secs: 60,
            timeout_secs: 3,
        }
    }

    #[test]
    fn gather_turn_shape() {
        let xml = gather_turn("alice", "Hello there", record(), "Are you still there?").to_xml();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>"));
        assert!(xml.contains("<Say voice=\"alice\">Hello there</Say>"));
        assert!(xml.contains(
            "<Record action=\"/voice/recording\" maxLength=\"60\" timeout=\"3\" \
             trim=\"trim-silence\" playBeep=\"false\"/>"
        ));
        assert!(xml.ends_with("<Say voice=\"alice\">Are you still there?</Say></Response>"));

        // Order matters: Say before Record before fallback Say.
        let say = xml.find("Hello there").unwrap();
        let rec = xml.find("<Record").unwrap();
        let fallback = xml.find("Are you still there?").unwrap();
        assert!(say < rec && rec < fallback);
    }

    #[test]
    fn thinking_shape() {
        let xml = thinking("/voice/poll?callSid=CA123").to_xml();
        assert!(xml.contains("<Pause length=\"1\"/>"));
        assert!(xml.contains("<Redirect method=\"POST\">/voice/poll?callSid=CA123</Redirect>"));
        let pause = xml.find("<Pause").unwrap();
        let redirect = xml.find("<Redirect").unwrap();
        assert!(pause < redirect);
    }

    #[test]
    fn terminal_is_single_say() {
        let xml = terminal("alice", "Goodbye!").to_xml();
        assert!(xml.contains("<Say voice=\"alice\">Goodbye!</Say>"));
        assert!(!xml.contains("<Record"));
        assert!(!xml.contains("<Redirect"));
        assert!(!xml.contains("<Pause"));
    }

    #[test]
    fn say_body_is_escaped() {
        let xml = terminal("alice", "Tom & Jerry say \"hi\" <now>").to_xml();
        assert!(xml.contains("Tom &amp; Jerry say &quot;hi&quot; &lt;now&gt;"));
        assert!(!xml.contains("<now>"));
    }

    #[test]
    fn redirect_url_query_is_escaped() {
        let xml = thinking("/voice/poll?callSid=CA1&turn=2").to_xml();
        assert!(xml.contains("/voice/poll?callSid=CA1&amp;turn=2"));
    }

    #[test]
    fn escape_handles_all_entities() {
        assert_eq!(escape_xml("&<>\"'"), "&amp;&lt;&gt;&quot;&apos;");
        assert_eq!(escape_xml("plain text"), "plain text");
    }

    #[test]
    fn empty_response_renders() {
        let xml = Response::new().to_xml();
        assert!(xml.ends_with("<Response></Response>"));
    }
}
