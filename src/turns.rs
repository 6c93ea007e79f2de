//! Prompt turns sent to the generative provider.

use generation::{GenerationRequest, Turn};
use session_store::{ChatMessage, Role};

/// Marker every document-editor artifact must open with.
pub const LOGO_MARKER: &str = r#"<img src="/logo.svg" alt="logo" />"#;

/// Output format requested for the artifact body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// Presentation-ready HTML, used by the document editor.
    RichMarkup,
    Markdown,
}

impl ArtifactFormat {
    pub fn for_editor(is_document_editor: bool) -> Self {
        if is_document_editor {
            Self::RichMarkup
        } else {
            Self::Markdown
        }
    }

    fn format_line(self) -> &'static str {
        match self {
            Self::RichMarkup => "The artifact must be a valid rich HTML document fit for presentation.",
            Self::Markdown => "The artifact must be a valid Markdown document.",
        }
    }

    fn requires_logo(self) -> bool {
        self == Self::RichMarkup
    }
}

/// Instruction turn describing the reply grammar for `format`.
pub fn system_prompt(format: ArtifactFormat) -> String {
    let logo = if format.requires_logo() {
        format!("The artifact must always start with this logo:\n\n{LOGO_MARKER}\n")
    } else {
        String::new()
    };
    let artifact_example = if format.requires_logo() {
        format!("{LOGO_MARKER}\n<h1>Section 1</h1>\n<p>Some contents</p>\n<h1>Section 2</h1>")
    } else {
        "# Section 1\n\nSome contents\n\n# Section 2".to_string()
    };

    format!(
        "You are a helpful assistant that writes and revises one artifact for the user.
Reply only with the tagged blocks described below. Do not write anything outside them.

{format_line}

When asked for a document, cover every relevant section in depth.

For a new artifact or a large change, reply with the complete artifact and an explanation.
Never use placeholders such as \"[rest of the document unchanged]\".
---
<artifact>
{artifact_example}
</artifact>
<explanation>
Why the artifact looks the way it does.
</explanation>
---

For a small change (under 30 lines), reply with one or more edits and an explanation.
Each textToReplace must be copied exactly from the current artifact.
---
<edit>
<textToReplace>Exact text from the current artifact</textToReplace>
<replacement>Text to put in its place</replacement>
</edit>
<explanation>
What the edit changes.
</explanation>
---

Prefer edits over rewriting the whole artifact.

When the user changes the artifact themselves, you receive a diff of their change in the <user_edits> block.

{logo}
IMPORTANT: do not reply with text outside of the artifact, explanation or edit tags.
",
        format_line = format.format_line(),
    )
}

/// Prompt text for one stored human turn.
pub fn human_turn_text(message: &ChatMessage) -> String {
    format!(
        "<user_edits>\n{}\n</user_edits>\n<message>\n{}\n</message>\n<selected_text>\n{}\n</selected_text>",
        message.diff, message.content, message.selected_text
    )
}

/// Prompt text for one stored AI turn.
pub fn ai_turn_text(message: &ChatMessage) -> String {
    format!(
        "<artifact>\n{}\n</artifact>\n<explanation>\n{}\n</explanation>\n",
        message.doc, message.content
    )
}

/// System turn followed by one turn per stored message, oldest first.
pub fn assemble_turns(history: &[ChatMessage], format: ArtifactFormat) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(history.len() + 1);
    turns.push(Turn::system(system_prompt(format)));
    turns.extend(history.iter().map(|message| match message.role {
        Role::Human => Turn::user(human_turn_text(message)),
        Role::Ai => Turn::assistant(ai_turn_text(message)),
    }));
    turns
}

/// Single-turn request asking for a short session title.
pub fn title_request(content: &str, max_tokens: u32) -> GenerationRequest {
    let prompt = format!(
        "Generate a short title (a short sentence or phrase) for a chat session where the user made this request.\n\
         USER REQUEST: {content}\n\
         Respond with just one title and do not provide an explanation or options."
    );
    GenerationRequest {
        turns: vec![Turn::user(prompt)],
        max_tokens,
    }
}

/// Trims whitespace, one pair of surrounding quotes, and a `Title:` prefix.
pub fn clean_title(raw: &str) -> String {
    let mut title = raw.trim();
    if let Some(first_line) = title.lines().find(|line| !line.trim().is_empty()) {
        title = first_line.trim();
    }
    for prefix in ["Title:", "title:", "TITLE:"] {
        if let Some(rest) = title.strip_prefix(prefix) {
            title = rest.trim();
        }
    }
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('*', '*')] {
        if title.len() >= 2 && title.starts_with(open) && title.ends_with(close) {
            title = title[open.len_utf8()..title.len() - close.len_utf8()].trim();
        }
    }
    title.to_string()
}
