//! Incremental scanner for tagged model replies.
//!
//! A reply is a sequence of blocks: `<artifact>…</artifact>`,
//! `<explanation>…</explanation>` and `<edit>…</edit>`. Edit blocks are
//! recognized anywhere, including inside the two channels. Fragments may split
//! any tag at any byte. Text outside blocks is dropped. Channel content is
//! delivered as soon as it can no longer be the start of a tag.

use std::fmt;
use std::io;
use std::sync::OnceLock;

use regex::Regex;

use crate::record::StreamRecord;
use crate::sink::StateSink;

const EDIT_BODY_PATTERN: &str =
    r"(?s)^\s*<textToReplace>(.*?)</textToReplace>\s*<replacement>(.*?)</replacement>\s*$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Artifact,
    Explanation,
    Edit,
}

impl Block {
    const ALL: [Block; 3] = [Block::Artifact, Block::Explanation, Block::Edit];

    pub fn name(self) -> &'static str {
        match self {
            Self::Artifact => "artifact",
            Self::Explanation => "explanation",
            Self::Edit => "edit",
        }
    }

    pub fn open_tag(self) -> &'static str {
        match self {
            Self::Artifact => "<artifact>",
            Self::Explanation => "<explanation>",
            Self::Edit => "<edit>",
        }
    }

    pub fn close_tag(self) -> &'static str {
        match self {
            Self::Artifact => "</artifact>",
            Self::Explanation => "</explanation>",
            Self::Edit => "</edit>",
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Seeking,
    Channel(Block),
    /// Collecting an edit body; `within` is the channel to resume afterwards.
    Edit { within: Option<Block> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Body did not contain `<textToReplace>` followed by `<replacement>`.
    Malformed,
    EmptyTarget,
    TargetNotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("malformed edit body"),
            Self::EmptyTarget => f.write_str("empty textToReplace"),
            Self::TargetNotFound => f.write_str("textToReplace not found in artifact"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied { replacements: usize },
    Skipped(SkipReason),
}

/// One completed `<edit>` block and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    pub text_to_replace: String,
    pub replacement: String,
    pub outcome: EditOutcome,
}

impl EditEvent {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, EditOutcome::Applied { .. })
    }
}

/// Result of feeding one fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentOutcome {
    /// Edits completed by this fragment, in closing-tag order.
    pub edits: Vec<EditEvent>,
    /// Number of records handed to the sink.
    pub emitted: usize,
}

/// Final state once the upstream source is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub message: String,
    pub artifact: String,
    /// Block still open when the stream ended. Its delivered prefix is kept.
    pub unterminated: Option<Block>,
    /// Newest artifact known to be whole. Equals `artifact` unless an artifact
    /// block was cut off, in which case it is the last complete one.
    pub complete_artifact: String,
    pub edits_applied: usize,
    pub edits_skipped: usize,
}

/// Resumable scanner state for one streaming turn.
#[derive(Debug)]
pub struct TagStreamParser {
    mode: Mode,
    state: StreamRecord,
    baseline: String,
    pending: String,
    dirty: bool,
    poisoned: bool,
    edits_applied: usize,
    edits_skipped: usize,
}

impl TagStreamParser {
    /// Starts a turn. `baseline` is the artifact that edit blocks patch.
    pub fn new(baseline: impl Into<String>) -> Self {
        Self {
            mode: Mode::Seeking,
            state: StreamRecord::default(),
            baseline: baseline.into(),
            pending: String::new(),
            dirty: false,
            poisoned: false,
            edits_applied: 0,
            edits_skipped: 0,
        }
    }

    pub fn state(&self) -> &StreamRecord {
        &self.state
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn open_block(&self) -> Option<Block> {
        match self.mode {
            Mode::Seeking => None,
            Mode::Channel(block) => Some(block),
            Mode::Edit { .. } => Some(Block::Edit),
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Consumes one fragment and pushes every resulting state change to `sink`.
    ///
    /// A sink error poisons the parser; later calls fail without reading input.
    pub fn push<S>(&mut self, fragment: &str, sink: &mut S) -> io::Result<FragmentOutcome>
    where
        S: StateSink + ?Sized,
    {
        if self.poisoned {
            return Err(io::Error::other(
                "stream parser aborted after a delivery failure",
            ));
        }

        self.pending.push_str(fragment);
        let mut outcome = FragmentOutcome::default();

        loop {
            match self.mode {
                Mode::Seeking => {
                    if !self.enter_next_block() {
                        break;
                    }
                }
                Mode::Edit { within } => {
                    let Some(event) = self.close_edit(within) else {
                        break;
                    };
                    outcome.edits.push(event);
                    if self.dirty {
                        self.deliver(sink, &mut outcome)?;
                    }
                }
                Mode::Channel(channel) => {
                    if !self.fill_channel(channel) {
                        break;
                    }
                }
            }
        }

        if self.dirty {
            self.deliver(sink, &mut outcome)?;
        }
        Ok(outcome)
    }

    /// Ends the turn. Bytes held back as a possible closing tag are dropped.
    pub fn finish(self) -> ParsedReply {
        let unterminated = self.open_block();
        if let Some(block) = unterminated {
            tracing::warn!(
                block = block.name(),
                held_back = self.pending.len(),
                "stream ended inside an unterminated block"
            );
        }
        let artifact_cut = matches!(
            self.mode,
            Mode::Channel(Block::Artifact)
                | Mode::Edit {
                    within: Some(Block::Artifact)
                }
        );
        let complete_artifact = if artifact_cut {
            self.baseline
        } else {
            self.state.artifact.clone()
        };
        ParsedReply {
            message: self.state.message,
            artifact: self.state.artifact,
            unterminated,
            complete_artifact,
            edits_applied: self.edits_applied,
            edits_skipped: self.edits_skipped,
        }
    }

    fn deliver<S>(&mut self, sink: &mut S, outcome: &mut FragmentOutcome) -> io::Result<()>
    where
        S: StateSink + ?Sized,
    {
        if let Err(error) = sink.emit(&self.state) {
            self.poisoned = true;
            return Err(error);
        }
        self.dirty = false;
        outcome.emitted += 1;
        Ok(())
    }

    /// Seeks the earliest opening tag. Returns false when more input is needed.
    fn enter_next_block(&mut self) -> bool {
        let next = Block::ALL
            .iter()
            .filter_map(|block| {
                self.pending
                    .find(block.open_tag())
                    .map(|index| (index, *block))
            })
            .min_by_key(|(index, _)| *index);

        let Some((index, block)) = next else {
            let keep = Block::ALL
                .iter()
                .map(|block| partial_suffix_len(&self.pending, block.open_tag()))
                .max()
                .unwrap_or(0);
            self.pending.drain(..self.pending.len() - keep);
            return false;
        };

        self.pending.drain(..index + block.open_tag().len());
        self.mode = match block {
            Block::Edit => Mode::Edit { within: None },
            channel => Mode::Channel(channel),
        };
        if block == Block::Artifact && !self.state.artifact.is_empty() {
            self.state.artifact.clear();
            self.dirty = true;
        }
        tracing::debug!(block = block.name(), "entered block");
        true
    }

    /// Moves safe channel content into the view. Returns true once the channel
    /// closed or an edit block opened inside it.
    fn fill_channel(&mut self, channel: Block) -> bool {
        let close = channel.close_tag();
        let edit_open = Block::Edit.open_tag();
        let closing = self
            .pending
            .find(close)
            .map(|index| (index, close.len(), Mode::Seeking));
        let editing = self.pending.find(edit_open).map(|index| {
            (
                index,
                edit_open.len(),
                Mode::Edit {
                    within: Some(channel),
                },
            )
        });
        let boundary = match (closing, editing) {
            (Some(closing), Some(editing)) if editing.0 < closing.0 => Some(editing),
            (closing, editing) => closing.or(editing),
        };

        let content_end = match boundary {
            Some((index, _, _)) => index,
            None => {
                let held = partial_suffix_len(&self.pending, close)
                    .max(partial_suffix_len(&self.pending, edit_open));
                self.pending.len() - held
            }
        };

        if content_end > 0 {
            let target = match channel {
                Block::Artifact => &mut self.state.artifact,
                _ => &mut self.state.message,
            };
            target.push_str(&self.pending[..content_end]);
            self.dirty = true;
        }

        let Some((index, tag_len, next)) = boundary else {
            self.pending.drain(..content_end);
            return false;
        };

        self.pending.drain(..index + tag_len);
        self.mode = next;
        if next == Mode::Seeking && channel == Block::Artifact {
            self.baseline.clone_from(&self.state.artifact);
        }
        true
    }

    fn close_edit(&mut self, within: Option<Block>) -> Option<EditEvent> {
        let close = Block::Edit.close_tag();
        let index = self.pending.find(close)?;
        let body: String = self.pending.drain(..index).collect();
        self.pending.drain(..close.len());
        self.mode = within.map_or(Mode::Seeking, Mode::Channel);
        Some(self.apply_edit(&body, within == Some(Block::Artifact)))
    }

    /// Applies one edit body. Inside an open artifact the edit patches the
    /// text streamed so far; elsewhere it patches the baseline, which then
    /// becomes the artifact view.
    fn apply_edit(&mut self, body: &str, in_artifact: bool) -> EditEvent {
        let Some(captures) = edit_body_regex().captures(body) else {
            self.edits_skipped += 1;
            tracing::warn!(reason = %SkipReason::Malformed, "skipping edit");
            return EditEvent {
                text_to_replace: String::new(),
                replacement: String::new(),
                outcome: EditOutcome::Skipped(SkipReason::Malformed),
            };
        };
        let text_to_replace = captures[1].to_string();
        let replacement = captures[2].to_string();

        let target = if in_artifact {
            &mut self.state.artifact
        } else {
            &mut self.baseline
        };
        let replacements = if text_to_replace.is_empty() {
            0
        } else {
            target.matches(text_to_replace.as_str()).count()
        };
        let outcome = match (text_to_replace.is_empty(), replacements) {
            (true, _) => EditOutcome::Skipped(SkipReason::EmptyTarget),
            (false, 0) => EditOutcome::Skipped(SkipReason::TargetNotFound),
            (false, replacements) => EditOutcome::Applied { replacements },
        };

        match outcome {
            EditOutcome::Applied { replacements } => {
                *target = target.replace(&text_to_replace, &replacement);
                self.dirty |= in_artifact;
                self.edits_applied += 1;
                tracing::debug!(replacements, "applied edit");
            }
            EditOutcome::Skipped(reason) => {
                self.edits_skipped += 1;
                tracing::warn!(
                    %reason,
                    target_len = text_to_replace.len(),
                    "skipping edit"
                );
            }
        }

        if !in_artifact && self.state.artifact != self.baseline {
            self.state.artifact.clone_from(&self.baseline);
            self.dirty = true;
        }

        EditEvent {
            text_to_replace,
            replacement,
            outcome,
        }
    }
}

fn edit_body_regex() -> &'static Regex {
    static EDIT_BODY: OnceLock<Regex> = OnceLock::new();
    EDIT_BODY.get_or_init(|| Regex::new(EDIT_BODY_PATTERN).expect("valid edit body regex"))
}

/// Length of the longest proper prefix of `tag` that `text` ends with.
///
/// Tags are ASCII, so the returned split point is always a char boundary.
fn partial_suffix_len(text: &str, tag: &str) -> usize {
    let max = text.len().min(tag.len() - 1);
    (1..=max)
        .rev()
        .find(|&len| text.ends_with(&tag[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        records: Vec<StreamRecord>,
    }

    impl StateSink for Recorder {
        fn emit(&mut self, record: &StreamRecord) -> io::Result<()> {
            self.records.push(record.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl StateSink for FailingSink {
        fn emit(&mut self, _record: &StreamRecord) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn feed(baseline: &str, fragments: &[&str]) -> (ParsedReply, Vec<StreamRecord>) {
        let mut parser = TagStreamParser::new(baseline);
        let mut recorder = Recorder::default();
        for fragment in fragments {
            parser.push(fragment, &mut recorder).expect("push");
        }
        (parser.finish(), recorder.records)
    }

    fn record(message: &str, artifact: &str) -> StreamRecord {
        StreamRecord {
            message: message.to_string(),
            artifact: artifact.to_string(),
        }
    }

    #[test]
    fn whole_reply_in_one_fragment() {
        let (reply, records) = feed(
            "",
            &["<artifact>Hi</artifact><explanation>Done</explanation>"],
        );

        assert_eq!(reply.artifact, "Hi");
        assert_eq!(reply.message, "Done");
        assert_eq!(reply.unterminated, None);
        assert_eq!(records, vec![record("Done", "Hi")]);
    }

    #[test]
    fn three_fragments_stream_progressively() {
        let (reply, records) = feed(
            "",
            &["<artifact>H", "i</artifact><expla", "nation>Done</explanation>"],
        );

        assert_eq!((reply.message.as_str(), reply.artifact.as_str()), ("Done", "Hi"));
        assert_eq!(
            records,
            vec![record("", "H"), record("", "Hi"), record("Done", "Hi")]
        );
    }

    #[test]
    fn text_outside_blocks_is_dropped() {
        let (reply, records) = feed(
            "",
            &["Sure thing! <explanation>ok</explanation>\n\nTrailing chatter"],
        );

        assert_eq!(reply.message, "ok");
        assert_eq!(reply.artifact, "");
        assert_eq!(records, vec![record("ok", "")]);
    }

    #[test]
    fn buffering_only_fragments_emit_nothing() {
        let mut parser = TagStreamParser::new("");
        let mut recorder = Recorder::default();

        for fragment in ["<", "arti", "fact", ">"] {
            let outcome = parser.push(fragment, &mut recorder).expect("push");
            assert_eq!(outcome.emitted, 0);
        }
        assert_eq!(parser.open_block(), Some(Block::Artifact));

        let outcome = parser.push("x</art", &mut recorder).expect("push");
        assert_eq!(outcome.emitted, 1);
        assert_eq!(recorder.records, vec![record("", "x")]);
    }

    #[test]
    fn split_closing_tag_never_leaks() {
        let tail = "</artifact>";
        for split in 0..=tail.len() {
            let (head, rest) = tail.split_at(split);
            let first = format!("<artifact>body{head}");
            let (reply, records) = feed("", &[first.as_str(), rest]);

            assert_eq!(reply.artifact, "body", "split at {split}");
            for emitted in &records {
                assert_eq!(emitted.artifact, "body", "split at {split}");
            }
        }
    }

    #[test]
    fn lone_angle_bracket_in_channel_is_delivered_once_resolved() {
        let (reply, records) = feed("", &["<artifact>a <", " b</artifact>"]);

        assert_eq!(reply.artifact, "a < b");
        assert_eq!(records, vec![record("", "a "), record("", "a < b")]);
    }

    #[test]
    fn edit_replaces_text_in_baseline() {
        let (reply, records) = feed(
            "Hello world",
            &[
                "<edit><textToReplace>world</textToReplace>",
                "<replacement>there</replacement></edit>",
                "<explanation>Swapped the greeting.</explanation>",
            ],
        );

        assert_eq!(reply.artifact, "Hello there");
        assert_eq!(reply.message, "Swapped the greeting.");
        assert_eq!(reply.edits_applied, 1);
        assert_eq!(
            records,
            vec![
                record("", "Hello there"),
                record("Swapped the greeting.", "Hello there"),
            ]
        );
    }

    #[test]
    fn edit_replaces_every_occurrence_and_tolerates_whitespace() {
        let mut parser = TagStreamParser::new("a-b-a");
        let mut recorder = Recorder::default();
        let outcome = parser
            .push(
                "<edit>\n  <textToReplace>a</textToReplace>\n  <replacement>z</replacement>\n</edit>",
                &mut recorder,
            )
            .expect("push");

        assert_eq!(
            outcome.edits,
            vec![EditEvent {
                text_to_replace: "a".to_string(),
                replacement: "z".to_string(),
                outcome: EditOutcome::Applied { replacements: 2 },
            }]
        );
        assert_eq!(parser.state().artifact, "z-b-z");
    }

    #[test]
    fn multiple_edits_apply_in_closing_order_with_one_record_each() {
        let (reply, records) = feed(
            "one two three",
            &[concat!(
                "<edit><textToReplace>one</textToReplace><replacement>1</replacement></edit>",
                "<edit><textToReplace>1 two</textToReplace><replacement>1 2</replacement></edit>",
            )],
        );

        assert_eq!(reply.artifact, "1 2 three");
        assert_eq!(
            records,
            vec![record("", "1 two three"), record("", "1 2 three")]
        );
    }

    #[test]
    fn skipped_edits_leave_the_baseline_untouched() {
        let mut parser = TagStreamParser::new("Hello world");
        let mut recorder = Recorder::default();
        let outcome = parser
            .push(
                concat!(
                    "<edit><textToReplace>moon</textToReplace><replacement>x</replacement></edit>",
                    "<edit><textToReplace></textToReplace><replacement>x</replacement></edit>",
                    "<edit>just prose</edit>",
                ),
                &mut recorder,
            )
            .expect("push");

        let reasons: Vec<EditOutcome> = outcome.edits.iter().map(|edit| edit.outcome).collect();
        assert_eq!(
            reasons,
            vec![
                EditOutcome::Skipped(SkipReason::TargetNotFound),
                EditOutcome::Skipped(SkipReason::EmptyTarget),
                EditOutcome::Skipped(SkipReason::Malformed),
            ]
        );
        assert_eq!(recorder.records, vec![record("", "Hello world")]);

        let reply = parser.finish();
        assert_eq!(reply.artifact, "Hello world");
        assert_eq!(reply.complete_artifact, "Hello world");
        assert_eq!(reply.edits_skipped, 3);
    }

    #[test]
    fn unmatched_edit_only_reply_still_carries_the_baseline() {
        let (reply, records) = feed(
            "Hello world",
            &[
                "<edit><textToReplace>moon</textToReplace><replacement>sun</replacement></edit>",
                "<explanation>Nothing to change.</explanation>",
            ],
        );

        assert_eq!(reply.artifact, "Hello world");
        assert_eq!(reply.edits_applied, 0);
        assert_eq!(
            records,
            vec![
                record("", "Hello world"),
                record("Nothing to change.", "Hello world"),
            ]
        );
    }

    #[test]
    fn edit_after_artifact_targets_the_new_artifact() {
        let (reply, _) = feed(
            "old text",
            &[
                "<artifact>fresh draft</artifact>",
                "<edit><textToReplace>draft</textToReplace><replacement>copy</replacement></edit>",
            ],
        );

        assert_eq!(reply.artifact, "fresh copy");
    }

    #[test]
    fn edit_inside_explanation_is_applied_and_kept_out_of_the_message() {
        let (reply, records) = feed(
            "Hello world",
            &[concat!(
                "<explanation>Swapped it.",
                "<edit><textToReplace>world</textToReplace><replacement>there</replacement></edit>",
                "</explanation>",
            )],
        );

        assert_eq!(reply.message, "Swapped it.");
        assert_eq!(reply.artifact, "Hello there");
        assert_eq!(reply.edits_applied, 1);
        assert_eq!(reply.unterminated, None);
        assert_eq!(records, vec![record("Swapped it.", "Hello there")]);
    }

    #[test]
    fn split_edit_tag_inside_explanation_never_reaches_the_message() {
        let text = concat!(
            "<explanation>Done. ",
            "<edit><textToReplace>a</textToReplace><replacement>b</replacement></edit>",
            " Bye</explanation>",
        );
        for split in 0..=text.len() {
            let (head, tail) = text.split_at(split);
            let (reply, records) = feed("a", &[head, tail]);

            assert_eq!(reply.message, "Done.  Bye", "split at {split}");
            assert_eq!(reply.artifact, "b", "split at {split}");
            for emitted in &records {
                assert!(!emitted.message.contains('<'), "split at {split}");
            }
        }
    }

    #[test]
    fn edit_inside_open_artifact_patches_the_streamed_text() {
        let (reply, records) = feed(
            "old doc",
            &[
                "<artifact>Title\nbody text",
                "<edit><textToReplace>body</textToReplace><replacement>main</replacement></edit>",
                "\nend</artifact>",
            ],
        );

        assert_eq!(reply.artifact, "Title\nmain text\nend");
        assert_eq!(reply.complete_artifact, reply.artifact);
        assert_eq!(
            records,
            vec![
                record("", "Title\nbody text"),
                record("", "Title\nmain text"),
                record("", "Title\nmain text\nend"),
            ]
        );
    }

    #[test]
    fn second_artifact_block_replaces_the_first() {
        let (reply, records) = feed(
            "",
            &["<artifact>v1</artifact>", "<artifact>", "v2</artifact>"],
        );

        assert_eq!(reply.artifact, "v2");
        assert_eq!(
            records,
            vec![record("", "v1"), record("", ""), record("", "v2")]
        );
    }

    #[test]
    fn unterminated_channel_keeps_delivered_prefix_and_drops_held_bytes() {
        let (reply, records) = feed("", &["<artifact>Hi", " there</arti"]);

        assert_eq!(reply.unterminated, Some(Block::Artifact));
        assert_eq!(reply.artifact, "Hi there");
        assert_eq!(reply.complete_artifact, "");
        assert_eq!(records.last(), Some(&record("", "Hi there")));
    }

    #[test]
    fn cut_off_artifact_falls_back_to_the_last_complete_one() {
        let (reply, _) = feed(
            "Hello world, this is the full doc",
            &["<explanation>Rewriting.</explanation><artifact>Hello wor"],
        );
        assert_eq!(reply.artifact, "Hello wor");
        assert_eq!(reply.complete_artifact, "Hello world, this is the full doc");

        let (reply, _) = feed(
            "",
            &["<artifact>v1</artifact><artifact>v2 <edit><textToReplace>v2"],
        );
        assert_eq!(reply.unterminated, Some(Block::Edit));
        assert_eq!(reply.complete_artifact, "v1");
    }

    #[test]
    fn unterminated_edit_is_never_applied() {
        let (reply, records) = feed(
            "Hello world",
            &["<edit><textToReplace>world</textToReplace><replacement>there"],
        );

        assert_eq!(reply.unterminated, Some(Block::Edit));
        assert_eq!(reply.artifact, "");
        assert!(records.is_empty());
    }

    #[test]
    fn sink_failure_poisons_the_parser() {
        let mut parser = TagStreamParser::new("");
        let error = parser
            .push("<explanation>hi", &mut FailingSink)
            .expect_err("sink failure");
        assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
        assert!(parser.is_poisoned());

        let mut recorder = Recorder::default();
        parser
            .push("</explanation>", &mut recorder)
            .expect_err("poisoned parser rejects input");
        assert!(recorder.records.is_empty());
    }

    #[test]
    fn multibyte_content_survives_any_split() {
        let reply = "<artifact>héllo → wörld</artifact>";
        for split in (0..=reply.len()).filter(|index| reply.is_char_boundary(*index)) {
            let (head, tail) = reply.split_at(split);
            let (parsed, _) = feed("", &[head, tail]);
            assert_eq!(parsed.artifact, "héllo → wörld");
        }
    }

    #[test]
    fn partial_suffix_len_finds_longest_proper_prefix() {
        assert_eq!(partial_suffix_len("abc</art", "</artifact>"), 5);
        assert_eq!(partial_suffix_len("abc<", "</artifact>"), 1);
        assert_eq!(partial_suffix_len("abc", "</artifact>"), 0);
        assert_eq!(partial_suffix_len("</artifact>", "</artifact>"), 0);
        assert_eq!(partial_suffix_len("", "<edit>"), 0);
    }

    fn chunk(text: &str, cuts: &[usize]) -> Vec<String> {
        let mut points: Vec<usize> = cuts
            .iter()
            .map(|cut| cut % (text.len() + 1))
            .filter(|cut| text.is_char_boundary(*cut))
            .collect();
        points.push(0);
        points.push(text.len());
        points.sort_unstable();
        points.dedup();
        points
            .windows(2)
            .map(|pair| text[pair[0]..pair[1]].to_string())
            .collect()
    }

    proptest! {
        #[test]
        fn chunk_boundaries_do_not_change_the_result(
            preamble in "[a-z />]{0,12}",
            artifact in "[a-zA-Z0-9 <>/\n]{0,40}",
            explanation in "[a-z .<]{0,20}",
            cuts in proptest::collection::vec(any::<usize>(), 0..12),
        ) {
            prop_assume!(!artifact.contains("</artifact>"));
            prop_assume!(!artifact.contains("<edit>"));
            prop_assume!(!explanation.contains("</explanation>"));

            let reply = format!(
                "{preamble}<artifact>{artifact}</artifact><explanation>{explanation}</explanation>"
            );
            let whole = {
                let (parsed, _) = feed("", &[reply.as_str()]);
                parsed
            };

            let pieces = chunk(&reply, &cuts);
            let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
            let (chunked, records) = feed("", &refs);

            let by_char: Vec<String> = reply.chars().map(String::from).collect();
            let by_char: Vec<&str> = by_char.iter().map(String::as_str).collect();
            let (single, _) = feed("", &by_char);

            prop_assert_eq!(&whole.artifact, &artifact);
            prop_assert_eq!(&chunked.artifact, &artifact);
            prop_assert_eq!(&single.artifact, &artifact);
            prop_assert_eq!(&chunked.message, &explanation);
            for emitted in &records {
                prop_assert!(artifact.starts_with(&emitted.artifact));
                prop_assert!(explanation.starts_with(&emitted.message));
            }
        }
    }
}
