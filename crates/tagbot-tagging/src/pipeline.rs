//! Request pipeline for tag messages.
//!
//! A tag message passes through an ordered list of [`Stage`]s. Each stage
//! either fills in part of the [`TagContext`] or halts the request. The
//! stages are composed once at startup.

use std::sync::Arc;

use tracing::debug;

use tagbot_query::{ParseResult, QueryParser};
use tagbot_types::{Field, MediaFile, MediaKind};

/// An incoming message that may be a tag edit.
#[derive(Debug, Clone)]
pub struct TagRequest {
    pub owner: i64,
    pub text: String,
    /// Media the message replies to
    pub reply: Option<MediaFile>,
}

/// Why a request stopped before reaching the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Not meant for the tagger; say nothing
    Ignore,
    /// Tell the user why
    Reject(String),
}

/// State accumulated while a request moves through the stages.
#[derive(Debug, Clone)]
pub struct TagContext {
    pub request: TagRequest,
    pub kind: Option<MediaKind>,
    pub parsed: Option<ParseResult>,
}

/// A request that passed every stage.
#[derive(Debug, Clone)]
pub struct PreparedTag {
    pub owner: i64,
    pub media: MediaFile,
    pub kind: MediaKind,
    pub parsed: ParseResult,
}

impl TagContext {
    pub fn new(request: TagRequest) -> Self {
        Self {
            request,
            kind: None,
            parsed: None,
        }
    }

    /// None if a stage that fills the context was skipped.
    pub fn into_prepared(self) -> Option<PreparedTag> {
        Some(PreparedTag {
            owner: self.request.owner,
            media: self.request.reply?,
            kind: self.kind?,
            parsed: self.parsed?,
        })
    }
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, ctx: &mut TagContext) -> Result<(), Halt>;
}

/// Messages starting with `/` or `.` are commands, not tag edits.
pub struct IgnoreCommands;

impl Stage for IgnoreCommands {
    fn name(&self) -> &'static str {
        "ignore_commands"
    }

    fn apply(&self, ctx: &mut TagContext) -> Result<(), Halt> {
        if ctx.request.text.starts_with(['/', '.']) {
            return Err(Halt::Ignore);
        }
        Ok(())
    }
}

pub struct RequireReplyMedia;

impl Stage for RequireReplyMedia {
    fn name(&self) -> &'static str {
        "require_reply_media"
    }

    fn apply(&self, ctx: &mut TagContext) -> Result<(), Halt> {
        match &ctx.request.reply {
            Some(_) => Ok(()),
            None => Err(Halt::Ignore),
        }
    }
}

pub struct RequireKnownKind;

impl Stage for RequireKnownKind {
    fn name(&self) -> &'static str {
        "require_known_kind"
    }

    fn apply(&self, ctx: &mut TagContext) -> Result<(), Halt> {
        let kind = ctx.request.reply.as_ref().and_then(MediaFile::kind);
        match kind {
            Some(kind) => {
                ctx.kind = Some(kind);
                Ok(())
            }
            None => Err(Halt::Reject(
                "I don't know how to handle that media type yet!".to_string(),
            )),
        }
    }
}

/// Parses the message text as a tag edit; an edit with no predicates is ignored.
pub struct ParseTags {
    parser: Arc<QueryParser>,
}

impl ParseTags {
    pub fn new(parser: Arc<QueryParser>) -> Self {
        Self { parser }
    }
}

impl Stage for ParseTags {
    fn name(&self) -> &'static str {
        "parse_tags"
    }

    fn apply(&self, ctx: &mut TagContext) -> Result<(), Halt> {
        let parsed = self.parser.parse_tags(&ctx.request.text);
        if parsed.query.is_empty() {
            return Err(Halt::Ignore);
        }
        ctx.parsed = Some(parsed);
        Ok(())
    }
}

/// Rejects an edit adding a tag longer than the limit, before any lookup.
pub struct ValidateTagLength {
    max: usize,
}

impl ValidateTagLength {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Stage for ValidateTagLength {
    fn name(&self) -> &'static str {
        "validate_tag_length"
    }

    fn apply(&self, ctx: &mut TagContext) -> Result<(), Halt> {
        let Some(parsed) = &ctx.parsed else {
            return Ok(());
        };
        let too_long = parsed
            .query
            .values(Field::Tags, false)
            .iter()
            .any(|tag| tag.chars().count() > self.max);
        if too_long {
            return Err(Halt::Reject(format!(
                "Tags are limited to a length of {}!",
                self.max
            )));
        }
        Ok(())
    }
}

/// Ordered stages, run first to last.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tag message pipeline used by the service.
    pub fn standard(parser: Arc<QueryParser>) -> Self {
        let max_tag_length = parser.max_tag_length();
        Self::new()
            .with_stage(IgnoreCommands)
            .with_stage(RequireReplyMedia)
            .with_stage(RequireKnownKind)
            .with_stage(ParseTags::new(parser))
            .with_stage(ValidateTagLength::new(max_tag_length))
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(&self, request: TagRequest) -> Result<TagContext, Halt> {
        let mut ctx = TagContext::new(request);
        for stage in &self.stages {
            if let Err(halt) = stage.apply(&mut ctx) {
                debug!(stage = stage.name(), ?halt, owner = ctx.request.owner, "Pipeline halted");
                return Err(halt);
            }
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagbot_query::FieldTable;
    use tagbot_types::{Field, MediaShape, TagLimits};

    fn pipeline() -> Pipeline {
        let parser = QueryParser::new(FieldTable::default(), &TagLimits::default());
        Pipeline::standard(Arc::new(parser))
    }

    fn request(text: &str, reply: Option<MediaFile>) -> TagRequest {
        TagRequest {
            owner: 1,
            text: text.to_string(),
            reply,
        }
    }

    fn photo() -> MediaFile {
        MediaFile::new(5, 6, MediaShape::Photo)
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(
            pipeline().stage_names(),
            vec![
                "ignore_commands",
                "require_reply_media",
                "require_known_kind",
                "parse_tags",
                "validate_tag_length"
            ]
        );
    }

    #[test]
    fn test_commands_are_ignored() {
        let p = pipeline();
        assert_eq!(p.run(request("/tags", Some(photo()))).unwrap_err(), Halt::Ignore);
        assert_eq!(p.run(request(".x", Some(photo()))).unwrap_err(), Halt::Ignore);
    }

    #[test]
    fn test_reply_required() {
        assert_eq!(pipeline().run(request("cat", None)).unwrap_err(), Halt::Ignore);
    }

    #[test]
    fn test_unknown_media_is_rejected() {
        let poll = MediaFile::new(5, 6, MediaShape::Unsupported);
        match pipeline().run(request("cat", Some(poll))).unwrap_err() {
            Halt::Reject(message) => assert!(message.contains("media type")),
            Halt::Ignore => panic!("expected a rejection"),
        }
    }

    #[test]
    fn test_empty_edit_is_ignored() {
        assert_eq!(
            pipeline().run(request("   ", Some(photo()))).unwrap_err(),
            Halt::Ignore
        );
    }

    #[test]
    fn test_long_tag_is_rejected() {
        let long = "x".repeat(33);
        match pipeline().run(request(&format!("cat {}", long), Some(photo()))).unwrap_err() {
            Halt::Reject(message) => assert_eq!(message, "Tags are limited to a length of 32!"),
            Halt::Ignore => panic!("expected a rejection"),
        }

        // removing an over-long tag is harmless
        let ctx = pipeline().run(request(&format!("-{}", long), Some(photo()))).unwrap();
        assert!(ctx.into_prepared().is_some());
        assert!(pipeline().run(request(&"y".repeat(32), Some(photo()))).is_ok());
    }

    #[test]
    fn test_prepared_request() {
        let ctx = pipeline().run(request("cat -dog", Some(photo()))).unwrap();
        let prepared = ctx.into_prepared().unwrap();
        assert_eq!(prepared.kind, MediaKind::Photo);
        assert_eq!(prepared.media.id, 5);
        assert_eq!(prepared.parsed.query.values(Field::Tags, false), ["cat"]);
        assert_eq!(prepared.parsed.query.values(Field::Tags, true), ["dog"]);
    }
}
