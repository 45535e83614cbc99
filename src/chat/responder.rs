use std::fmt;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::citations::{Citation, CitationSet};
use super::prompts::{DEEP_RESEARCH_INSTRUCTION, PRODUCT_COMPARISON_INSTRUCTION, SYSTEM_INSTRUCTION};
use crate::error::VoiceResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    /// Base64 attachment such as an image or document
    InlineData { mime_type: String, data: String },
}

/// One turn of a text conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ChatTurn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// Per-request reply modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderOptions {
    pub deep_search: bool,
    pub compare_mode: bool,
}

impl ResponderOptions {
    /// Both modes need live web results
    pub fn uses_search_grounding(&self) -> bool {
        self.deep_search || self.compare_mode
    }
}

/// System instruction for a text reply with the given modes
pub fn compose_instruction(options: &ResponderOptions) -> String {
    let mut instruction = SYSTEM_INSTRUCTION.to_string();
    if options.deep_search {
        instruction.push_str("\n\n");
        instruction.push_str(DEEP_RESEARCH_INSTRUCTION);
    }
    if options.compare_mode {
        instruction.push_str("\n\n");
        instruction.push_str(PRODUCT_COMPARISON_INSTRUCTION);
    }
    instruction
}

/// A streamed piece of a text reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseChunk {
    pub text: String,
    pub citations: Vec<Citation>,
}

pub type ResponseStream = Pin<Box<dyn Stream<Item = VoiceResult<ResponseChunk>> + Send>>;

/// Produces streamed text replies for a conversation
#[async_trait::async_trait]
pub trait CognitiveResponder: Send + Sync {
    async fn respond(&self, history: &[ChatTurn], options: ResponderOptions) -> VoiceResult<ResponseStream>;
}

/// A fully collected reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub text: String,
    pub citations: Vec<Citation>,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Drain a reply stream, concatenating text and deduplicating sources
pub async fn collect_reply(mut stream: ResponseStream) -> VoiceResult<Reply> {
    let mut text = String::new();
    let mut citations = CitationSet::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        text.push_str(&chunk.text);
        citations.extend(chunk.citations);
    }

    Ok(Reply {
        text,
        citations: citations.into_vec(),
    })
}
