//! Text and image collaborators
//!
//! Only the local contract lives here: conversation types, instruction
//! composition, citation handling and the responder traits.

mod citations;
mod image;
pub mod prompts;
mod responder;

pub use citations::{Citation, CitationSet};
pub use image::{AspectRatio, ImageResponder, InlineImage};
pub use responder::{
    collect_reply, compose_instruction, ChatTurn, CognitiveResponder, Part, Reply, ResponderOptions,
    ResponseChunk, ResponseStream, Role,
};
