use serde::{Deserialize, Serialize};

use crate::error::VoiceResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

/// A generated image as base64 data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// `data:` url that a UI can render directly
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Generates images from a text prompt
#[async_trait::async_trait]
pub trait ImageResponder: Send + Sync {
    /// `None` when the model returned no image
    async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> VoiceResult<Option<InlineImage>>;
}
