//! Wire messages for the bidirectional live session

use serde::{Deserialize, Serialize};

use crate::audio::EncodedBlob;

use super::session::{InboundEvent, LiveConfig};

/// First client message: session configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    /// Present (as `{}`) to request transcripts of the spoken reply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Empty>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

impl SetupMessage {
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            setup: Setup {
                model: config.model_path(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: config.voice.clone(),
                            },
                        },
                    },
                },
                system_instruction: Content {
                    parts: vec![TextPart {
                        text: config.system_instruction.clone(),
                    }],
                },
                output_audio_transcription: config.output_transcription.then(Empty::default),
            },
        }
    }
}

/// One captured frame sent upstream
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<InlineData>,
}

/// Base64 payload tagged with its mime type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub data: String,
    pub mime_type: String,
}

impl From<EncodedBlob> for InlineData {
    fn from(blob: EncodedBlob) -> Self {
        Self {
            data: blob.data,
            mime_type: blob.mime_type,
        }
    }
}

impl From<InlineData> for EncodedBlob {
    fn from(inline: InlineData) -> Self {
        Self {
            data: inline.data,
            mime_type: inline.mime_type,
        }
    }
}

impl RealtimeInputMessage {
    pub fn audio(blob: EncodedBlob) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media_chunks: vec![blob.into()],
            },
        }
    }
}

/// Message received from the remote session (subset consumed)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Flatten into inbound events: audio, transcript, turn end, interruption
    pub fn into_events(self) -> Vec<InboundEvent> {
        let mut events = Vec::new();

        if let Some(content) = self.server_content {
            if let Some(turn) = content.model_turn {
                events.extend(
                    turn.parts
                        .into_iter()
                        .filter_map(|part| part.inline_data)
                        .filter(|inline| inline.mime_type.starts_with("audio/"))
                        .map(|inline| InboundEvent::AudioChunk(inline.into())),
                );
            }

            if let Some(text) = content.output_transcription.and_then(|t| t.text) {
                if !text.is_empty() {
                    events.push(InboundEvent::TranscriptDelta(text));
                }
            }

            if content.turn_complete {
                events.push(InboundEvent::TurnComplete);
            }

            if content.interrupted {
                events.push(InboundEvent::Interrupted);
            }
        }

        events
    }
}
