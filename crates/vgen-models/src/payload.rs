//! Task-creation payload sent to the content generation endpoint.

use serde::{Deserialize, Serialize};

use crate::{AspectRatio, FrameRole, Resolution};

/// JSON body of a task-creation call.
///
/// `ratio` and `seed` are omitted from the serialized form when unset; some
/// server versions reject unexpected keys, so an absent key is not the same
/// as `null` here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPayload {
    /// Model name or endpoint id
    pub model: String,
    /// Prompt text followed by reference images
    pub content: Vec<ContentItem>,
    pub resolution: Resolution,
    /// Duration in seconds
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

/// One entry of the `content` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
        role: FrameRole,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>, role: FrameRole) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Remote URL or `data:` URL
    pub url: String,
}

impl GenerationPayload {
    /// Number of image entries in the content list.
    pub fn image_count(&self) -> usize {
        self.content
            .iter()
            .filter(|item| matches!(item, ContentItem::ImageUrl { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_omits_unset_ratio_and_seed() {
        let payload = GenerationPayload {
            model: "doubao-seedance-1-5-pro-251215".into(),
            content: vec![
                ContentItem::text("a cat"),
                ContentItem::image("data:image/jpeg;base64,AAAA", FrameRole::First),
            ],
            resolution: Resolution::P720,
            duration: 5,
            ratio: None,
            seed: None,
        };

        let value = serde_json::to_value(&payload).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("ratio"));
        assert!(!object.contains_key("seed"));
        assert_eq!(payload.image_count(), 1);
        assert_eq!(
            value["content"],
            json!([
                {"type": "text", "text": "a cat"},
                {
                    "type": "image_url",
                    "image_url": {"url": "data:image/jpeg;base64,AAAA"},
                    "role": "first_frame"
                }
            ])
        );
    }

    #[test]
    fn test_payload_includes_ratio_and_seed() {
        let payload = GenerationPayload {
            model: "m".into(),
            content: vec![ContentItem::text("p")],
            resolution: Resolution::P1080,
            duration: 8,
            ratio: Some(AspectRatio::PORTRAIT),
            seed: Some(42),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["ratio"], "9:16");
        assert_eq!(value["seed"], 42);
        assert_eq!(value["resolution"], "1080p");
        assert_eq!(value["duration"], 8);
    }
}
