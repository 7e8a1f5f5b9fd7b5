use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
}

impl MediaKind {
    /// Maps an upstream `type` field onto a kind. Unknown types yield `None`.
    pub fn from_upstream(kind: &str) -> Option<Self> {
        match kind {
            "photo" | "image" => Some(Self::Photo),
            "video" => Some(Self::Video),
            "animated_gif" | "gif" => Some(Self::AnimatedGif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Photo => "jpg",
            Self::Video | Self::AnimatedGif => "mp4",
        }
    }
}

/// One resolved, downloadable attachment of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub thumbnail: Option<String>,
}

/// Resolved media in first-seen order, unique by `url`.
pub type FetchResult = Vec<MediaItem>;

/// One encoded rendition of a video, only alive while picking the best one.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCandidate<'a> {
    pub url: &'a str,
    pub content_type: &'a str,
    pub bitrate: u64,
}

/// What the resolver endpoint and the `fetch` command hand back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPost {
    pub post_id: String,
    pub medias: FetchResult,
}
