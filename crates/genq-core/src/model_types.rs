use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generation feature a job belongs to. Each variant backs one panel and is
/// the unit of "one active job at a time".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationType {
    TextToImage,
    ImageToImage,
    TextToVideo,
    ImageToVideo,
}

impl GenerationType {
    /// Identifier used in URLs, persisted jobs and provider routes
    pub fn id(&self) -> &'static str {
        match self {
            Self::TextToImage => "text-to-image",
            Self::ImageToImage => "image-to-image",
            Self::TextToVideo => "text-to-video",
            Self::ImageToVideo => "image-to-video",
        }
    }

    /// Name for display in the dashboard
    pub fn name(&self) -> &'static str {
        match self {
            Self::TextToImage => "Text to Image",
            Self::ImageToImage => "Image to Image",
            Self::TextToVideo => "Text to Video",
            Self::ImageToVideo => "Image to Video",
        }
    }

    /// Whether a submission must carry a prompt.
    ///
    /// Image-driven features can run off the source image alone.
    pub fn requires_prompt(&self) -> bool {
        match self {
            Self::TextToImage | Self::TextToVideo => true,
            Self::ImageToImage | Self::ImageToVideo => false,
        }
    }

    /// Whether a submission must name a destination folder for the results
    pub fn requires_destination(&self) -> bool {
        true
    }

    /// Rough provider latency, used only for display hints
    pub fn estimated_time_secs(&self) -> u32 {
        match self {
            Self::TextToImage | Self::ImageToImage => 30,
            Self::TextToVideo | Self::ImageToVideo => 180,
        }
    }

    pub fn all() -> [GenerationType; 4] {
        [
            Self::TextToImage,
            Self::ImageToImage,
            Self::TextToVideo,
            Self::ImageToVideo,
        ]
    }
}

impl fmt::Display for GenerationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown generation type: {0}")]
pub struct UnknownGenerationType(pub String);

impl FromStr for GenerationType {
    type Err = UnknownGenerationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| UnknownGenerationType(s.to_string()))
    }
}
