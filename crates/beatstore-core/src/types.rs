//! Common types for the beatstore client
//!
//! Catalog records as served by the REST backend, the licensing tiers a beat
//! can be bought under, and the identifiers shared by the playback and
//! waveform subsystems.

use serde::{Deserialize, Serialize};

/// Default length of a derived preview snippet in seconds
pub const SNIPPET_SECONDS: f64 = 30.0;

/// Default cadence of transport position updates in milliseconds
pub const PROGRESS_TICK_MS: u64 = 100;

/// Catalog identifier of a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeatId(pub i64);

impl std::fmt::Display for BeatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Licensing tier a beat can be purchased under
///
/// Higher tiers bundle every format of the tiers below them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Mp3,
    Wav,
    Stems,
}

impl Tier {
    /// All tiers, cheapest first
    pub const ALL: [Tier; 3] = [Tier::Mp3, Tier::Wav, Tier::Stems];

    /// Wire name used in query strings and request bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Mp3 => "mp3",
            Tier::Wav => "wav",
            Tier::Stems => "stems",
        }
    }

    /// Parse a wire name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(Tier::Mp3),
            "wav" => Some(Tier::Wav),
            "stems" => Some(Tier::Stems),
            _ => None,
        }
    }

    /// License name shown to buyers
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Mp3 => "Starter",
            Tier::Wav => "Pro",
            Tier::Stems => "Elite",
        }
    }

    /// File formats delivered with this license
    pub fn bundled_formats(&self) -> &'static [&'static str] {
        match self {
            Tier::Mp3 => &["mp3"],
            Tier::Wav => &["mp3", "wav"],
            Tier::Stems => &["mp3", "wav", "stems"],
        }
    }

    /// Extension of the file served by the download endpoint
    pub fn file_extension(&self) -> &'static str {
        match self {
            Tier::Mp3 => "mp3",
            Tier::Wav => "wav",
            Tier::Stems => "zip",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A beat record from the catalog endpoint
///
/// Prices arrive as decimal strings (`"29.99"`); the per-tier file fields are
/// only populated when that tier is on offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub id: BeatId,
    pub name: String,
    pub genre: String,
    pub bpm: u32,
    pub scale: String,
    #[serde(default)]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub snippet_mp3: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub mp3_file: Option<String>,
    #[serde(default)]
    pub mp3_price: Option<String>,
    #[serde(default)]
    pub wav_file: Option<String>,
    #[serde(default)]
    pub wav_price: Option<String>,
    #[serde(default)]
    pub stems_file: Option<String>,
    #[serde(default)]
    pub stems_price: Option<String>,
}

impl Beat {
    /// Full-length audio the client derives its preview from
    ///
    /// Prefers the mp3 deliverable and falls back to the server-side snippet.
    pub fn preview_source(&self) -> Option<&str> {
        let present = |url: &&str| !url.is_empty();
        self.mp3_file
            .as_deref()
            .filter(present)
            .or_else(|| self.snippet_mp3.as_deref().filter(present))
    }

    /// Whether a file is available for the tier
    pub fn offers(&self, tier: Tier) -> bool {
        let file = match tier {
            Tier::Mp3 => &self.mp3_file,
            Tier::Wav => &self.wav_file,
            Tier::Stems => &self.stems_file,
        };
        file.as_deref().is_some_and(|f| !f.is_empty())
    }

    /// Price of the tier, if set and parseable
    pub fn price_for(&self, tier: Tier) -> Option<f64> {
        let price = match tier {
            Tier::Mp3 => &self.mp3_price,
            Tier::Wav => &self.wav_price,
            Tier::Stems => &self.stems_price,
        };
        price.as_deref().and_then(|p| p.trim().parse().ok())
    }

    /// File name used when saving a purchased download
    pub fn download_file_name(&self, tier: Tier) -> String {
        format!("{}_{}.{}", self.name, tier.as_str(), tier.file_extension())
    }

    /// One-line summary for listings: `Name (Genre, 140 BPM, A minor)`
    pub fn summary(&self) -> String {
        format!("{} ({}, {} BPM, {})", self.name, self.genre, self.bpm, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat_json() -> &'static str {
        r#"{
            "id": 7,
            "name": "Night Drive",
            "genre": "Trap",
            "bpm": 140,
            "scale": "A minor",
            "cover_art": "http://cdn/covers/7.png",
            "snippet_mp3": "http://cdn/snippets/7.mp3",
            "mp3_file": "http://cdn/mp3/7.mp3",
            "mp3_price": "19.99",
            "wav_file": null,
            "wav_price": null,
            "stems_file": "http://cdn/stems/7.zip",
            "stems_price": "99.00",
            "price": "19.99"
        }"#
    }

    #[test]
    fn test_beat_deserializes_from_catalog_json() {
        let beat: Beat = serde_json::from_str(beat_json()).unwrap();
        assert_eq!(beat.id, BeatId(7));
        assert_eq!(beat.bpm, 140);
        assert!(beat.offers(Tier::Mp3));
        assert!(!beat.offers(Tier::Wav));
        assert!(beat.offers(Tier::Stems));
        assert_eq!(beat.price_for(Tier::Stems), Some(99.0));
        assert_eq!(beat.price_for(Tier::Wav), None);
    }

    #[test]
    fn test_preview_source_prefers_full_mp3() {
        let mut beat: Beat = serde_json::from_str(beat_json()).unwrap();
        assert_eq!(beat.preview_source(), Some("http://cdn/mp3/7.mp3"));

        beat.mp3_file = None;
        assert_eq!(beat.preview_source(), Some("http://cdn/snippets/7.mp3"));

        beat.snippet_mp3 = Some(String::new());
        assert_eq!(beat.preview_source(), None);
    }

    #[test]
    fn test_preview_source_skips_empty_mp3() {
        let mut beat: Beat = serde_json::from_str(beat_json()).unwrap();
        beat.mp3_file = Some(String::new());
        assert_eq!(beat.preview_source(), Some("http://cdn/snippets/7.mp3"));
    }

    #[test]
    fn test_tier_wire_names_and_bundles() {
        assert_eq!(Tier::parse("WAV"), Some(Tier::Wav));
        assert_eq!(Tier::parse("flac"), None);
        assert_eq!(serde_json::to_string(&Tier::Stems).unwrap(), "\"stems\"");
        assert!(Tier::Stems.bundled_formats().contains(&"wav"));
        assert_eq!(Tier::Mp3.bundled_formats(), &["mp3"]);
        assert_eq!(Tier::Wav.label(), "Pro");
    }

    #[test]
    fn test_download_file_name() {
        let beat: Beat = serde_json::from_str(beat_json()).unwrap();
        assert_eq!(beat.download_file_name(Tier::Stems), "Night Drive_stems.zip");
    }
}
