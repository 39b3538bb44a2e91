use std::fmt;

/// Markers that storage layers prepend to raw video ids before they reach us.
const STORAGE_PREFIXES: &[&str] = &["FILE#", "RECORD#"];

/// A normalized video identifier.
///
/// Raw ids can arrive wearing storage markers (`FILE#V2` for video `V2`).
/// Every map in the engine is keyed on the stripped form, so stripping
/// happens once, at construction; a `VideoId` built from a raw id and one
/// built from an already-normalized id compare equal.
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(from = "String")]
pub struct VideoId(String);

impl VideoId {
    pub fn new(raw: impl Into<String>) -> VideoId {
        let mut id = raw.into();
        loop {
            match STORAGE_PREFIXES.iter().find_map(|p| id.strip_prefix(p)) {
                Some(stripped) => id = stripped.to_owned(),
                None => return VideoId(id),
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VideoId {
    fn from(raw: String) -> VideoId {
        VideoId::new(raw)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_storage_prefixes() {
        assert_eq!(VideoId::new("FILE#V2"), VideoId::new("V2"));
        assert_eq!(VideoId::new("RECORD#V3").as_str(), "V3");
        assert_eq!(VideoId::new("RECORD#FILE#V4").as_str(), "V4");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["V1", "FILE#V1", "RECORD#V1", "RECORD#FILE#V1"] {
            let once = VideoId::new(raw);
            let twice = VideoId::new(once.as_str());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn prefix_must_be_leading() {
        assert_eq!(VideoId::new("V1FILE#").as_str(), "V1FILE#");
    }

    #[test]
    fn deserializes_to_normalized_form() {
        let id: VideoId = serde_json::from_str(r#""FILE#V2""#).unwrap();
        assert_eq!(id, VideoId::new("V2"));
    }
}
