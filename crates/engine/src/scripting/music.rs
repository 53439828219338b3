use rhai::Map;

use crate::entity::ZoneId;

pub const DEFAULT_MUSIC_VOLUME: u8 = 100;
pub const DEFAULT_MUSIC_X: i64 = 1;
pub const DEFAULT_MUSIC_Y: i64 = 1;
pub const DEFAULT_MUSIC_RADIUS: i64 = 10_000;

/// Positional background music attached to a zone; `name` has no file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundMusicSource {
    pub zone: ZoneId,
    pub name: String,
    pub volume: u8,
    pub x: i64,
    pub y: i64,
    pub radius: i64,
}

impl BackgroundMusicSource {
    pub fn new(zone: ZoneId, name: impl Into<String>) -> Self {
        Self {
            zone,
            name: name.into(),
            volume: DEFAULT_MUSIC_VOLUME,
            x: DEFAULT_MUSIC_X,
            y: DEFAULT_MUSIC_Y,
            radius: DEFAULT_MUSIC_RADIUS,
        }
    }

    /// Applies `volume`, `x`, `y` and `radius` from a script map. Returns the keys
    /// that were ignored, either unknown or not an integer.
    pub fn apply_options(&mut self, options: &Map) -> Vec<String> {
        let mut ignored = Vec::new();
        for (key, value) in options {
            let Ok(number) = value.as_int() else {
                ignored.push(key.to_string());
                continue;
            };
            match key.as_str() {
                "volume" => self.volume = number.clamp(0, 100) as u8,
                "x" => self.x = number,
                "y" => self.y = number,
                "radius" => self.radius = number.max(0),
                _ => ignored.push(key.to_string()),
            }
        }
        ignored
    }
}

#[cfg(test)]
mod tests {
    use rhai::Dynamic;

    use super::*;

    #[test]
    fn defaults_apply_when_no_options_given() {
        let source = BackgroundMusicSource::new(ZoneId::new("atlantis"), "harbor");
        assert_eq!(source.volume, 100);
        assert_eq!((source.x, source.y), (1, 1));
        assert_eq!(source.radius, 10_000);
    }

    #[test]
    fn unknown_and_non_integer_keys_are_ignored() {
        let mut options = Map::new();
        options.insert("volume".into(), Dynamic::from(140_i64));
        options.insert("radius".into(), Dynamic::from(250_i64));
        options.insert("tempo".into(), Dynamic::from(3_i64));
        options.insert("x".into(), Dynamic::from("left".to_string()));

        let mut source = BackgroundMusicSource::new(ZoneId::new("atlantis"), "harbor");
        let mut ignored = source.apply_options(&options);
        ignored.sort();

        assert_eq!(ignored, vec!["tempo".to_string(), "x".to_string()]);
        assert_eq!(source.volume, 100);
        assert_eq!(source.radius, 250);
        assert_eq!(source.x, 1);
    }
}
