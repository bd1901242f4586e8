use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A `[longitude, latitude]` pair, the order every routing service expects.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq)]
#[serde(transparent)]
pub struct Coordinate([f64; 2]);

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self([lon, lat])
    }

    pub fn lon(&self) -> f64 {
        self.0[0]
    }

    pub fn lat(&self) -> f64 {
        self.0[1]
    }
}

impl From<&Coordinate> for geo_types::Point {
    fn from(coordinate: &Coordinate) -> Self {
        geo_types::Point::new(coordinate.lon(), coordinate.lat())
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(value: [f64; 2]) -> Self {
        Self(value)
    }
}

impl std::hash::Hash for Coordinate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.lon().to_bits());
        state.write_u64(self.lat().to_bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_lon_lat_array() {
        let coordinate = Coordinate::new(13.388860, 52.517037);
        let json = serde_json::to_string(&coordinate).unwrap();
        assert_eq!(json, "[13.38886,52.517037]");

        let parsed: Coordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, coordinate);
    }

    #[test]
    fn test_into_point() {
        let coordinate = Coordinate::new(4.35, 50.85);
        let point: geo_types::Point = (&coordinate).into();
        assert_eq!(point.x(), 4.35);
        assert_eq!(point.y(), 50.85);
    }
}
