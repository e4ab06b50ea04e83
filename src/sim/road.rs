//! Road surface lookup
//!
//! Purely positional: the road type repeats every `segment_length * n`
//! along the longitudinal axis. Not coupled into traction.

use serde::{Deserialize, Serialize};

use crate::settings::RoadConfig;

/// Surface type of a road stretch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Asphalt,
    Gravel,
    Dirt,
    Snow,
}

/// Color of off-road greenery
pub const GREENERY_COLOR: [u8; 3] = [0, 128, 0];

impl RoadType {
    pub const ALL: [RoadType; 4] = [RoadType::Asphalt, RoadType::Gravel, RoadType::Dirt, RoadType::Snow];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadType::Asphalt => "asphalt",
            RoadType::Gravel => "gravel",
            RoadType::Dirt => "dirt",
            RoadType::Snow => "snow",
        }
    }

    /// 0 (smooth) to 1 (very rough)
    pub fn roughness(&self) -> f64 {
        match self {
            RoadType::Asphalt => 0.1,
            RoadType::Gravel => 0.6,
            RoadType::Dirt => 0.8,
            RoadType::Snow => 0.7,
        }
    }

    /// 0 (no friction) to 1 (high friction)
    pub fn friction(&self) -> f64 {
        match self {
            RoadType::Asphalt => 0.9,
            RoadType::Gravel => 0.5,
            RoadType::Dirt => 0.4,
            RoadType::Snow => 0.3,
        }
    }

    /// Display color (RGB)
    pub fn color(&self) -> [u8; 3] {
        match self {
            RoadType::Asphalt => [50, 50, 50],
            RoadType::Gravel => [139, 69, 19],
            RoadType::Dirt => [210, 180, 140],
            RoadType::Snow => [255, 250, 250],
        }
    }
}

/// Result of a surface lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoadProperties {
    pub road_type: RoadType,
    pub roughness: f64,
    pub friction: f64,
}

#[derive(Debug, Clone)]
pub struct RoadSurfaceModel {
    segment_length: f64,
    sequence: Vec<RoadType>,
}

impl Default for RoadSurfaceModel {
    fn default() -> Self {
        Self::new(&RoadConfig::default())
    }
}

impl RoadSurfaceModel {
    /// Build from a validated config. An empty sequence falls back to asphalt.
    pub fn new(config: &RoadConfig) -> Self {
        let sequence = if config.sequence.is_empty() {
            vec![RoadType::Asphalt]
        } else {
            config.sequence.clone()
        };
        Self {
            segment_length: config.segment_length,
            sequence,
        }
    }

    pub fn segment_length(&self) -> f64 {
        self.segment_length
    }

    pub fn road_type_at(&self, position: f64) -> RoadType {
        // floor division + Euclidean remainder keeps negative positions valid
        let stretch = (position / self.segment_length).floor() as i64;
        let idx = stretch.rem_euclid(self.sequence.len() as i64) as usize;
        self.sequence[idx]
    }

    pub fn properties_at(&self, position: f64) -> RoadProperties {
        let road_type = self.road_type_at(position);
        RoadProperties {
            road_type,
            roughness: road_type.roughness(),
            friction: road_type.friction(),
        }
    }
}
