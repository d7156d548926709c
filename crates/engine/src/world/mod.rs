mod overlay;
mod terrain;
mod tiles;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use overlay::TileOverlay;
pub use terrain::{
    classify_elevation, generate, ElevationField, GeneratedTerrain, WorldSeed, ELEVATION_BANDS,
};
pub use tiles::{TileType, Tilemap, TilemapError, Vec2};

pub const DEFAULT_MAP_WIDTH: u32 = 60;
pub const DEFAULT_MAP_HEIGHT: u32 = 45;
pub const DEFAULT_TILE_SIZE_PX: f32 = 32.0;
pub const DEFAULT_NOISE_DIVISOR: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    pub tile_size_px: f32,
    /// Larger values give broader terrain features.
    pub noise_divisor: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_MAP_WIDTH,
            height: DEFAULT_MAP_HEIGHT,
            tile_size_px: DEFAULT_TILE_SIZE_PX,
            noise_divisor: DEFAULT_NOISE_DIVISOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("world dimensions must be non-zero, got {width}x{height}")]
    EmptyWorld { width: u32, height: u32 },
    #[error("tile size must be a positive finite number, got {0}")]
    InvalidTileSize(f32),
    #[error("noise divisor must be a positive finite number, got {0}")]
    InvalidNoiseDivisor(f64),
    #[error("seed must be a finite number, got {0}")]
    InvalidSeed(f64),
    #[error("tuning value {field} must be {expected}, got {value}")]
    InvalidTuning {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}

impl WorldConfig {
    pub fn tile_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyWorld {
                width: self.width,
                height: self.height,
            });
        }
        if !self.tile_size_px.is_finite() || self.tile_size_px <= 0.0 {
            return Err(ConfigError::InvalidTileSize(self.tile_size_px));
        }
        if !self.noise_divisor.is_finite() || self.noise_divisor <= 0.0 {
            return Err(ConfigError::InvalidNoiseDivisor(self.noise_divisor));
        }
        Ok(())
    }
}
