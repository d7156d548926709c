use noise::{NoiseFn, OpenSimplex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tiles::{TileType, Tilemap, Vec2};
use super::WorldConfig;

/// Elevation thresholds, ascending. A sample below `ELEVATION_BANDS[i].0`
/// (and not below any earlier bound) classifies as `ELEVATION_BANDS[i].1`;
/// anything at or above the last bound is snow.
pub const ELEVATION_BANDS: [(f64, TileType); 6] = [
    (-0.6, TileType::DeepWater),
    (-0.2, TileType::Water),
    (-0.1, TileType::Sand),
    (0.3, TileType::Grass),
    (0.6, TileType::Forest),
    (0.8, TileType::Mountain),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldSeed(pub f64);

impl WorldSeed {
    /// Folds the seed's bit pattern into the 32-bit seed the noise source takes.
    pub fn noise_seed(self) -> u32 {
        let bits = self.0.to_bits();
        (bits ^ (bits >> 32)) as u32
    }

    pub fn rng_seed(self) -> u64 {
        self.0.to_bits().rotate_left(17) ^ 0x9e37_79b9_7f4a_7c15
    }
}

impl std::fmt::Display for WorldSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTerrain {
    pub tilemap: Tilemap,
    pub spawn_point: Vec2,
}

pub fn classify_elevation(elevation: f64) -> TileType {
    ELEVATION_BANDS
        .iter()
        .find(|(upper, _)| elevation < *upper)
        .map(|(_, tile)| *tile)
        .unwrap_or(TileType::Snow)
}

pub struct ElevationField {
    noise: OpenSimplex,
    divisor: f64,
}

impl ElevationField {
    pub fn new(seed: WorldSeed, divisor: f64) -> Self {
        Self {
            noise: OpenSimplex::new(seed.noise_seed()),
            divisor,
        }
    }

    pub fn sample(&self, x: u32, y: u32) -> f64 {
        let raw = self
            .noise
            .get([x as f64 / self.divisor, y as f64 / self.divisor]);
        raw.clamp(-1.0, 1.0)
    }
}

pub fn generate(config: &WorldConfig, seed: WorldSeed) -> GeneratedTerrain {
    let field = ElevationField::new(seed, config.noise_divisor);
    let mut tiles = Vec::with_capacity(config.tile_count());
    let mut spawn_point = None;

    for y in 0..config.height {
        for x in 0..config.width {
            let tile = classify_elevation(field.sample(x, y));
            if tile == TileType::Grass && spawn_point.is_none() {
                spawn_point = Some(Vec2 {
                    x: x as f32 * config.tile_size_px,
                    y: y as f32 * config.tile_size_px,
                });
            }
            tiles.push(tile);
        }
    }

    let tilemap = Tilemap::new(config.width, config.height, config.tile_size_px, tiles)
        .expect("generator fills exactly width*height tiles");
    let spawn_point = spawn_point.unwrap_or(Vec2::ZERO);
    debug!(
        %seed,
        width = config.width,
        height = config.height,
        spawn_x = spawn_point.x,
        spawn_y = spawn_point.y,
        "terrain_generated"
    );

    GeneratedTerrain {
        tilemap,
        spawn_point,
    }
}
