use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn scale(self, factor: f32) -> Vec2 {
        Vec2 {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Terrain and construction categories. The first seven come out of the
/// generator; the rest only ever appear in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    DeepWater,
    Water,
    Sand,
    Grass,
    Forest,
    Mountain,
    Snow,
    Stump,
    Floor,
    WoodWall,
    StoneWall,
}

impl TileType {
    pub fn color(self) -> u32 {
        match self {
            Self::DeepWater => 0x1e3799,
            Self::Water => 0x4a69bd,
            Self::Sand => 0xf6e58d,
            Self::Grass => 0x78e08f,
            Self::Forest => 0x079992,
            Self::Mountain => 0x60a3bc,
            Self::Snow => 0xffffff,
            Self::Stump => 0x6d8b4e,
            Self::Floor => 0x95a5a6,
            Self::WoodWall => 0x8e5b34,
            Self::StoneWall => 0x576574,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Self::DeepWater => '~',
            Self::Water => '-',
            Self::Sand => ':',
            Self::Grass => '.',
            Self::Forest => 'T',
            Self::Mountain => '^',
            Self::Snow => '*',
            Self::Stump => ',',
            Self::Floor => '_',
            Self::WoodWall => '#',
            Self::StoneWall => '%',
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::DeepWater => "deep_water",
            Self::Water => "water",
            Self::Sand => "sand",
            Self::Grass => "grass",
            Self::Forest => "forest",
            Self::Mountain => "mountain",
            Self::Snow => "snow",
            Self::Stump => "stump",
            Self::Floor => "floor",
            Self::WoodWall => "wood_wall",
            Self::StoneWall => "stone_wall",
        }
    }

    pub fn is_buildable(self) -> bool {
        matches!(self, Self::Grass | Self::Sand | Self::Stump | Self::Floor)
    }
}

impl std::fmt::Display for TileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Base terrain grid.
///
/// Tiles are stored row-major, `index = y * width + x`. Pixel space puts the
/// top-left corner of tile (x,y) at `(x * tile_size, y * tile_size)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    tile_size_px: f32,
    tiles: Vec<TileType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
}

impl Tilemap {
    pub fn new(
        width: u32,
        height: u32,
        tile_size_px: f32,
        tiles: Vec<TileType>,
    ) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            tile_size_px,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size_px(&self) -> f32 {
        self.tile_size_px
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[TileType] {
        &self.tiles
    }

    pub fn contains_index(&self, index: usize) -> bool {
        index < self.tiles.len()
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn coords_of(&self, index: usize) -> Option<(u32, u32)> {
        if !self.contains_index(index) {
            return None;
        }
        let width = self.width as usize;
        Some(((index % width) as u32, (index / width) as u32))
    }

    pub fn tile(&self, index: usize) -> Option<TileType> {
        self.tiles.get(index).copied()
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<TileType> {
        self.index_of(x, y).and_then(|index| self.tile(index))
    }

    pub fn tile_center_px(&self, index: usize) -> Option<Vec2> {
        let (x, y) = self.coords_of(index)?;
        Some(Vec2 {
            x: (x as f32 + 0.5) * self.tile_size_px,
            y: (y as f32 + 0.5) * self.tile_size_px,
        })
    }

    pub fn pixel_bounds(&self) -> Vec2 {
        Vec2 {
            x: self.width as f32 * self.tile_size_px,
            y: self.height as f32 * self.tile_size_px,
        }
    }

    pub fn clamp_to_bounds(&self, point: Vec2) -> Vec2 {
        let bounds = self.pixel_bounds();
        Vec2 {
            x: point.x.clamp(0.0, bounds.x),
            y: point.y.clamp(0.0, bounds.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tilemap(width: u32, height: u32, fill: TileType) -> Tilemap {
        Tilemap::new(width, height, 32.0, vec![fill; width as usize * height as usize])
            .expect("tilemap")
    }

    #[test]
    fn rejects_mismatched_tile_count() {
        let error = Tilemap::new(3, 2, 32.0, vec![TileType::Grass; 5]).expect_err("mismatch");
        assert_eq!(
            error,
            TilemapError::TileCountMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn index_and_coords_are_row_major_inverses() {
        let tilemap = make_tilemap(4, 3, TileType::Sand);
        assert_eq!(tilemap.index_of(1, 2), Some(9));
        assert_eq!(tilemap.coords_of(9), Some((1, 2)));
        assert_eq!(tilemap.index_of(4, 0), None);
        assert_eq!(tilemap.coords_of(12), None);
    }

    #[test]
    fn tile_center_is_half_a_tile_in() {
        let tilemap = make_tilemap(4, 3, TileType::Grass);
        let center = tilemap.tile_center_px(5).expect("center");
        assert_eq!(center, Vec2::new(48.0, 48.0));
    }

    #[test]
    fn clamp_keeps_points_inside_pixel_bounds() {
        let tilemap = make_tilemap(2, 2, TileType::Grass);
        let clamped = tilemap.clamp_to_bounds(Vec2::new(-5.0, 100.0));
        assert_eq!(clamped, Vec2::new(0.0, 64.0));
    }

    #[test]
    fn only_open_ground_is_buildable() {
        assert!(TileType::Grass.is_buildable());
        assert!(TileType::Stump.is_buildable());
        assert!(!TileType::Forest.is_buildable());
        assert!(!TileType::WoodWall.is_buildable());
        assert!(!TileType::Water.is_buildable());
    }
}
