use std::collections::BTreeMap;

use super::tiles::{TileType, Tilemap};

/// Sparse tile overrides layered over the immutable base grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileOverlay {
    tiles: BTreeMap<usize, TileType>,
}

impl TileOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous override, if any.
    pub fn set(&mut self, index: usize, tile: TileType) -> Option<TileType> {
        self.tiles.insert(index, tile)
    }

    pub fn get(&self, index: usize) -> Option<TileType> {
        self.tiles.get(&index).copied()
    }

    pub fn effective(&self, base: &Tilemap, index: usize) -> Option<TileType> {
        self.get(index).or_else(|| base.tile(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, TileType)> + '_ {
        self.tiles.iter().map(|(index, tile)| (*index, *tile))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl FromIterator<(usize, TileType)> for TileOverlay {
    fn from_iter<I: IntoIterator<Item = (usize, TileType)>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().collect(),
        }
    }
}
