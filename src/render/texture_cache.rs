//! GPU-texture cache keyed by tile identity.
//!
//! Decoded tiles live in the CPU-side [`TileCache`]; this cache holds the
//! textures uploaded from them so a tile is uploaded at most once. Pruning
//! against the tile cache keeps GPU memory bounded to the CPU working set.

use std::collections::HashMap;

use crate::tile::{TileCache, TileData, TileKey};

use super::{Renderer, TextureHandle};

/// Cache of `TileKey -> TextureHandle`.
pub struct TextureCache {
    textures: HashMap<TileKey, TextureHandle>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
        }
    }

    /// Return the texture for `key`, uploading `data` if none exists yet.
    pub fn get_or_create(
        &mut self,
        key: TileKey,
        data: &TileData,
        renderer: &mut dyn Renderer,
    ) -> Option<TextureHandle> {
        if let Some(&texture) = self.textures.get(&key) {
            return Some(texture);
        }

        let texture =
            renderer.create_texture(data.width() as u32, data.height() as u32, data.pixels())?;
        self.textures.insert(key, texture);
        Some(texture)
    }

    /// Destroy textures whose tiles are no longer resident in `tiles`.
    pub fn prune(&mut self, tiles: &TileCache, renderer: &mut dyn Renderer) {
        self.textures.retain(|key, texture| {
            if tiles.has(key) {
                true
            } else {
                renderer.destroy_texture(*texture);
                false
            }
        });
    }

    /// Destroy every texture.
    pub fn clear(&mut self, renderer: &mut dyn Renderer) {
        for (_, texture) in self.textures.drain() {
            renderer.destroy_texture(texture);
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}
