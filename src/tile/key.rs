use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a tile within the pyramid: `(level, tile_x, tile_y)`.
///
/// Keys order lexicographically by `(level, tile_x, tile_y)` and display as
/// `L{level}_X{tile_x}_Y{tile_y}`, the form used in log lines and debug
/// overlays.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TileKey {
    pub level: i32,
    pub tile_x: i32,
    pub tile_y: i32,
}

impl TileKey {
    pub fn new(level: i32, tile_x: i32, tile_y: i32) -> Self {
        Self {
            level,
            tile_x,
            tile_y,
        }
    }

    /// Mix the three components into one word with the 64-bit golden-ratio
    /// constant. Sequential tile coordinates land in distinct hash buckets.
    fn mix(&self) -> u64 {
        const GOLDEN: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut seed: u64 = 0;
        for part in [self.level, self.tile_x, self.tile_y] {
            let h = part as u32 as u64;
            seed ^= h
                .wrapping_add(GOLDEN)
                .wrapping_add(seed << 6)
                .wrapping_add(seed >> 2);
        }
        seed
    }
}

impl Hash for TileKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.mix());
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}_X{}_Y{}", self.level, self.tile_x, self.tile_y)
    }
}
