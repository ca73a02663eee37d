use crate::config::{AfterlifeSettings, GeneratorKind};
use std::collections::BTreeMap;

pub const CHUNK_SIZE: i32 = 16;

/// Widest platform that still fits inside the spawn chunk around x/z = 8.
pub const MAX_PLATFORM_SIZE: i32 = 15;

/// Terrain profile of the holding world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    /// Leave generation to the host.
    Default,
    /// Empty world with a square stone platform in the spawn chunk.
    Void { platform_y: i32, platform_size: i32 },
    /// Circular island centered on the origin.
    Island { radius: i32, height: i32 },
}

impl GeneratorMode {
    pub fn from_settings(settings: &AfterlifeSettings) -> Self {
        match settings.generator {
            GeneratorKind::Default => GeneratorMode::Default,
            GeneratorKind::Void => GeneratorMode::Void {
                platform_y: settings.void_platform.platform_y,
                platform_size: settings.void_platform.platform_size.clamp(3, MAX_PLATFORM_SIZE),
            },
            GeneratorKind::Island => GeneratorMode::Island {
                radius: settings.island.radius.max(8),
                height: settings.island.height,
            },
        }
    }

    pub fn is_custom(&self) -> bool {
        !matches!(self, GeneratorMode::Default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Stone,
    Dirt,
    GrassBlock,
}

/// Blocks placed in one chunk, keyed by chunk-local `(x, y, z)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkData {
    blocks: BTreeMap<(i32, i32, i32), Block>,
}

impl ChunkData {
    fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) {
        if y >= 0 {
            self.blocks.insert((x, y, z), block);
        }
    }

    pub fn block(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        self.blocks.get(&(x, y, z)).copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32, i32), Block)> + '_ {
        self.blocks.iter().map(|(pos, block)| (*pos, *block))
    }
}

/// Deterministic chunk contents for `mode` at chunk coordinates `(cx, cz)`.
pub fn generate_chunk(mode: GeneratorMode, cx: i32, cz: i32) -> ChunkData {
    let mut data = ChunkData::default();

    match mode {
        GeneratorMode::Default => {}
        GeneratorMode::Void {
            platform_y,
            platform_size,
        } => {
            if cx == 0 && cz == 0 {
                let half = platform_size.clamp(3, MAX_PLATFORM_SIZE) / 2;
                for x in 8 - half..=8 + half {
                    for z in 8 - half..=8 + half {
                        data.set_block(x, platform_y, z, Block::Stone);
                    }
                }
            }
        }
        GeneratorMode::Island { radius, height } => {
            let radius = f64::from(radius.max(8));
            let start_x = cx * CHUNK_SIZE;
            let start_z = cz * CHUNK_SIZE;
            for x in 0..CHUNK_SIZE {
                for z in 0..CHUNK_SIZE {
                    let wx = f64::from(start_x + x);
                    let wz = f64::from(start_z + z);
                    if (wx * wx + wz * wz).sqrt() > radius {
                        continue;
                    }
                    data.set_block(x, height, z, Block::GrassBlock);
                    data.set_block(x, height - 1, z, Block::Dirt);
                    data.set_block(x, height - 2, z, Block::Dirt);
                    for y in 0..height - 2 {
                        data.set_block(x, y, z, Block::Stone);
                    }
                }
            }
        }
    }

    data
}
