use crate::header::PageDims;

/// Mip level dimension chain plus the boundary between individually paged
/// levels and the packed mip tail. Derived deterministically from the
/// texture dimensions and the page dimensions; both the encoder and the
/// runtime metadata rebuild the same values from the header.
#[derive(Clone, Debug)]
pub struct MipInfo {
    pub level_dims: Vec<glam::UVec3>,
    pub mip_level_count: u32,
    pub mip_tail_start: u32,
    pub page_dims: PageDims,
}

impl MipInfo {
    pub fn new(width: u32, height: u32, depth: u32, page_dims: PageDims) -> MipInfo {
        let mut level_dims: Vec<glam::UVec3> = Vec::new();
        let mut dims = glam::uvec3(width.max(1), height.max(1), depth.max(1));
        loop {
            level_dims.push(dims);
            if dims == glam::uvec3(1, 1, 1) {
                break;
            }
            dims = glam::uvec3(
                (dims.x / 2).max(1),
                (dims.y / 2).max(1),
                (dims.z / 2).max(1),
            );
        }
        let mip_level_count = level_dims.len() as u32;

        // The tail starts at the first level that fits entirely inside a
        // single page. Levels at and above it are packed, not tiled.
        let mut mip_tail_start = mip_level_count;
        for (level, dims) in level_dims.iter().enumerate() {
            if dims.x < page_dims.width && dims.y < page_dims.height && dims.z <= page_dims.depth {
                mip_tail_start = level as u32;
                break;
            }
        }

        MipInfo {
            level_dims,
            mip_level_count,
            mip_tail_start,
            page_dims,
        }
    }

    /// Tile grid extents of one mip level, partial tiles included.
    pub fn page_grid(&self, mip_level: u32) -> glam::UVec3 {
        let dims = self.level_dims[mip_level as usize];
        glam::uvec3(
            dims.x.div_ceil(self.page_dims.width),
            dims.y.div_ceil(self.page_dims.height),
            dims.z.div_ceil(self.page_dims.depth),
        )
    }

    /// Remainder of each axis on the last row/column/slice, zero when the
    /// axis is an exact page multiple.
    pub fn partial_page_dims(&self, mip_level: u32) -> glam::UVec3 {
        let dims = self.level_dims[mip_level as usize];
        glam::uvec3(
            dims.x % self.page_dims.width,
            dims.y % self.page_dims.height,
            dims.z % self.page_dims.depth,
        )
    }

    pub fn level_pages_count(&self, mip_level: u32) -> u32 {
        let grid = self.page_grid(mip_level);
        grid.x * grid.y * grid.z
    }

    /// Base global page index of every tiled mip level. Entries at and
    /// above `mip_tail_start` all equal the total tiled page count.
    pub fn mip_bases(&self) -> Vec<u32> {
        let mut bases = Vec::with_capacity(self.mip_level_count as usize);
        let mut base = 0;
        for mip_level in 0..self.mip_level_count {
            bases.push(base);
            if mip_level < self.mip_tail_start {
                base += self.level_pages_count(mip_level);
            }
        }
        bases
    }

    pub fn tiled_pages_count(&self) -> u32 {
        (0..self.mip_tail_start)
            .map(|mip_level| self.level_pages_count(mip_level))
            .sum()
    }

    /// Global page index of the tile at `(mip_level, x, y, z)`. A pure
    /// function of the dimension chain: within a mip level indices are row
    /// major (slice, then tile row, then tile column), across mip levels
    /// they ascend from mip 0.
    pub fn page_index_of(&self, mip_level: u32, x: u32, y: u32, z: u32) -> u32 {
        debug_assert!(mip_level < self.mip_tail_start);
        let grid = self.page_grid(mip_level);
        debug_assert!(x < grid.x && y < grid.y && z < grid.z);
        let mut base = 0;
        for level in 0..mip_level {
            base += self.level_pages_count(level);
        }
        base + z * grid.y * grid.x + y * grid.x + x
    }
}
