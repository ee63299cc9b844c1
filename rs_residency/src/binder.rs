use crate::error::Result;

/// Location of one page inside a sparse texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageCoordinate {
    pub texture_id: u32,
    pub mip_level: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageLayout {
    pub level_dims: glam::UVec3,
    pub page_grid: glam::UVec3,
}

/// Narrow capability over the sparse memory of a graphics backend. The
/// residency core commits decoded tile bytes through this seam and never
/// sees backend binding descriptors.
pub trait SparsePageBinder {
    fn query_page_layout(&self, texture_id: u32, mip_level: u32) -> Option<PageLayout>;

    /// Commit a decoded, exactly `PAGE_BYTE_COUNT` byte tile into GPU
    /// visible memory at the page coordinate.
    fn bind_page(&mut self, coordinate: &PageCoordinate, page_data: &[u8]) -> Result<()>;

    /// Release the page's backing memory.
    fn evict_page(&mut self, coordinate: &PageCoordinate) -> Result<()>;
}
