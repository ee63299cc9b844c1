use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Deserialize, Serialize)]
pub enum EPixelFormat {
    R8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba32Float,
}

impl EPixelFormat {
    pub fn channel_count(&self) -> u32 {
        match self {
            EPixelFormat::R8Unorm => 1,
            EPixelFormat::Rgba8Unorm => 4,
            EPixelFormat::Rgba8UnormSrgb => 4,
            EPixelFormat::Rgba32Float => 4,
        }
    }

    pub fn bytes_per_channel(&self) -> u32 {
        match self {
            EPixelFormat::R8Unorm => 1,
            EPixelFormat::Rgba8Unorm => 1,
            EPixelFormat::Rgba8UnormSrgb => 1,
            EPixelFormat::Rgba32Float => 4,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.channel_count() * self.bytes_per_channel()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub enum ECompression {
    None,
    Block,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Deserialize, Serialize)]
pub struct PageDims {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl PageDims {
    pub fn new(width: u32, height: u32, depth: u32) -> PageDims {
        PageDims {
            width,
            height,
            depth,
        }
    }

    /// Page extents whose decompressed payload fills exactly
    /// `PAGE_BYTE_COUNT` bytes in the given format.
    pub fn for_format(format: EPixelFormat) -> PageDims {
        let pixels = crate::PAGE_BYTE_COUNT as u32 / format.bytes_per_pixel();
        let width = (pixels as f64).sqrt() as u32;
        let width = u32::pow(2, (width as f64).log2() as u32);
        let height = pixels / width;
        PageDims {
            width,
            height,
            depth: 1,
        }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height * self.depth
    }
}

/// On disk header of a tiled mip paged texture asset. The page offset and
/// compressed size tables are populated iff `compression` is `Block`,
/// otherwise a page's byte range is implied by its global index.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AssetHeader {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: EPixelFormat,
    pub page_dims: PageDims,
    pub mip_level_count: u32,
    pub mip_tail_start: u32,
    pub compression: ECompression,
    pub compression_level: i32,
    pub pages_count: u32,
    pub page_offsets: Vec<u64>,
    pub page_compressed_sizes: Vec<u32>,
}

impl AssetHeader {
    pub fn is_compressed(&self) -> bool {
        self.compression != ECompression::None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn page_dims_fill_one_page() {
        for format in [
            EPixelFormat::R8Unorm,
            EPixelFormat::Rgba8Unorm,
            EPixelFormat::Rgba8UnormSrgb,
            EPixelFormat::Rgba32Float,
        ] {
            let page_dims = PageDims::for_format(format);
            assert_eq!(
                page_dims.pixel_count() * format.bytes_per_pixel(),
                crate::PAGE_BYTE_COUNT as u32
            );
        }
    }
}
