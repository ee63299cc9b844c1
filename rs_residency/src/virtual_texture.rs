use crate::constants::MAX_MIP_LEVEL_COUNT;
use crate::error::Result;
use rs_tiled_texture::header::{AssetHeader, PageDims};
use rs_tiled_texture::mip_info::MipInfo;

/// Page table description of one virtual texture, derived once from a
/// decoded asset header when the texture is bound into the renderer.
/// Immutable for the texture's lifetime; residency bits live elsewhere.
#[derive(Clone, Debug)]
pub struct VirtualTextureMetadata {
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
    pub mip_tail_start: u32,
    pub page_dims: PageDims,
    pub texture_id: u32,
    pub pages_count: u32,
    pub mip_bases: [u32; MAX_MIP_LEVEL_COUNT],
    pub is_sparse: bool,
}

impl VirtualTextureMetadata {
    pub fn from_header(header: &AssetHeader, texture_id: u32) -> Result<VirtualTextureMetadata> {
        let mip_info = MipInfo::new(header.width, header.height, header.depth, header.page_dims);
        if mip_info.mip_tail_start as usize > MAX_MIP_LEVEL_COUNT {
            return Err(crate::error::Error::TooManyMipLevels(
                mip_info.mip_tail_start,
            ));
        }
        let mut mip_bases = [mip_info.tiled_pages_count(); MAX_MIP_LEVEL_COUNT];
        for (mip_level, base) in mip_info.mip_bases().iter().enumerate().take(MAX_MIP_LEVEL_COUNT)
        {
            mip_bases[mip_level] = *base;
        }
        Ok(VirtualTextureMetadata {
            width: header.width,
            height: header.height,
            mip_level_count: header.mip_level_count,
            mip_tail_start: header.mip_tail_start,
            page_dims: header.page_dims,
            texture_id,
            pages_count: header.pages_count,
            mip_bases,
            is_sparse: true,
        })
    }

    pub fn mip_info(&self) -> MipInfo {
        MipInfo::new(self.width, self.height, 1, self.page_dims)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rs_tiled_texture::header::{ECompression, EPixelFormat};

    fn test_header(width: u32, height: u32) -> AssetHeader {
        let page_dims = PageDims::new(128, 128, 1);
        let mip_info = MipInfo::new(width, height, 1, page_dims);
        AssetHeader {
            width,
            height,
            depth: 1,
            format: EPixelFormat::Rgba8Unorm,
            page_dims,
            mip_level_count: mip_info.mip_level_count,
            mip_tail_start: mip_info.mip_tail_start,
            compression: ECompression::None,
            compression_level: 0,
            pages_count: mip_info.tiled_pages_count(),
            page_offsets: vec![],
            page_compressed_sizes: vec![],
        }
    }

    #[test]
    fn metadata_from_header() {
        let metadata = VirtualTextureMetadata::from_header(&test_header(512, 512), 7).unwrap();
        assert_eq!(metadata.texture_id, 7);
        assert_eq!(metadata.pages_count, 21);
        assert_eq!(metadata.mip_bases[0..3], [0, 16, 20]);
        // Untiled levels all report the total tiled page count.
        assert_eq!(metadata.mip_bases[3], 21);
        assert_eq!(metadata.mip_bases[15], 21);
    }
}
