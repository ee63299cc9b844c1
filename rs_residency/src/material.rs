use crate::constants::{MAX_MIP_LEVEL_COUNT, MAX_VIRTUAL_TEXTURES_PER_MATERIAL};
use crate::virtual_texture::VirtualTextureMetadata;

/// Shader visible descriptor of one virtual texture slot of a material.
/// `resolve_id` is the compact per frame texture index (0..K-1), shared by
/// every material referencing the same texture id. `pages_start_offset`
/// addresses the texture's slice of the combined page demand buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct VirtualTextureResolveData {
    pub empty: u32,
    pub texture_id: u32,
    pub resolve_id: u32,
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
    pub mip_tail_start: u32,
    pub page_width: u32,
    pub page_height: u32,
    pub page_depth: u32,
    pub pages_start_offset: u32,
    pub _padding: u32,
    pub mip_bases: [u32; MAX_MIP_LEVEL_COUNT],
}

impl Default for VirtualTextureResolveData {
    fn default() -> Self {
        Self {
            empty: 1,
            texture_id: 0,
            resolve_id: 0,
            width: 0,
            height: 0,
            mip_level_count: 0,
            mip_tail_start: 0,
            page_width: 0,
            page_height: 0,
            page_depth: 0,
            pages_start_offset: 0,
            _padding: 0,
            mip_bases: [0; MAX_MIP_LEVEL_COUNT],
        }
    }
}

impl VirtualTextureResolveData {
    pub fn new(
        metadata: &VirtualTextureMetadata,
        resolve_id: u32,
        pages_start_offset: u32,
    ) -> VirtualTextureResolveData {
        VirtualTextureResolveData {
            empty: 0,
            texture_id: metadata.texture_id,
            resolve_id,
            width: metadata.width,
            height: metadata.height,
            mip_level_count: metadata.mip_level_count,
            mip_tail_start: metadata.mip_tail_start,
            page_width: metadata.page_dims.width,
            page_height: metadata.page_dims.height,
            page_depth: metadata.page_dims.depth,
            pages_start_offset,
            _padding: 0,
            mip_bases: metadata.mip_bases,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty != 0
    }
}

/// Fixed capacity resolve record of one material, rebuilt every resolve
/// invocation and uploaded as is to the marking pass.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct MaterialResolveData {
    pub virtual_textures_count: u32,
    pub _padding: [u32; 3],
    pub virtual_textures: [VirtualTextureResolveData; MAX_VIRTUAL_TEXTURES_PER_MATERIAL],
}

impl Default for MaterialResolveData {
    fn default() -> Self {
        Self {
            virtual_textures_count: 0,
            _padding: [0; 3],
            virtual_textures: [VirtualTextureResolveData::default();
                MAX_VIRTUAL_TEXTURES_PER_MATERIAL],
        }
    }
}

/// Stable input shape for one material: the sparse capable texture ids it
/// references, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct MaterialTextures {
    pub texture_ids: Vec<u32>,
}

impl MaterialTextures {
    pub fn new(texture_ids: Vec<u32>) -> MaterialTextures {
        MaterialTextures { texture_ids }
    }
}
