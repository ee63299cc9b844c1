use rs_residency::binder::{PageCoordinate, PageLayout, SparsePageBinder};
use rs_residency::error::{Error, Result};
use rs_residency::virtual_texture::VirtualTextureMetadata;
use rs_tiled_texture::header::EPixelFormat;
use rs_tiled_texture::mip_info::MipInfo;
use std::collections::HashMap;

pub fn texture_format_of(format: EPixelFormat) -> wgpu::TextureFormat {
    match format {
        EPixelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        EPixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        EPixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        EPixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

struct BoundTexture {
    texture: wgpu::Texture,
    mip_info: MipInfo,
    bytes_per_pixel: u32,
}

/// Commits decoded tiles into per texture wgpu textures through
/// `queue.write_texture`. wgpu exposes no real sparse binding, so an
/// evicted page is cleared to zero rather than unmapped; the residency
/// bookkeeping upstream is what keeps stale pages from being sampled.
pub struct WgpuPageBinder {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<u32, BoundTexture>,
    zero_page: Vec<u8>,
}

impl WgpuPageBinder {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> WgpuPageBinder {
        WgpuPageBinder {
            device,
            queue,
            textures: HashMap::new(),
            zero_page: vec![0; rs_tiled_texture::PAGE_BYTE_COUNT],
        }
    }

    /// Allocate the backing texture covering the individually paged mip
    /// levels of one virtual texture.
    pub fn add_texture(
        &mut self,
        metadata: &VirtualTextureMetadata,
        format: EPixelFormat,
    ) -> Result<()> {
        if metadata.mip_tail_start == 0 {
            return Err(Error::Binder(Some(format!(
                "Texture {} has no individually paged mip levels",
                metadata.texture_id
            ))));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("WgpuPageBinder.Texture.{}", metadata.texture_id)),
            size: wgpu::Extent3d {
                width: metadata.width,
                height: metadata.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: metadata.mip_tail_start,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format_of(format),
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        self.textures.insert(
            metadata.texture_id,
            BoundTexture {
                texture,
                mip_info: metadata.mip_info(),
                bytes_per_pixel: format.bytes_per_pixel(),
            },
        );
        Ok(())
    }

    pub fn remove_texture(&mut self, texture_id: u32) {
        self.textures.remove(&texture_id);
    }

    pub fn texture_view(&self, texture_id: u32) -> Option<wgpu::TextureView> {
        self.textures.get(&texture_id).map(|bound| {
            bound
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default())
        })
    }

    fn write_page(&self, coordinate: &PageCoordinate, page_data: &[u8]) -> Result<()> {
        let Some(bound) = self.textures.get(&coordinate.texture_id) else {
            return Err(Error::TextureNotFound(coordinate.texture_id));
        };
        if coordinate.mip_level >= bound.mip_info.mip_tail_start {
            return Err(Error::Binder(Some(format!(
                "Mip level {} of texture {} is inside the mip tail",
                coordinate.mip_level, coordinate.texture_id
            ))));
        }
        let Some(layout) = page_copy_layout(&bound.mip_info, coordinate, bound.bytes_per_pixel)
        else {
            return Err(Error::Binder(Some(format!(
                "Page ({}, {}) outside level {} of texture {}",
                coordinate.x, coordinate.y, coordinate.mip_level, coordinate.texture_id
            ))));
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &bound.texture,
                mip_level: coordinate.mip_level,
                origin: wgpu::Origin3d {
                    x: layout.origin_x,
                    y: layout.origin_y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            page_data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(layout.bytes_per_row),
                rows_per_image: Some(layout.height),
            },
            wgpu::Extent3d {
                width: layout.width,
                height: layout.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PageCopyLayout {
    origin_x: u32,
    origin_y: u32,
    width: u32,
    height: u32,
    bytes_per_row: u32,
}

/// Copy description of one page's valid region. Edge tiles carry zero
/// padding in the page body and pack their rows at the valid width, so
/// the source stride is the valid width, never the page width.
fn page_copy_layout(
    mip_info: &MipInfo,
    coordinate: &PageCoordinate,
    bytes_per_pixel: u32,
) -> Option<PageCopyLayout> {
    if coordinate.mip_level >= mip_info.mip_tail_start {
        return None;
    }
    let level_dims = mip_info.level_dims[coordinate.mip_level as usize];
    let page_dims = mip_info.page_dims;
    let origin_x = coordinate.x * page_dims.width;
    let origin_y = coordinate.y * page_dims.height;
    if origin_x >= level_dims.x || origin_y >= level_dims.y {
        return None;
    }
    let width = page_dims.width.min(level_dims.x - origin_x);
    let height = page_dims.height.min(level_dims.y - origin_y);
    Some(PageCopyLayout {
        origin_x,
        origin_y,
        width,
        height,
        bytes_per_row: width * bytes_per_pixel,
    })
}

impl SparsePageBinder for WgpuPageBinder {
    fn query_page_layout(&self, texture_id: u32, mip_level: u32) -> Option<PageLayout> {
        let bound = self.textures.get(&texture_id)?;
        if mip_level >= bound.mip_info.mip_tail_start {
            return None;
        }
        Some(PageLayout {
            level_dims: bound.mip_info.level_dims[mip_level as usize],
            page_grid: bound.mip_info.page_grid(mip_level),
        })
    }

    fn bind_page(&mut self, coordinate: &PageCoordinate, page_data: &[u8]) -> Result<()> {
        if page_data.len() != rs_tiled_texture::PAGE_BYTE_COUNT {
            return Err(Error::Binder(Some(format!(
                "Page data is {} bytes, expected {}",
                page_data.len(),
                rs_tiled_texture::PAGE_BYTE_COUNT
            ))));
        }
        self.write_page(coordinate, page_data)
    }

    fn evict_page(&mut self, coordinate: &PageCoordinate) -> Result<()> {
        self.write_page(coordinate, &self.zero_page)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rs_tiled_texture::decoder::TiledTexture;
    use rs_tiled_texture::encoder::{encode_to_writer, EncodeOptions};

    fn coordinate_at(mip_level: u32, x: u32, y: u32) -> PageCoordinate {
        PageCoordinate {
            texture_id: 0,
            mip_level,
            x,
            y,
            z: 0,
        }
    }

    #[test]
    fn partial_column_page_rows_pack_at_valid_width() {
        let source = image::RgbaImage::from_fn(300, 200, |x, y| {
            image::Rgba([x as u8, y as u8, (x >> 8) as u8, 255])
        });
        let options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        let mut data: Vec<u8> = Vec::new();
        encode_to_writer(
            &mut data,
            &image::DynamicImage::ImageRgba8(source.clone()),
            &options,
        )
        .unwrap();
        let mut asset =
            TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type)
                .unwrap();
        let mip_info = asset.mip_info().clone();

        // Last column of mip 0: 44 of 128 texels per row are valid.
        let coordinate = coordinate_at(0, 2, 0);
        let layout =
            page_copy_layout(&mip_info, &coordinate, EPixelFormat::Rgba8Unorm.bytes_per_pixel())
                .unwrap();
        assert_eq!((layout.origin_x, layout.origin_y), (256, 0));
        assert_eq!((layout.width, layout.height), (44, 128));
        assert_eq!(layout.bytes_per_row, 44 * 4);

        let page_data = asset.read_page_at(0, 2, 0, 0).unwrap();
        for row in 0..layout.height {
            for column in 0..layout.width {
                let offset = (row * layout.bytes_per_row + column * 4) as usize;
                let texel = source
                    .get_pixel(layout.origin_x + column, layout.origin_y + row)
                    .0;
                assert_eq!(
                    &page_data[offset..offset + 4],
                    &texel,
                    "texel ({column}, {row})"
                );
            }
        }
    }

    #[test]
    fn interior_page_copies_the_full_page() {
        let page_dims = rs_tiled_texture::header::PageDims::for_format(EPixelFormat::Rgba8Unorm);
        let mip_info = rs_tiled_texture::mip_info::MipInfo::new(300, 200, 1, page_dims);
        let layout = page_copy_layout(&mip_info, &coordinate_at(0, 1, 0), 4).unwrap();
        assert_eq!((layout.width, layout.height), (128, 128));
        assert_eq!(layout.bytes_per_row, 128 * 4);
        // Bottom row pages are full width, 72 of 128 rows valid.
        let layout = page_copy_layout(&mip_info, &coordinate_at(0, 0, 1), 4).unwrap();
        assert_eq!((layout.width, layout.height), (128, 72));
        assert_eq!(layout.bytes_per_row, 128 * 4);
    }

    #[test]
    fn pages_outside_the_level_have_no_layout() {
        let page_dims = rs_tiled_texture::header::PageDims::for_format(EPixelFormat::Rgba8Unorm);
        let mip_info = rs_tiled_texture::mip_info::MipInfo::new(300, 200, 1, page_dims);
        assert!(page_copy_layout(&mip_info, &coordinate_at(0, 3, 0), 4).is_none());
        assert!(
            page_copy_layout(&mip_info, &coordinate_at(mip_info.mip_tail_start, 0, 0), 4).is_none()
        );
    }
}
