use crate::error::Result;
use crate::file_header::{FileHeader, TILED_TEXTURE_FILE_MAGIC_NUMBERS};
use crate::header::{AssetHeader, ECompression, EPixelFormat, PageDims};
use crate::mip_info::MipInfo;
use crate::{EEndianType, PAGE_BYTE_COUNT};
use image::DynamicImage;
use std::io::Write;
use std::path::Path;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EMipGenerationMode {
    /// Every mip level is resampled from the original source image with a
    /// quality filter.
    HighQuality,
    /// Each mip level is resampled from the previously generated one.
    /// Cheaper, only valid when every dimension is a power of two, and not
    /// bit identical to the high quality path.
    FastPowerOfTwo,
    /// Per mip checkerboard content plus all 0xFF sentinel tail pages, for
    /// visual verification of tile and mip boundaries.
    DebugCheckerboard,
}

#[derive(Clone, Copy, Debug)]
pub struct EncodeOptions {
    pub format: EPixelFormat,
    pub page_dims: PageDims,
    pub compression: ECompression,
    pub compression_level: i32,
    pub mip_mode: EMipGenerationMode,
    pub endian_type: Option<EEndianType>,
}

impl EncodeOptions {
    pub fn new(format: EPixelFormat) -> EncodeOptions {
        EncodeOptions {
            format,
            page_dims: PageDims::for_format(format),
            compression: ECompression::None,
            compression_level: 3,
            mip_mode: EMipGenerationMode::HighQuality,
            endian_type: Some(EEndianType::Little),
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::new(EPixelFormat::Rgba8Unorm)
    }
}

const DEBUG_SENTINEL_TAIL_PAGES: u32 = 5;

const DEBUG_COLORS_LIGHT: [[u8; 4]; 8] = [
    [255, 0, 0, 255],
    [0, 255, 0, 255],
    [0, 0, 255, 255],
    [255, 255, 0, 255],
    [0, 255, 255, 255],
    [255, 0, 255, 255],
    [255, 255, 255, 255],
    [255, 128, 0, 255],
];

const DEBUG_COLORS_DARK: [[u8; 4]; 8] = [
    [128, 0, 0, 255],
    [0, 128, 0, 255],
    [0, 0, 128, 255],
    [128, 128, 0, 255],
    [0, 128, 128, 255],
    [128, 0, 128, 255],
    [128, 128, 128, 255],
    [128, 64, 0, 255],
];

/// Accumulates page payloads in ascending global index order. Compressed
/// offsets are only known as pages are produced, so the whole body is
/// buffered and written after the header.
struct PageSink {
    compression: ECompression,
    compression_level: i32,
    type_size: usize,
    body: Vec<u8>,
    page_offsets: Vec<u64>,
    page_compressed_sizes: Vec<u32>,
    running_offset: u64,
    pages_count: u32,
}

impl PageSink {
    fn new(options: &EncodeOptions) -> PageSink {
        PageSink {
            compression: options.compression,
            compression_level: options.compression_level,
            type_size: options.format.bytes_per_channel() as usize,
            body: Vec::new(),
            page_offsets: Vec::new(),
            page_compressed_sizes: Vec::new(),
            running_offset: 0,
            pages_count: 0,
        }
    }

    fn push_page(&mut self, page_data: &[u8]) -> Result<()> {
        debug_assert_eq!(page_data.len(), PAGE_BYTE_COUNT);
        match self.compression {
            ECompression::None => {
                self.body.extend_from_slice(page_data);
            }
            ECompression::Block => {
                let compressed = crate::compression::compress_page(
                    page_data,
                    self.type_size,
                    self.compression_level,
                )?;
                log::trace!(
                    "Compressed page: {} size is: {} offset: {}",
                    self.pages_count,
                    compressed.len(),
                    self.running_offset
                );
                self.page_offsets.push(self.running_offset);
                self.page_compressed_sizes.push(compressed.len() as u32);
                self.running_offset += compressed.len() as u64;
                self.body.extend_from_slice(&compressed);
            }
        }
        self.pages_count += 1;
        Ok(())
    }
}

pub fn encode_to_writer<W>(
    writer: &mut W,
    source: &DynamicImage,
    options: &EncodeOptions,
) -> Result<AssetHeader>
where
    W: Write,
{
    if options.page_dims.depth != 1 {
        return Err(crate::error::Error::InvalidParameter(Some(String::from(
            "Only single slice pages are supported for image sources.",
        ))));
    }
    if options.mip_mode == EMipGenerationMode::FastPowerOfTwo
        && !(source.width().is_power_of_two() && source.height().is_power_of_two())
    {
        return Err(crate::error::Error::InvalidParameter(Some(String::from(
            "Fast mip generation requires power of two dimensions.",
        ))));
    }

    let mip_info = MipInfo::new(source.width(), source.height(), 1, options.page_dims);
    let mut sink = PageSink::new(options);

    match options.mip_mode {
        EMipGenerationMode::HighQuality => {
            for mip_level in 0..mip_info.mip_tail_start {
                let dims = mip_info.level_dims[mip_level as usize];
                let level_image;
                let level_source = if mip_level == 0 {
                    source
                } else {
                    level_image = source.resize_exact(
                        dims.x,
                        dims.y,
                        image::imageops::FilterType::Lanczos3,
                    );
                    &level_image
                };
                let level_bytes = image_to_format_bytes(level_source, options.format)?;
                log::debug!(
                    "Writing mip level {} tiles {:?} ...",
                    mip_level,
                    mip_info.page_grid(mip_level)
                );
                emit_level_tiles(&mut sink, &level_bytes, &mip_info, mip_level, options.format)?;
            }
        }
        EMipGenerationMode::FastPowerOfTwo => {
            let mut previous = source.clone();
            for mip_level in 0..mip_info.mip_tail_start {
                let dims = mip_info.level_dims[mip_level as usize];
                if mip_level != 0 {
                    previous = previous.resize_exact(
                        dims.x,
                        dims.y,
                        image::imageops::FilterType::Triangle,
                    );
                }
                let level_bytes = image_to_format_bytes(&previous, options.format)?;
                log::debug!(
                    "Writing mip level {} tiles {:?} ...",
                    mip_level,
                    mip_info.page_grid(mip_level)
                );
                emit_level_tiles(&mut sink, &level_bytes, &mip_info, mip_level, options.format)?;
            }
        }
        EMipGenerationMode::DebugCheckerboard => {
            for mip_level in 0..mip_info.mip_tail_start {
                let dims = mip_info.level_dims[mip_level as usize];
                let checker = checkerboard_image(dims.x, dims.y, mip_level);
                let level_bytes = image_to_format_bytes(&checker, options.format)?;
                emit_level_tiles(&mut sink, &level_bytes, &mip_info, mip_level, options.format)?;
            }
            let sentinel = [0xFF_u8; PAGE_BYTE_COUNT];
            for _ in 0..DEBUG_SENTINEL_TAIL_PAGES {
                sink.push_page(&sentinel)?;
            }
        }
    }

    let header = AssetHeader {
        width: source.width(),
        height: source.height(),
        depth: 1,
        format: options.format,
        page_dims: options.page_dims,
        mip_level_count: mip_info.mip_level_count,
        mip_tail_start: mip_info.mip_tail_start,
        compression: options.compression,
        compression_level: options.compression_level,
        pages_count: sink.pages_count,
        page_offsets: sink.page_offsets,
        page_compressed_sizes: sink.page_compressed_sizes,
    };

    let header_data = FileHeader::write_header(
        TILED_TEXTURE_FILE_MAGIC_NUMBERS,
        &header,
        options.endian_type,
    )?;
    writer
        .write_all(&header_data)
        .map_err(|err| crate::error::Error::IO(err, None))?;
    writer
        .write_all(&sink.body)
        .map_err(|err| crate::error::Error::IO(err, None))?;

    Ok(header)
}

pub fn encode_to_file<P: AsRef<Path>>(
    path: P,
    source: &DynamicImage,
    options: &EncodeOptions,
) -> Result<AssetHeader> {
    let mut writer = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|err| crate::error::Error::IO(err, None))?;
    encode_to_writer(&mut writer, source, options)
}

/// Gather one mip level into pages. Tiles touching a boundary zero the
/// working buffer first and copy only the valid sub region respecting the
/// source stride; full tiles copy whole contiguous rows.
fn emit_level_tiles(
    sink: &mut PageSink,
    level_bytes: &[u8],
    mip_info: &MipInfo,
    mip_level: u32,
    format: EPixelFormat,
) -> Result<()> {
    let dims = mip_info.level_dims[mip_level as usize];
    let grid = mip_info.page_grid(mip_level);
    let partial = mip_info.partial_page_dims(mip_level);
    let page_dims = mip_info.page_dims;

    let bytes_per_pixel = format.bytes_per_pixel() as usize;
    let tile_width_stride = page_dims.width as usize * bytes_per_pixel;
    let partial_tile_width_stride = partial.x as usize * bytes_per_pixel;
    let buffer_width_stride = dims.x as usize * bytes_per_pixel;

    debug_assert_eq!(
        level_bytes.len(),
        buffer_width_stride * dims.y as usize * dims.z as usize
    );

    let mut page_data = vec![0_u8; PAGE_BYTE_COUNT];

    for z in 0..grid.z {
        for tile_y in 0..grid.y {
            let partial_row = tile_y == grid.y - 1 && partial.y != 0;
            let write_lines_count = if partial_row { partial.y } else { page_dims.height };

            for tile_x in 0..grid.x {
                let partial_column = tile_x == grid.x - 1 && partial.x != 0;
                let copy_stride = if partial_column {
                    partial_tile_width_stride
                } else {
                    tile_width_stride
                };

                if partial_row || partial_column {
                    page_data.fill(0);
                }
                for line in 0..write_lines_count {
                    let source_y = tile_y * page_dims.height + line;
                    let source_offset = (z * dims.y + source_y) as usize * buffer_width_stride
                        + tile_x as usize * tile_width_stride;
                    let dest_offset = line as usize * copy_stride;
                    page_data[dest_offset..dest_offset + copy_stride]
                        .copy_from_slice(&level_bytes[source_offset..source_offset + copy_stride]);
                }
                sink.push_page(&page_data)?;
            }
        }
    }
    Ok(())
}

fn image_to_format_bytes(image: &DynamicImage, format: EPixelFormat) -> Result<Vec<u8>> {
    match format {
        EPixelFormat::R8Unorm => Ok(image.to_luma8().into_raw()),
        EPixelFormat::Rgba8Unorm | EPixelFormat::Rgba8UnormSrgb => Ok(image.to_rgba8().into_raw()),
        EPixelFormat::Rgba32Float => {
            let raw = image.to_rgba32f().into_raw();
            let mut bytes = Vec::with_capacity(raw.len() * 4);
            for value in raw {
                bytes.extend_from_slice(&value.to_ne_bytes());
            }
            Ok(bytes)
        }
    }
}

fn checkerboard_image(width: u32, height: u32, mip_level: u32) -> DynamicImage {
    let cell = (128_u32 >> mip_level.min(7)).max(1);
    let light = DEBUG_COLORS_LIGHT[mip_level as usize % 8];
    let dark = DEBUG_COLORS_DARK[mip_level as usize % 8];
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            image::Rgba(dark)
        } else {
            image::Rgba(light)
        }
    });
    DynamicImage::ImageRgba8(image)
}
