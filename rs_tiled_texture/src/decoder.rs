use crate::error::Result;
use crate::file_header::{FileHeader, HEADER_OFFSET, TILED_TEXTURE_FILE_MAGIC_NUMBERS};
use crate::header::{AssetHeader, ECompression};
use crate::mip_info::MipInfo;
use crate::{EEndianType, PAGE_BYTE_COUNT};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// Random access reader over an encoded tiled texture asset. Every read
/// page is exactly `PAGE_BYTE_COUNT` decompressed bytes.
#[derive(Debug)]
pub struct TiledTexture<R>
where
    R: Seek + Read,
{
    header: AssetHeader,
    mip_info: MipInfo,
    body_offset: u64,
    reader: R,
}

impl<R> TiledTexture<R>
where
    R: Seek + Read,
{
    pub fn decode_from_reader(
        mut reader: R,
        endian_type: Option<EEndianType>,
    ) -> Result<TiledTexture<R>> {
        FileHeader::check_identification(&mut reader, TILED_TEXTURE_FILE_MAGIC_NUMBERS)?;
        let header_bytes_length =
            FileHeader::get_header_encoded_data_length(&mut reader, endian_type)?;
        let header: AssetHeader = FileHeader::get_header(&mut reader, endian_type)?;
        if header.is_compressed()
            && (header.page_offsets.len() != header.pages_count as usize
                || header.page_compressed_sizes.len() != header.pages_count as usize)
        {
            return Err(crate::error::Error::File(Some(String::from(
                "Compressed asset without complete page offset/size tables.",
            ))));
        }
        let mip_info = MipInfo::new(header.width, header.height, header.depth, header.page_dims);
        let body_offset = HEADER_OFFSET as u64 + header_bytes_length;
        Ok(TiledTexture {
            header,
            mip_info,
            body_offset,
            reader,
        })
    }

    pub fn header(&self) -> &AssetHeader {
        &self.header
    }

    pub fn mip_info(&self) -> &MipInfo {
        &self.mip_info
    }

    pub fn body_offset(&self) -> u64 {
        self.body_offset
    }

    /// Byte range of a page relative to the body start. Table lookup when
    /// compressed, pure arithmetic otherwise.
    pub fn page_byte_range(&self, page_index: u32) -> Result<(u64, u64)> {
        if page_index >= self.header.pages_count {
            return Err(crate::error::Error::PageIndexOutOfRange(page_index));
        }
        match self.header.compression {
            ECompression::None => Ok((
                page_index as u64 * PAGE_BYTE_COUNT as u64,
                PAGE_BYTE_COUNT as u64,
            )),
            ECompression::Block => Ok((
                self.header.page_offsets[page_index as usize],
                self.header.page_compressed_sizes[page_index as usize] as u64,
            )),
        }
    }

    pub fn read_page(&mut self, page_index: u32) -> Result<Vec<u8>> {
        let (offset, length) = self.page_byte_range(page_index)?;
        self.reader
            .seek(std::io::SeekFrom::Start(self.body_offset + offset))
            .map_err(|err| crate::error::Error::IO(err, None))?;
        let mut buffer = vec![0_u8; length as usize];
        self.reader
            .read_exact(&mut buffer)
            .map_err(|err| crate::error::Error::IO(err, None))?;
        match self.header.compression {
            ECompression::None => Ok(buffer),
            ECompression::Block => crate::compression::decompress_page(
                &buffer,
                self.header.format.bytes_per_channel() as usize,
            ),
        }
    }

    pub fn read_page_at(&mut self, mip_level: u32, x: u32, y: u32, z: u32) -> Result<Vec<u8>> {
        if mip_level >= self.header.mip_tail_start {
            return Err(crate::error::Error::InvalidParameter(Some(format!(
                "Mip level {} is inside the mip tail.",
                mip_level
            ))));
        }
        let grid = self.mip_info.page_grid(mip_level);
        if x >= grid.x || y >= grid.y || z >= grid.z {
            return Err(crate::error::Error::InvalidParameter(Some(format!(
                "Tile ({}, {}, {}) outside grid {:?}.",
                x, y, z, grid
            ))));
        }
        self.read_page(self.mip_info.page_index_of(mip_level, x, y, z))
    }
}

pub fn decode_from_path<P: AsRef<Path>>(
    path: P,
    endian_type: Option<EEndianType>,
) -> Result<TiledTexture<File>> {
    let reader = std::fs::OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|err| crate::error::Error::IO(err, None))?;
    TiledTexture::<File>::decode_from_reader(reader, endian_type)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoder::{encode_to_writer, EMipGenerationMode, EncodeOptions};
    use crate::header::{EPixelFormat, PageDims};
    use image::DynamicImage;

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([
                (x % 256) as u8,
                (y % 256) as u8,
                ((x + y) % 256) as u8,
                255,
            ])
        }))
    }

    fn encode(source: &DynamicImage, options: &EncodeOptions) -> (crate::header::AssetHeader, Vec<u8>) {
        let mut data: Vec<u8> = Vec::new();
        let header = encode_to_writer(&mut data, source, options).unwrap();
        (header, data)
    }

    fn expected_page(source: &DynamicImage, page_dims: PageDims, tile_x: u32, tile_y: u32) -> Vec<u8> {
        let rgba = source.to_rgba8();
        let mut expected = vec![0_u8; crate::PAGE_BYTE_COUNT];
        let valid_width = (source.width().saturating_sub(tile_x * page_dims.width))
            .min(page_dims.width) as usize;
        let valid_height = (source.height().saturating_sub(tile_y * page_dims.height))
            .min(page_dims.height) as usize;
        let copy_stride = valid_width * 4;
        for line in 0..valid_height {
            for column in 0..valid_width {
                let pixel = rgba.get_pixel(
                    tile_x * page_dims.width + column as u32,
                    tile_y * page_dims.height + line as u32,
                );
                let offset = line * copy_stride + column * 4;
                expected[offset..offset + 4].copy_from_slice(&pixel.0);
            }
        }
        expected
    }

    #[test]
    fn round_trip_raw() {
        let source = test_image(256, 256);
        let options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        let (header, data) = encode(&source, &options);
        assert_eq!(header.pages_count, 5);
        let mut decoded =
            TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type)
                .unwrap();
        for tile_y in 0..2 {
            for tile_x in 0..2 {
                let page = decoded.read_page_at(0, tile_x, tile_y, 0).unwrap();
                assert_eq!(page, expected_page(&source, options.page_dims, tile_x, tile_y));
            }
        }
    }

    #[test]
    fn round_trip_compressed() {
        let source = test_image(256, 256);
        let mut options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        options.compression = crate::header::ECompression::Block;
        let (header, data) = encode(&source, &options);
        assert_eq!(header.page_offsets.len(), header.pages_count as usize);
        let mut decoded =
            TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type)
                .unwrap();
        for tile_y in 0..2 {
            for tile_x in 0..2 {
                let page = decoded.read_page_at(0, tile_x, tile_y, 0).unwrap();
                assert_eq!(page, expected_page(&source, options.page_dims, tile_x, tile_y));
            }
        }
    }

    #[test]
    fn boundary_tiles_are_zero_padded() {
        let source = test_image(300, 200);
        let options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        let (_, data) = encode(&source, &options);
        let mut decoded =
            TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type)
                .unwrap();
        // Last column: 300 = 2 * 128 + 44 valid pixels.
        let page = decoded.read_page_at(0, 2, 0, 0).unwrap();
        let expected = expected_page(&source, options.page_dims, 2, 0);
        assert_eq!(page, expected);
        let valid_bytes = 44 * 128 * 4;
        assert!(page[valid_bytes..].iter().all(|&byte| byte == 0));
        assert!(page[..valid_bytes].iter().any(|&byte| byte != 0));
    }

    #[test]
    fn offset_table_is_consistent() {
        let source = test_image(640, 400);
        let mut options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        options.compression = crate::header::ECompression::Block;
        let (header, data) = encode(&source, &options);
        for i in 0..header.pages_count as usize {
            for j in (i + 1)..header.pages_count as usize {
                assert!(
                    header.page_offsets[j]
                        >= header.page_offsets[i] + header.page_compressed_sizes[i] as u64
                );
            }
        }
        let decoded =
            TiledTexture::decode_from_reader(std::io::Cursor::new(&data[..]), options.endian_type)
                .unwrap();
        let body_length = data.len() as u64 - decoded.body_offset();
        let total: u64 = header
            .page_compressed_sizes
            .iter()
            .map(|&size| size as u64)
            .sum();
        assert_eq!(total, body_length);
    }

    #[test]
    fn debug_mode_appends_sentinel_tail_pages() {
        let source = test_image(256, 256);
        let mut options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        options.mip_mode = EMipGenerationMode::DebugCheckerboard;
        let (header, data) = encode(&source, &options);
        let mut decoded =
            TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type)
                .unwrap();
        let tiled = decoded.mip_info().tiled_pages_count();
        assert_eq!(header.pages_count, tiled + 5);
        for page_index in tiled..header.pages_count {
            let page = decoded.read_page(page_index).unwrap();
            assert!(page.iter().all(|&byte| byte == 0xFF));
        }
    }

    #[test]
    fn fast_pot_mode_rejects_non_pot_dimensions() {
        let source = test_image(300, 200);
        let mut options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        options.mip_mode = EMipGenerationMode::FastPowerOfTwo;
        let mut data: Vec<u8> = Vec::new();
        assert!(encode_to_writer(&mut data, &source, &options).is_err());
    }

    #[test]
    fn fast_pot_mode_matches_hq_at_mip_zero() {
        let source = test_image(256, 256);
        let mut options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        options.mip_mode = EMipGenerationMode::FastPowerOfTwo;
        let (_, data) = encode(&source, &options);
        let mut decoded =
            TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type)
                .unwrap();
        let page = decoded.read_page_at(0, 0, 0, 0).unwrap();
        assert_eq!(page, expected_page(&source, options.page_dims, 0, 0));
    }

    #[test]
    fn page_index_out_of_range() {
        let source = test_image(256, 256);
        let options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        let (header, data) = encode(&source, &options);
        let mut decoded =
            TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type)
                .unwrap();
        assert!(decoded.read_page(header.pages_count).is_err());
    }
}
