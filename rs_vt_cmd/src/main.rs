use anyhow::anyhow;
use clap::{Args, Parser, ValueEnum};
use rs_tiled_texture::decoder::{decode_from_path, TiledTexture};
use rs_tiled_texture::encoder::{encode_to_file, EMipGenerationMode, EncodeOptions};
use rs_tiled_texture::header::{ECompression, EPixelFormat};
use std::fs::File;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum EFormatType {
    R8,
    Rgba8,
    Rgba8Srgb,
    Rgba32f,
}

impl From<EFormatType> for EPixelFormat {
    fn from(value: EFormatType) -> EPixelFormat {
        match value {
            EFormatType::R8 => EPixelFormat::R8Unorm,
            EFormatType::Rgba8 => EPixelFormat::Rgba8Unorm,
            EFormatType::Rgba8Srgb => EPixelFormat::Rgba8UnormSrgb,
            EFormatType::Rgba32f => EPixelFormat::Rgba32Float,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum EMipModeType {
    HighQuality,
    FastPot,
    DebugCheckerboard,
}

impl From<EMipModeType> for EMipGenerationMode {
    fn from(value: EMipModeType) -> EMipGenerationMode {
        match value {
            EMipModeType::HighQuality => EMipGenerationMode::HighQuality,
            EMipModeType::FastPot => EMipGenerationMode::FastPowerOfTwo,
            EMipModeType::DebugCheckerboard => EMipGenerationMode::DebugCheckerboard,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct EncodeArgs {
    #[arg(short, long)]
    input_file: std::path::PathBuf,
    #[arg(short, long)]
    output_file: std::path::PathBuf,
    #[arg(short, long, default_value = "rgba8")]
    format: EFormatType,
    #[arg(short, long)]
    compress: bool,
    #[arg(long, default_value = "3")]
    compression_level: i32,
    #[arg(short, long, default_value = "high-quality")]
    mip_mode: EMipModeType,
}

#[derive(Debug, Clone, Args)]
struct InfoArgs {
    #[arg(short, long)]
    input_file: std::path::PathBuf,
}

#[derive(Debug, Clone, Args)]
struct ExtractArgs {
    #[arg(short, long)]
    input_file: std::path::PathBuf,
    #[arg(short, long)]
    output_file: std::path::PathBuf,
    #[arg(long, default_value = "0")]
    mip: u32,
    #[arg(short, long, default_value = "0")]
    x: u32,
    #[arg(short, long, default_value = "0")]
    y: u32,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
enum Cli {
    Encode(EncodeArgs),
    Info(InfoArgs),
    Extract(ExtractArgs),
}

fn encode(args: EncodeArgs) -> anyhow::Result<()> {
    log::trace!("{args:?}");
    let source = image::open(&args.input_file)?;
    let mut options = EncodeOptions::new(args.format.into());
    if args.compress {
        options.compression = ECompression::Block;
        options.compression_level = args.compression_level;
    }
    options.mip_mode = args.mip_mode.into();
    let header = encode_to_file(&args.output_file, &source, &options)
        .map_err(|err| anyhow!("{err}"))?;
    let compressed_length: u64 = header
        .page_compressed_sizes
        .iter()
        .map(|size| *size as u64)
        .sum();
    log::info!(
        "{}x{}, {} mip levels, mip tail starts at {}, {} pages",
        header.width,
        header.height,
        header.mip_level_count,
        header.mip_tail_start,
        header.pages_count
    );
    if header.is_compressed() {
        log::info!(
            "Compressed body {} bytes ({} raw)",
            compressed_length,
            header.pages_count as u64 * rs_tiled_texture::PAGE_BYTE_COUNT as u64
        );
    }
    Ok(())
}

fn info(args: InfoArgs) -> anyhow::Result<()> {
    let asset = decode_from_path(&args.input_file, None).map_err(|err| anyhow!("{err}"))?;
    let header = asset.header();
    log::info!(
        "{}x{}x{}, format {:?}, page {}x{}x{}",
        header.width,
        header.height,
        header.depth,
        header.format,
        header.page_dims.width,
        header.page_dims.height,
        header.page_dims.depth
    );
    log::info!(
        "{} mip levels, mip tail starts at {}, {} pages, compression {:?}",
        header.mip_level_count,
        header.mip_tail_start,
        header.pages_count,
        header.compression
    );
    if header.is_compressed() {
        check_tables(&asset, args.input_file.metadata()?.len())?;
        log::info!("Offset tables are consistent");
    }
    Ok(())
}

fn check_tables(asset: &TiledTexture<File>, file_length: u64) -> anyhow::Result<()> {
    let header = asset.header();
    let body_length = file_length - asset.body_offset();
    let mut expected_offset: u64 = 0;
    for page_index in 0..header.pages_count as usize {
        let offset = header.page_offsets[page_index];
        let size = header.page_compressed_sizes[page_index] as u64;
        if offset != expected_offset {
            return Err(anyhow!(
                "Page {} starts at {}, expected {}",
                page_index,
                offset,
                expected_offset
            ));
        }
        expected_offset = offset + size;
    }
    if expected_offset != body_length {
        return Err(anyhow!(
            "Pages cover {} bytes but the body is {} bytes",
            expected_offset,
            body_length
        ));
    }
    Ok(())
}

fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    log::trace!("{args:?}");
    let mut asset = decode_from_path(&args.input_file, None).map_err(|err| anyhow!("{err}"))?;
    let page_data = asset
        .read_page_at(args.mip, args.x, args.y, 0)
        .map_err(|err| anyhow!("{err}"))?;
    let page_dims = asset.header().page_dims;
    match asset.header().format {
        EPixelFormat::R8Unorm => {
            let page_image =
                image::GrayImage::from_raw(page_dims.width, page_dims.height, page_data)
                    .ok_or(anyhow!("Page data does not fill the page"))?;
            page_image.save(&args.output_file)?;
        }
        EPixelFormat::Rgba8Unorm | EPixelFormat::Rgba8UnormSrgb => {
            let page_image =
                image::RgbaImage::from_raw(page_dims.width, page_dims.height, page_data)
                    .ok_or(anyhow!("Page data does not fill the page"))?;
            page_image.save(&args.output_file)?;
        }
        EPixelFormat::Rgba32Float => {
            std::fs::write(&args.output_file, &page_data)?;
        }
    }
    log::info!(
        "Extracted page (mip {}, {}, {}) to {:?}",
        args.mip,
        args.x,
        args.y,
        args.output_file
    );
    Ok(())
}

fn main() {
    let mut builder = env_logger::Builder::new();
    builder.write_style(env_logger::WriteStyle::Auto);
    builder.filter_level(log::LevelFilter::Trace);
    builder.init();

    match Cli::parse() {
        Cli::Encode(args) => {
            encode(args).unwrap();
        }
        Cli::Info(args) => {
            info(args).unwrap();
        }
        Cli::Extract(args) => {
            extract(args).unwrap();
        }
    }
}
