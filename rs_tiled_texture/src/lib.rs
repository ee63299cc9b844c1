pub mod compression;
pub mod decoder;
pub mod encoder;
pub mod endian;
pub mod error;
pub mod file_header;
pub mod header;
pub mod mip_info;

pub use endian::EEndianType;

/// Decompressed byte size of every page, independent of pixel format.
/// Boundary tiles are zero padded up to this size before write.
pub const PAGE_BYTE_COUNT: usize = 65536;
