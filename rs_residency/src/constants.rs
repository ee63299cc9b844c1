/// Mip base table length carried in every shader visible resolve record.
pub const MAX_MIP_LEVEL_COUNT: usize = 16;

/// Fixed virtual texture slot capacity of one material resolve record.
/// References beyond the capacity are counted and reported, never bound.
pub const MAX_VIRTUAL_TEXTURES_PER_MATERIAL: usize = 4;
