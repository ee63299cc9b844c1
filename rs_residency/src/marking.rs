use crate::demand::PageDemandBuffer;
use crate::material::VirtualTextureResolveData;

/// CPU reference of the page marking computation the resolve shader runs
/// per covered pixel. The shader and this function must stay in lockstep:
/// the conservativeness guarantees of the resolver are tested against this
/// implementation.
///
/// `uv` is the normalized sample coordinate, `mip_level` the level the
/// standard sampling path would touch. Samples landing in the mip tail are
/// clamped to the last individually paged level; the tail is bound as one
/// packed unit and never demand paged.
pub fn page_flat_index_for_sample(
    record: &VirtualTextureResolveData,
    uv: glam::Vec2,
    mip_level: u32,
) -> Option<u32> {
    if record.is_empty() {
        return None;
    }
    if record.mip_tail_start == 0 {
        return None;
    }
    let mip_level = mip_level.min(record.mip_tail_start - 1);
    let level_width = (record.width >> mip_level).max(1);
    let level_height = (record.height >> mip_level).max(1);
    let columns = level_width.div_ceil(record.page_width);
    let rows = level_height.div_ceil(record.page_height);

    let uv = uv.clamp(glam::Vec2::ZERO, glam::Vec2::ONE);
    let texel_x = ((uv.x * level_width as f32) as u32).min(level_width - 1);
    let texel_y = ((uv.y * level_height as f32) as u32).min(level_height - 1);
    let tile_x = (texel_x / record.page_width).min(columns - 1);
    let tile_y = (texel_y / record.page_height).min(rows - 1);

    let local_index = record.mip_bases[mip_level as usize] + tile_y * columns + tile_x;
    Some(record.pages_start_offset + local_index)
}

/// Mip selection from screen space uv derivatives, the standard isotropic
/// log2 rule the sampling hardware applies.
pub fn select_mip_level(
    record: &VirtualTextureResolveData,
    duv_dx: glam::Vec2,
    duv_dy: glam::Vec2,
) -> u32 {
    let texel_dx = duv_dx * glam::vec2(record.width as f32, record.height as f32);
    let texel_dy = duv_dy * glam::vec2(record.width as f32, record.height as f32);
    let rho = texel_dx.length().max(texel_dy.length());
    if rho <= 1.0 {
        return 0;
    }
    let level = rho.log2().floor() as u32;
    level.min(record.mip_level_count.saturating_sub(1))
}

pub fn mark_sample(
    record: &VirtualTextureResolveData,
    uv: glam::Vec2,
    mip_level: u32,
    demand: &mut PageDemandBuffer,
) {
    if let Some(flat_index) = page_flat_index_for_sample(record, uv, mip_level) {
        demand.mark(flat_index);
    }
}
