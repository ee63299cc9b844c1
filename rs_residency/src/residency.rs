use crate::binder::{PageCoordinate, SparsePageBinder};
use crate::constants::MAX_VIRTUAL_TEXTURES_PER_MATERIAL;
use crate::demand::{ResolvedTextureRange, TexturePageDemand};
use crate::error::Result;
use crate::material::{MaterialResolveData, MaterialTextures, VirtualTextureResolveData};
use crate::settings::VirtualTextureSettings;
use crate::virtual_texture::VirtualTextureMetadata;
use rs_tiled_texture::decoder::TiledTexture;
use rs_tiled_texture::mip_info::MipInfo;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EPageState {
    Unloaded,
    Requested,
    Resident { last_used_frame: u64 },
}

/// Everything the marking pass needs for one resolve invocation, rebuilt
/// per frame and discarded after use.
#[derive(Clone, Debug, Default)]
pub struct FrameResolveInput {
    pub materials: Vec<MaterialResolveData>,
    /// Ascending texture id; drives the demand buffer scan order.
    pub textures: Vec<ResolvedTextureRange>,
    pub total_pages_count: u32,
    pub resolved_textures_count: u32,
    /// References beyond the fixed per material slot capacity, reported
    /// instead of silently dropped.
    pub overflowed_slot_count: u32,
}

struct TextureResidency<R>
where
    R: Seek + Read,
{
    metadata: VirtualTextureMetadata,
    mip_info: MipInfo,
    asset: TiledTexture<R>,
    page_states: Vec<EPageState>,
}

/// Owns the texture id to metadata and texture id to asset maps for one
/// renderer instance, the per page residency states, and the bounded
/// working set policy.
pub struct ResidencyManager<R>
where
    R: Seek + Read,
{
    settings: VirtualTextureSettings,
    textures: BTreeMap<u32, TextureResidency<R>>,
    next_texture_id: u32,
    frame_index: u64,
}

impl<R> ResidencyManager<R>
where
    R: Seek + Read,
{
    pub fn new(settings: VirtualTextureSettings) -> ResidencyManager<R> {
        ResidencyManager {
            settings,
            textures: BTreeMap::new(),
            next_texture_id: 0,
            frame_index: 0,
        }
    }

    pub fn settings(&self) -> &VirtualTextureSettings {
        &self.settings
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Register a decoded asset as a virtual texture and allocate its
    /// unique texture id.
    pub fn register_texture(&mut self, asset: TiledTexture<R>) -> Result<u32> {
        let texture_id = self.next_texture_id;
        let metadata = VirtualTextureMetadata::from_header(asset.header(), texture_id)?;
        let mip_info = asset.mip_info().clone();
        let page_states = vec![EPageState::Unloaded; metadata.pages_count as usize];
        self.textures.insert(
            texture_id,
            TextureResidency {
                metadata,
                mip_info,
                asset,
                page_states,
            },
        );
        self.next_texture_id += 1;
        log::debug!("Registered virtual texture {}", texture_id);
        Ok(texture_id)
    }

    pub fn unregister_texture(&mut self, texture_id: u32) {
        self.textures.remove(&texture_id);
    }

    pub fn metadata(&self, texture_id: u32) -> Option<&VirtualTextureMetadata> {
        self.textures
            .get(&texture_id)
            .map(|texture| &texture.metadata)
    }

    pub fn page_state(&self, texture_id: u32, page_index: u32) -> Option<EPageState> {
        self.textures
            .get(&texture_id)
            .and_then(|texture| texture.page_states.get(page_index as usize))
            .copied()
    }

    pub fn resident_pages_count(&self) -> u32 {
        self.textures
            .values()
            .map(|texture| {
                texture
                    .page_states
                    .iter()
                    .filter(|state| matches!(state, EPageState::Resident { .. }))
                    .count() as u32
            })
            .sum()
    }

    pub fn begin_frame(&mut self) -> u64 {
        self.frame_index += 1;
        self.frame_index
    }

    /// Build the per material resolve records for this frame. Materials
    /// are visited in the given order; texture references are deduplicated
    /// so repeated references across materials share one metadata entry,
    /// one resolve id and one pages start offset.
    pub fn build_frame_resolve(&self, materials: &[MaterialTextures]) -> FrameResolveInput {
        if !self.settings.is_enable {
            return FrameResolveInput::default();
        }
        let mut assigned: HashMap<u32, VirtualTextureResolveData> = HashMap::new();
        let mut texture_ranges: Vec<ResolvedTextureRange> = Vec::new();
        let mut records: Vec<MaterialResolveData> = Vec::with_capacity(materials.len());
        let mut current_pages_start_offset: u32 = 0;
        let mut current_resolve_id: u32 = 0;
        let mut overflowed_slot_count: u32 = 0;

        for material in materials {
            let mut record = MaterialResolveData::default();
            let mut slot: usize = 0;
            for &texture_id in &material.texture_ids {
                let Some(texture) = self.textures.get(&texture_id) else {
                    log::warn!("Unknown virtual texture id {} referenced", texture_id);
                    continue;
                };
                if !texture.metadata.is_sparse {
                    continue;
                }
                if slot == MAX_VIRTUAL_TEXTURES_PER_MATERIAL {
                    overflowed_slot_count += 1;
                    continue;
                }
                let data = match assigned.get(&texture_id) {
                    Some(data) => *data,
                    None => {
                        let data = VirtualTextureResolveData::new(
                            &texture.metadata,
                            current_resolve_id,
                            current_pages_start_offset,
                        );
                        assigned.insert(texture_id, data);
                        texture_ranges.push(ResolvedTextureRange {
                            texture_id,
                            pages_start_offset: current_pages_start_offset,
                            pages_count: texture.metadata.pages_count,
                        });
                        current_resolve_id += 1;
                        current_pages_start_offset += texture.metadata.pages_count;
                        data
                    }
                };
                record.virtual_textures[slot] = data;
                slot += 1;
            }
            record.virtual_textures_count = slot as u32;
            records.push(record);
        }

        if overflowed_slot_count != 0 {
            log::warn!(
                "{} virtual texture references exceeded the {} slot capacity",
                overflowed_slot_count,
                MAX_VIRTUAL_TEXTURES_PER_MATERIAL
            );
        }

        texture_ranges.sort_by_key(|range| range.texture_id);

        FrameResolveInput {
            materials: records,
            textures: texture_ranges,
            total_pages_count: current_pages_start_offset,
            resolved_textures_count: current_resolve_id,
            overflowed_slot_count,
        }
    }

    /// Make the requested pages of one texture resident. Pages already
    /// resident only refresh their last used frame.
    pub fn load_pages(
        &mut self,
        binder: &mut dyn SparsePageBinder,
        texture_id: u32,
        page_indices: &[u32],
    ) -> Result<u32> {
        let frame_index = self.frame_index;
        let Some(texture) = self.textures.get_mut(&texture_id) else {
            return Err(crate::error::Error::TextureNotFound(texture_id));
        };
        let mut loaded_count: u32 = 0;
        for &page_index in page_indices {
            let Some(state) = texture.page_states.get(page_index as usize).copied() else {
                log::warn!(
                    "Page index {} out of range for texture {}",
                    page_index,
                    texture_id
                );
                continue;
            };
            match state {
                EPageState::Resident { .. } => {
                    texture.page_states[page_index as usize] = EPageState::Resident {
                        last_used_frame: frame_index,
                    };
                }
                EPageState::Unloaded | EPageState::Requested => {
                    let Some(coordinate) =
                        page_coordinate(&texture.mip_info, texture_id, page_index)
                    else {
                        log::warn!(
                            "Page {} of texture {} has no tile coordinate",
                            page_index,
                            texture_id
                        );
                        continue;
                    };
                    texture.page_states[page_index as usize] = EPageState::Requested;
                    let page_data = texture
                        .asset
                        .read_page(page_index)
                        .map_err(|err| crate::error::Error::Artifact(err, None))?;
                    binder.bind_page(&coordinate, &page_data)?;
                    texture.page_states[page_index as usize] = EPageState::Resident {
                        last_used_frame: frame_index,
                    };
                    loaded_count += 1;
                }
            }
        }
        log::trace!("{} pages loaded for texture {}", loaded_count, texture_id);
        Ok(loaded_count)
    }

    /// Feed resolved demands into the loader, then trim the working set
    /// back under the resident page budget.
    pub fn apply_demands(
        &mut self,
        binder: &mut dyn SparsePageBinder,
        demands: &[TexturePageDemand],
    ) -> Result<u32> {
        let mut loaded_count = 0;
        for demand in demands {
            loaded_count += self.load_pages(binder, demand.texture_id, &demand.page_indices)?;
        }
        self.evict_over_budget(binder)?;
        Ok(loaded_count)
    }

    /// Evict least recently used pages until the budget holds. Pages
    /// touched this frame are never evicted; running out of eviction
    /// candidates is reported, not forced.
    fn evict_over_budget(&mut self, binder: &mut dyn SparsePageBinder) -> Result<()> {
        let resident_count = self.resident_pages_count();
        if resident_count <= self.settings.resident_page_budget {
            return Ok(());
        }
        let mut candidates: Vec<(u64, u32, u32)> = Vec::new();
        for (&texture_id, texture) in &self.textures {
            for (page_index, state) in texture.page_states.iter().enumerate() {
                if let EPageState::Resident { last_used_frame } = state {
                    if *last_used_frame < self.frame_index {
                        candidates.push((*last_used_frame, texture_id, page_index as u32));
                    }
                }
            }
        }
        candidates.sort();

        let mut to_evict = (resident_count - self.settings.resident_page_budget) as usize;
        if candidates.len() < to_evict {
            log::warn!(
                "Resident pages exceed budget by {} but only {} eviction candidates exist",
                to_evict,
                candidates.len()
            );
            to_evict = candidates.len();
        }
        for &(_, texture_id, page_index) in candidates.iter().take(to_evict) {
            let texture = self
                .textures
                .get_mut(&texture_id)
                .ok_or(crate::error::Error::TextureNotFound(texture_id))?;
            let Some(coordinate) = page_coordinate(&texture.mip_info, texture_id, page_index)
            else {
                continue;
            };
            binder.evict_page(&coordinate)?;
            texture.page_states[page_index as usize] = EPageState::Unloaded;
        }
        Ok(())
    }
}

/// Invert a global page index back to its tile coordinate. Indices beyond
/// the tiled range (debug sentinel pages) have no coordinate.
fn page_coordinate(mip_info: &MipInfo, texture_id: u32, page_index: u32) -> Option<PageCoordinate> {
    let mut base = 0;
    for mip_level in 0..mip_info.mip_tail_start {
        let grid = mip_info.page_grid(mip_level);
        let count = grid.x * grid.y * grid.z;
        if page_index < base + count {
            let local = page_index - base;
            let x = local % grid.x;
            let y = (local / grid.x) % grid.y;
            let z = local / (grid.x * grid.y);
            return Some(PageCoordinate {
                texture_id,
                mip_level,
                x,
                y,
                z,
            });
        }
        base += count;
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::demand::PageDemandBuffer;
    use crate::marking;
    use rs_tiled_texture::encoder::{encode_to_writer, EncodeOptions};
    use rs_tiled_texture::header::EPixelFormat;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryBinder {
        bound: HashMap<PageCoordinate, Vec<u8>>,
        evicted: Vec<PageCoordinate>,
    }

    impl SparsePageBinder for MemoryBinder {
        fn query_page_layout(
            &self,
            _texture_id: u32,
            _mip_level: u32,
        ) -> Option<crate::binder::PageLayout> {
            None
        }

        fn bind_page(&mut self, coordinate: &PageCoordinate, page_data: &[u8]) -> Result<()> {
            assert_eq!(page_data.len(), rs_tiled_texture::PAGE_BYTE_COUNT);
            self.bound.insert(*coordinate, page_data.to_vec());
            Ok(())
        }

        fn evict_page(&mut self, coordinate: &PageCoordinate) -> Result<()> {
            self.bound.remove(coordinate);
            self.evicted.push(*coordinate);
            Ok(())
        }
    }

    fn test_asset(seed: u8) -> TiledTexture<std::io::Cursor<Vec<u8>>> {
        let source = image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(
            512,
            512,
            |x, y| image::Rgba([seed, (x % 256) as u8, (y % 256) as u8, 255]),
        ));
        let options = EncodeOptions::new(EPixelFormat::Rgba8Unorm);
        let mut data: Vec<u8> = Vec::new();
        encode_to_writer(&mut data, &source, &options).unwrap();
        TiledTexture::decode_from_reader(std::io::Cursor::new(data), options.endian_type).unwrap()
    }

    fn test_manager(
        texture_count: u32,
        settings: VirtualTextureSettings,
    ) -> ResidencyManager<std::io::Cursor<Vec<u8>>> {
        let mut manager = ResidencyManager::new(settings);
        for seed in 0..texture_count {
            manager.register_texture(test_asset(seed as u8)).unwrap();
        }
        manager
    }

    #[test]
    fn shared_texture_id_resolves_once() {
        let manager = test_manager(2, VirtualTextureSettings::default());
        let materials = [
            MaterialTextures::new(vec![0, 1]),
            MaterialTextures::new(vec![1]),
        ];
        let input = manager.build_frame_resolve(&materials);
        assert_eq!(input.resolved_textures_count, 2);
        assert_eq!(input.textures.len(), 2);
        // 512x512 at 128x128 pages: 21 tiled pages per texture.
        assert_eq!(input.total_pages_count, 42);
        let first = &input.materials[0].virtual_textures[1];
        let second = &input.materials[1].virtual_textures[0];
        assert_eq!(first.texture_id, 1);
        assert_eq!(second.texture_id, 1);
        assert_eq!(first.resolve_id, second.resolve_id);
        assert_eq!(first.pages_start_offset, second.pages_start_offset);
    }

    #[test]
    fn slot_overflow_is_counted() {
        let manager = test_manager(6, VirtualTextureSettings::default());
        let materials = [MaterialTextures::new(vec![0, 1, 2, 3, 4, 5])];
        let input = manager.build_frame_resolve(&materials);
        assert_eq!(input.materials[0].virtual_textures_count, 4);
        assert_eq!(input.overflowed_slot_count, 2);
        // Overflowed references do not claim demand buffer space either.
        assert_eq!(input.resolved_textures_count, 4);
    }

    #[test]
    fn unknown_texture_id_is_skipped() {
        let manager = test_manager(1, VirtualTextureSettings::default());
        let input = manager.build_frame_resolve(&[MaterialTextures::new(vec![0, 42])]);
        assert_eq!(input.materials[0].virtual_textures_count, 1);
        assert_eq!(input.resolved_textures_count, 1);
    }

    #[test]
    fn disabled_virtual_texturing_resolves_nothing() {
        let settings = VirtualTextureSettings {
            is_enable: false,
            ..Default::default()
        };
        let manager = test_manager(1, settings);
        let input = manager.build_frame_resolve(&[MaterialTextures::new(vec![0])]);
        assert!(input.materials.is_empty());
        assert_eq!(input.total_pages_count, 0);
        assert_eq!(input.resolved_textures_count, 0);
    }

    #[test]
    fn empty_material_list_is_a_no_op() {
        let manager = test_manager(1, VirtualTextureSettings::default());
        let input = manager.build_frame_resolve(&[]);
        assert!(input.materials.is_empty());
        assert_eq!(input.total_pages_count, 0);
    }

    #[test]
    fn marked_sample_demands_exactly_one_page() {
        let mut manager = test_manager(2, VirtualTextureSettings::default());
        manager.begin_frame();
        let materials = [
            MaterialTextures::new(vec![0]),
            MaterialTextures::new(vec![1]),
        ];
        let input = manager.build_frame_resolve(&materials);
        let mut demand = PageDemandBuffer::new(input.total_pages_count);
        let record = &input.materials[1].virtual_textures[0];
        marking::mark_sample(record, glam::vec2(0.5, 0.5), 0, &mut demand);
        let demands = demand.collect(&input.textures);
        assert_eq!(demands.len(), 2);
        assert_eq!(demands[0].texture_id, 0);
        assert!(demands[0].page_indices.is_empty());
        assert_eq!(demands[1].texture_id, 1);
        assert_eq!(demands[1].page_indices, vec![10]);
    }

    #[test]
    fn load_binds_and_marks_resident() {
        let mut manager = test_manager(1, VirtualTextureSettings::default());
        let mut binder = MemoryBinder::default();
        manager.begin_frame();
        let loaded = manager.load_pages(&mut binder, 0, &[0, 5, 16]).unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(manager.resident_pages_count(), 3);
        assert_eq!(
            manager.page_state(0, 5),
            Some(EPageState::Resident { last_used_frame: 1 })
        );
        assert_eq!(manager.page_state(0, 1), Some(EPageState::Unloaded));
        // Page 16 is the first tile of mip 1.
        assert!(binder.bound.contains_key(&PageCoordinate {
            texture_id: 0,
            mip_level: 1,
            x: 0,
            y: 0,
            z: 0,
        }));
        // Reloading the same pages is a refresh, not a rebind.
        let reloaded = manager.load_pages(&mut binder, 0, &[0, 5]).unwrap();
        assert_eq!(reloaded, 0);
    }

    #[test]
    fn eviction_trims_least_recently_used_first() {
        let settings = VirtualTextureSettings {
            resident_page_budget: 3,
            ..Default::default()
        };
        let mut manager = test_manager(1, settings);
        let mut binder = MemoryBinder::default();

        manager.begin_frame();
        manager
            .apply_demands(
                &mut binder,
                &[TexturePageDemand {
                    texture_id: 0,
                    page_indices: vec![0, 1],
                }],
            )
            .unwrap();
        assert!(binder.evicted.is_empty());

        manager.begin_frame();
        manager
            .apply_demands(
                &mut binder,
                &[TexturePageDemand {
                    texture_id: 0,
                    page_indices: vec![2, 3, 4],
                }],
            )
            .unwrap();

        // Budget 3, five pages resident: the two frame 1 pages go.
        assert_eq!(manager.resident_pages_count(), 3);
        assert_eq!(binder.evicted.len(), 2);
        assert_eq!(manager.page_state(0, 0), Some(EPageState::Unloaded));
        assert_eq!(manager.page_state(0, 1), Some(EPageState::Unloaded));
        for page_index in [2, 3, 4] {
            assert!(matches!(
                manager.page_state(0, page_index),
                Some(EPageState::Resident { .. })
            ));
        }
    }

    #[test]
    fn pages_used_this_frame_are_never_evicted() {
        let settings = VirtualTextureSettings {
            resident_page_budget: 2,
            ..Default::default()
        };
        let mut manager = test_manager(1, settings);
        let mut binder = MemoryBinder::default();
        manager.begin_frame();
        manager
            .apply_demands(
                &mut binder,
                &[TexturePageDemand {
                    texture_id: 0,
                    page_indices: vec![0, 1, 2, 3],
                }],
            )
            .unwrap();
        // Everything was touched this frame; the budget is exceeded but
        // nothing is evicted.
        assert_eq!(manager.resident_pages_count(), 4);
        assert!(binder.evicted.is_empty());
    }
}
