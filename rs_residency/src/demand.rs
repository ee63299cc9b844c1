/// Byte range of one texture inside the combined per frame page space,
/// in ascending texture id order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedTextureRange {
    pub texture_id: u32,
    pub pages_start_offset: u32,
    pub pages_count: u32,
}

/// Resolved demand of one texture: local page indices that must be
/// resident to shade the frame without degradation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TexturePageDemand {
    pub texture_id: u32,
    pub page_indices: Vec<u32>,
}

/// One byte per page across all textures participating in the frame's
/// resolve, flat addressed by pages start offset plus local page index.
/// Written by the marking step, read back and scanned on the host.
#[derive(Clone, Debug)]
pub struct PageDemandBuffer {
    bytes: Vec<u8>,
}

impl PageDemandBuffer {
    pub fn new(total_pages_count: u32) -> PageDemandBuffer {
        PageDemandBuffer {
            bytes: vec![0; total_pages_count as usize],
        }
    }

    /// Wrap bytes read back from the marking pass.
    pub fn from_bytes(bytes: Vec<u8>) -> PageDemandBuffer {
        PageDemandBuffer { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mark(&mut self, flat_index: u32) {
        if let Some(flag) = self.bytes.get_mut(flat_index as usize) {
            *flag = 1;
        }
    }

    pub fn is_marked(&self, flat_index: u32) -> bool {
        self.bytes
            .get(flat_index as usize)
            .map(|&flag| flag != 0)
            .unwrap_or(false)
    }

    /// Scan each texture's slice and collect the local indices with a non
    /// zero flag. `textures` is expected in ascending texture id order, so
    /// the output order is stable across frames.
    pub fn collect(&self, textures: &[ResolvedTextureRange]) -> Vec<TexturePageDemand> {
        let mut demands: Vec<TexturePageDemand> = Vec::with_capacity(textures.len());
        for texture in textures {
            let start = texture.pages_start_offset as usize;
            let end = start + texture.pages_count as usize;
            let Some(slice) = self.bytes.get(start..end) else {
                log::warn!(
                    "Demand buffer too small for texture {} range {}..{}",
                    texture.texture_id,
                    start,
                    end
                );
                continue;
            };
            let page_indices: Vec<u32> = slice
                .iter()
                .enumerate()
                .filter(|(_, &flag)| flag != 0)
                .map(|(local_index, _)| local_index as u32)
                .collect();
            demands.push(TexturePageDemand {
                texture_id: texture.texture_id,
                page_indices,
            });
        }
        demands
    }
}
