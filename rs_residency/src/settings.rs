use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VirtualTextureSettings {
    pub is_enable: bool,
    pub feed_back_texture_div: u32,
    /// Upper bound on simultaneously resident pages across all virtual
    /// textures. Exceeding it triggers least recently used eviction.
    pub resident_page_budget: u32,
}

impl Default for VirtualTextureSettings {
    fn default() -> Self {
        Self {
            is_enable: true,
            feed_back_texture_div: 10,
            resident_page_budget: 2048,
        }
    }
}
