pub mod depth_texture;
pub mod error;
pub mod resolve_pass;
pub mod wgpu_binder;
