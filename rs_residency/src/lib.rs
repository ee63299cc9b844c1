pub mod binder;
pub mod constants;
pub mod demand;
pub mod error;
pub mod marking;
pub mod material;
pub mod misc;
pub mod residency;
pub mod settings;
pub mod virtual_texture;
