#[derive(Debug)]
pub enum Error {
    Artifact(rs_tiled_texture::error::Error, Option<String>),
    TextureNotFound(u32),
    TooManyMipLevels(u32),
    Binder(Option<String>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(format!("{:?}", self).as_ref())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
