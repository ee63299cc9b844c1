#[derive(Debug)]
pub enum Error {
    Sync(Option<String>),
}

pub type Result<T> = std::result::Result<T, Error>;
