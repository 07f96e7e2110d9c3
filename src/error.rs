use thiserror::Error;

use crate::sound::SoundClass;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no reference track for sound {0}")]
    MissingReference(SoundClass),
}

pub type Result<T> = std::result::Result<T, Error>;
