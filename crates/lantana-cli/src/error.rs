//! Error type for the `lantana` binary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bundle engine error
    #[error(transparent)]
    Core(#[from] lantana_core::Error),

    /// `--peace-bond` argument not of the form ID:NAME:TYPE
    #[error("invalid peace bond {input:?}: expected ID:NAME:TYPE (TYPE may contain colons, ID and NAME may not)")]
    InvalidPeaceBond { input: String },
}

impl Error {
    /// True when different command-line input could succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Core(e) => e.is_recoverable(),
            Error::InvalidPeaceBond { .. } => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
