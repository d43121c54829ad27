use thiserror::Error;

/// Configuration errors raised while constructing components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("on threshold ({on}) must be greater than off threshold ({off})")]
    InvalidThresholds { on: u16, off: u16 },

    #[error("string does not fit in {capacity} bytes")]
    Capacity { capacity: usize },

    #[error("analog front end initialisation failed")]
    AnalogInit,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Copies `s` into a bounded string, failing if it is too long.
pub(crate) fn bounded<const N: usize>(s: &str) -> Result<heapless::String<N>> {
    heapless::String::try_from(s).map_err(|_| Error::Capacity { capacity: N })
}
