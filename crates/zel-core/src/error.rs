#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("layer registry is frozen, cannot register `{0}`")]
    RegistryFrozen(String),

    #[error("no usable driver: {0}")]
    NoDriver(String),

    #[error("loader has been torn down")]
    TornDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
