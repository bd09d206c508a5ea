use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Owner id must not be empty")]
    EmptyOwnerId,

    #[error("Owner already registered: {0}")]
    DuplicateOwner(String),
}
