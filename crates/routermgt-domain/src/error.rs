use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),

    #[error("Invalid page request: {0}")]
    InvalidPageRequest(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
