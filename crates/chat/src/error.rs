use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Strict-mode validation or invariant failure.
    #[error(transparent)]
    Routing(#[from] huddle_routing::Error),

    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    #[must_use]
    pub fn store(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
