use huddle_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("stored conversation `{id}` is corrupt: {source}")]
    CorruptConversation {
        id: String,
        #[source]
        source: huddle_routing::Error,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

huddle_common::impl_context!();
