use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json in file {path}: {msg}")]
    Decode {
        path: String,
        msg:  String,
    },

    #[error("schema error for {oid}: {msg}")]
    Schema {
        oid: String,
        msg: String,
    },

    #[error("unresolved reference {0}")]
    UnresolvedReference(String),

    #[error("render error in {path}: {msg}")]
    Render {
        path: String,
        msg:  String,
    },
}

impl DaliError {
    /// Builds a `Schema` error naming the oid whose rule was broken.
    pub fn schema(oid: &str, msg: impl Into<String>) -> Self {
        DaliError::Schema {
            oid: oid.to_string(),
            msg: msg.into(),
        }
    }
}
