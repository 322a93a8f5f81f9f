use thiserror::Error;

pub type Result<T> = std::result::Result<T, MergeError>;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Entity error: {0}")]
    Entities(#[from] graft_entities::EntityError),

    #[error("File store error for {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl MergeError {
    pub fn store(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Store {
            path: path.into(),
            source,
        }
    }
}
