use crate::address::Address;

pub mod disk;
pub mod http;

/// A remote backend that can move entries in and out of the store.
#[async_trait::async_trait]
pub trait Store {
    /// Fetch the entry at `address` into its local path, extracting it when
    /// the entry is an archive.
    async fn download(&self, address: &Address, extract: bool) -> Result<(), StoreError>;

    /// Send the local path named by the address key to `address`,
    /// compressing it first when requested.
    async fn upload(&self, address: &Address, compress: bool) -> Result<(), StoreError>;

    async fn remove(&self, address: &Address) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("malformed address {address:?}")]
    MalformedAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to remove file from {address}")]
    Remove {
        address: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("{method} {address} returned {status}")]
    Http {
        method: reqwest::Method,
        address: url::Url,
        status: reqwest::StatusCode,
    },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn remove(address: impl std::fmt::Display, source: StoreError) -> Self {
        Self::Remove {
            address: address.to_string(),
            source: Box::new(source),
        }
    }
}
