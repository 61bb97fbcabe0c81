use tokio::io::AsyncWriteExt as _;

use crate::{
    address::Address,
    archive::{self, Manifest},
    context::ExecutionContext,
    store::{Store, StoreError},
};

/// The remote store, reached over HTTP.
pub struct HttpStore<'a> {
    reqwest: reqwest::Client,
    ctx: &'a ExecutionContext,
}

impl<'a> HttpStore<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self {
            reqwest: reqwest::Client::new(),
            ctx,
        }
    }

    fn request(&self, method: reqwest::Method, address: &Address) -> reqwest::RequestBuilder {
        let request = self.reqwest.request(method, address.url.clone());
        if self.ctx.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.ctx.token)
        }
    }

    /// Send a request, returning `None` when the entry does not exist.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        method: reqwest::Method,
        address: &Address,
    ) -> Result<Option<reqwest::Response>, StoreError> {
        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        error_for_status(response, method, address).map(Some)
    }

    async fn put(&self, address: &Address, body: reqwest::Body) -> Result<(), StoreError> {
        let request = self.request(reqwest::Method::PUT, address).body(body);
        error_for_status(request.send().await?, reqwest::Method::PUT, address)?;

        tracing::debug!(%address, "uploaded");
        Ok(())
    }

    async fn fetch_manifest(&self, address: &Address) -> Result<Option<Manifest>, StoreError> {
        let request = self.request(reqwest::Method::GET, address);
        let Some(response) = self.send(request, reqwest::Method::GET, address).await? else {
            return Ok(None);
        };

        // An unreadable manifest only means the cache gets uploaded again.
        let body = response.bytes().await?;
        match Manifest::from_json(&body) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(error) => {
                tracing::warn!(%address, %error, "ignoring invalid cache manifest");
                Ok(None)
            }
        }
    }

    async fn download_archive(&self, address: &Address) -> Result<(), StoreError> {
        let zip_address = address.with_suffix(".zip", self.ctx)?;
        let request = self.request(reqwest::Method::GET, &zip_address);
        let Some(response) = self
            .send(request, reqwest::Method::GET, &zip_address)
            .await?
        else {
            tracing::info!(address = %zip_address, "cache not found in store");
            return Ok(());
        };

        let archive_file = tempfile::tempfile()?;
        let mut archive_file = tokio::fs::File::from_std(archive_file);
        write_body(response, &mut archive_file).await?;

        let mut archive_file = archive_file.into_std().await;
        std::io::Seek::rewind(&mut archive_file)?;

        let path = address.key.local_path(self.ctx);
        tokio::task::spawn_blocking(move || archive::extract(archive_file, &path))
            .await
            .map_err(std::io::Error::other)??;

        tracing::info!(address = %zip_address, "restored cache");
        Ok(())
    }

    async fn upload_archive(&self, address: &Address) -> Result<(), StoreError> {
        let path = address.key.local_path(self.ctx);
        let manifest = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || Manifest::for_path(&path))
                .await
                .map_err(std::io::Error::other)??
        };
        if manifest.is_empty() {
            tracing::warn!(%address, "cache contains no files");
        }

        let md5_address = address.with_suffix("_md5.json", self.ctx)?;
        if self.fetch_manifest(&md5_address).await?.as_ref() == Some(&manifest) {
            tracing::info!(%address, "cache unchanged, skipping upload");
            return Ok(());
        }

        let archive_file = tokio::task::spawn_blocking(move || {
            let mut archive_file = archive::compress(&path, tempfile::tempfile()?)?;
            std::io::Seek::rewind(&mut archive_file)?;
            Ok::<_, StoreError>(archive_file)
        })
        .await
        .map_err(std::io::Error::other)??;

        let zip_address = address.with_suffix(".zip", self.ctx)?;
        let archive_file = tokio::fs::File::from_std(archive_file);
        self.put(&zip_address, file_body(archive_file)).await?;
        self.put(&md5_address, manifest.to_json()?.into()).await?;

        tracing::info!(%address, files = manifest.len(), "uploaded cache");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for HttpStore<'_> {
    async fn download(&self, address: &Address, extract: bool) -> Result<(), StoreError> {
        if extract {
            return self.download_archive(address).await;
        }

        let response = self
            .request(reqwest::Method::GET, address)
            .send()
            .await?;
        let response = error_for_status(response, reqwest::Method::GET, address)?;

        let path = address.key.local_path(self.ctx);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path).await?;
        write_body(response, &mut file).await?;

        tracing::info!(%address, path = %path.display(), "downloaded");
        Ok(())
    }

    async fn upload(&self, address: &Address, compress: bool) -> Result<(), StoreError> {
        if compress {
            return self.upload_archive(address).await;
        }

        let path = address.key.local_path(self.ctx);
        let file = tokio::fs::File::open(&path).await?;
        self.put(address, file_body(file)).await?;

        tracing::info!(%address, path = %path.display(), "uploaded");
        Ok(())
    }

    async fn remove(&self, address: &Address) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::DELETE, address)
            .send()
            .await?;
        error_for_status(response, reqwest::Method::DELETE, address)?;

        tracing::debug!(%address, "removed");
        Ok(())
    }
}

fn error_for_status(
    response: reqwest::Response,
    method: reqwest::Method,
    address: &Address,
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StoreError::Http {
            method,
            address: address.url.clone(),
            status,
        })
    }
}

async fn write_body(
    mut response: reqwest::Response,
    file: &mut tokio::fs::File,
) -> Result<(), StoreError> {
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(())
}

fn file_body(file: tokio::fs::File) -> reqwest::Body {
    reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file))
}
