//! Digital-download editor for a product.

use bytebazaar_core::{DigitalDownload, ExternalBlob, Product};
use tracing::{info, instrument};

use crate::error::AdminError;
use crate::session::AdminSession;

/// Content type pre-filled in the editor.
pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// File selected for upload.
pub struct NewFile {
    pub bytes: Vec<u8>,
}

/// Editor state for a product's digital download.
pub struct DigitalDownloadDraft {
    pub content_type: String,
    /// Raw "download limit" field; empty means unlimited.
    pub download_limit: String,
    pub file: Option<NewFile>,
    on_progress: Option<Box<dyn Fn(u8) + Send + Sync>>,
}

impl DigitalDownloadDraft {
    /// Editor pre-filled from the product's current download, if any.
    #[must_use]
    pub fn for_product(product: &Product) -> Self {
        let current = product.digital_download.as_ref();
        Self {
            content_type: current.map_or_else(
                || DEFAULT_CONTENT_TYPE.to_string(),
                |d| d.content_type.clone(),
            ),
            download_limit: current
                .and_then(|d| d.download_limit)
                .map(|limit| limit.to_string())
                .unwrap_or_default(),
            file: None,
            on_progress: None,
        }
    }

    /// Select a file to upload.
    #[must_use]
    pub fn with_file(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.file = Some(NewFile {
            bytes: bytes.into(),
        });
        self
    }

    /// Observe upload progress (0-100) of the selected file.
    #[must_use]
    pub fn on_upload_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Build the download for `product`.
    ///
    /// A newly selected file wins over the product's existing one.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` if no file is available, the content
    /// type is empty, or the download limit is not a whole number.
    pub fn build(self, product: &Product) -> Result<DigitalDownload, AdminError> {
        let content_type = self.content_type.trim();
        let current = product.digital_download.as_ref();

        if self.file.is_none() && current.is_none() {
            return Err(AdminError::validation("Please select a file to upload"));
        }
        if content_type.is_empty() {
            return Err(AdminError::validation("Please enter a content type"));
        }

        let limit = self.download_limit.trim();
        let download_limit = if limit.is_empty() {
            None
        } else {
            Some(limit.parse::<u64>().map_err(|_| {
                AdminError::validation("Download limit must be a whole number")
            })?)
        };

        let (download_file, file_size_bytes) = match (self.file, current) {
            (Some(file), _) => {
                let size = file.bytes.len() as u64;
                let mut blob = ExternalBlob::from_bytes(file.bytes);
                if let Some(callback) = self.on_progress {
                    blob = blob.with_upload_progress(callback);
                }
                (blob, size)
            }
            (None, Some(existing)) => (existing.download_file.clone(), existing.file_size_bytes),
            (None, None) => return Err(AdminError::validation("No file available")),
        };

        Ok(DigitalDownload {
            content_type: content_type.to_string(),
            download_file,
            file_size_bytes,
            download_limit,
        })
    }
}

impl AdminSession {
    /// Attach or replace the product's digital download.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `SetupRequired`, or the store error.
    #[instrument(skip(self, product, draft), fields(product_id = %product.id))]
    pub async fn save_digital_download(
        &self,
        product: &Product,
        draft: DigitalDownloadDraft,
    ) -> Result<(), AdminError> {
        self.ensure_setup_complete().await?;
        let download = draft.build(product)?;
        let size = download.size_display();
        self.store()
            .set_digital_download(&product.id, download)
            .await?;
        info!(size = %size, "Digital download saved");
        Ok(())
    }

    /// Detach the product's digital download.
    ///
    /// # Errors
    ///
    /// Returns `SetupRequired` or the store error.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn remove_digital_download(&self, product: &Product) -> Result<(), AdminError> {
        self.ensure_setup_complete().await?;
        self.store().remove_digital_download(&product.id).await?;
        info!("Digital download removed");
        Ok(())
    }
}
