//! The caller's download library.

use std::collections::HashSet;

use bytebazaar_core::{DigitalPurchase, Product};

use crate::cache::Query;
use crate::error::StoreError;
use crate::store::Storefront;

/// One owned digital product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    pub product: Product,
    pub purchase: DigitalPurchase,
    /// Direct download URL.
    pub url: String,
}

impl DownloadEntry {
    /// Downloads used against the ceiling (e.g. "3 / 10").
    #[must_use]
    pub fn usage(&self) -> String {
        format!(
            "{} / {}",
            self.purchase.download_count, self.purchase.allowed_downloads
        )
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.purchase.remaining()
    }

    /// File size as megabytes, if the product still carries a download.
    #[must_use]
    pub fn size_display(&self) -> Option<String> {
        self.product
            .digital_download
            .as_ref()
            .map(bytebazaar_core::DigitalDownload::size_display)
    }
}

/// Pair purchases with products that still carry a download.
///
/// The first purchase of a product wins.
#[must_use]
pub fn entries(purchases: &[DigitalPurchase], products: &[Product]) -> Vec<DownloadEntry> {
    let mut seen = HashSet::new();
    purchases
        .iter()
        .filter(|purchase| seen.insert(purchase.product_id.clone()))
        .filter_map(|purchase| {
            let product = products.iter().find(|p| p.id == purchase.product_id)?;
            let download = product.digital_download.as_ref()?;
            Some(DownloadEntry {
                product: product.clone(),
                purchase: purchase.clone(),
                url: download.download_file.direct_url().into_owned(),
            })
        })
        .collect()
}

/// The signed-in caller's downloads.
///
/// The status reflects the least complete of the two underlying reads.
///
/// # Errors
///
/// Returns `StoreError::Unauthenticated` for anonymous callers.
pub async fn library(store: &Storefront) -> Result<Query<Vec<DownloadEntry>>, StoreError> {
    if store.identity().is_none() {
        return Err(StoreError::Unauthenticated);
    }

    let purchases = store.user_digital_purchases().await;
    let products = store.products().await;

    let status = if purchases.is_fetched() {
        products.status
    } else {
        purchases.status
    };

    Ok(Query {
        data: entries(&purchases.data, &products.data),
        status,
    })
}
