//! Catalog entities: products, categories, homepage content.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::blob::ExternalBlob;
use super::id::{CategoryId, ProductId};
use super::price::{CurrencyCode, Price};

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Price in minor currency units.
    pub price_cents: u64,
    /// Category the product belongs to.
    pub category: CategoryId,
    /// Shown in the homepage's featured section.
    pub featured: bool,
    /// Backend timestamp (nanoseconds since the Unix epoch on the wire).
    #[serde(with = "chrono::serde::ts_nanoseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<ExternalBlob>,
    /// Downloadable file delivered after purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digital_download: Option<DigitalDownload>,
}

impl Product {
    /// Whether purchasing the product grants a download entitlement.
    #[must_use]
    pub const fn is_digital(&self) -> bool {
        self.digital_download.is_some()
    }

    /// Price in the given checkout currency.
    #[must_use]
    pub const fn price(&self, currency: CurrencyCode) -> Price {
        Price::from_minor_units(self.price_cents, currency)
    }

    /// URL of the first product image, if any.
    #[must_use]
    pub fn primary_image_url(&self) -> Option<Cow<'_, str>> {
        self.images.first().map(ExternalBlob::direct_url)
    }
}

/// Downloadable file attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalDownload {
    /// MIME type of the file (e.g. `application/pdf`).
    pub content_type: String,
    pub download_file: ExternalBlob,
    pub file_size_bytes: u64,
    /// Maximum number of downloads per purchase; `None` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_limit: Option<u64>,
}

impl DigitalDownload {
    /// File size rendered in megabytes (e.g. "2.50 MB").
    #[must_use]
    pub fn size_display(&self) -> String {
        format_megabytes(self.file_size_bytes)
    }
}

/// Render a byte count as megabytes with two decimals.
#[must_use]
pub fn format_megabytes(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)] // Display only
    let megabytes = bytes as f64 / 1024.0 / 1024.0;
    format!("{megabytes:.2} MB")
}

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
}

/// Homepage hero banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HeroBanner {
    pub title: String,
    pub subtitle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<ExternalBlob>,
}

/// Homepage brand story section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrandStory {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_image: Option<ExternalBlob>,
}

/// Everything the homepage renders, including the featured products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HomepageContent {
    pub hero_banner: HeroBanner,
    pub brand_story: BrandStory,
    #[serde(default)]
    pub featured_products: Vec<Product>,
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_wire_format() {
        let json = r#"{
            "id": "product-ebook",
            "name": "Business Guide",
            "description": "A guide",
            "priceCents": 239900,
            "category": "e-books",
            "featured": true,
            "createdAt": 1700000000000000000,
            "images": [{"url": "/assets/ebook.png"}],
            "digitalDownload": {
                "contentType": "application/pdf",
                "downloadFile": {"url": "https://files.example.com/guide.pdf"},
                "fileSizeBytes": 2621440
            }
        }"#;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "product-ebook");
        assert_eq!(product.created_at.timestamp(), 1_700_000_000);
        assert!(product.is_digital());
        assert_eq!(product.primary_image_url().unwrap(), "/assets/ebook.png");

        let download = product.digital_download.as_ref().unwrap();
        assert_eq!(download.download_limit, None);
        assert_eq!(download.size_display(), "2.50 MB");
        assert_eq!(product.price(CurrencyCode::INR).display(), "₹2399.00");
    }

    #[test]
    fn test_product_without_download_omits_field() {
        let product = Product {
            id: ProductId::new("p"),
            name: "Physical".to_string(),
            description: String::new(),
            price_cents: 100,
            category: CategoryId::new("c"),
            featured: false,
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            images: vec![],
            digital_download: None,
        };
        let json = serde_json::to_string(&product).unwrap();
        assert!(!json.contains("digitalDownload"));
        assert!(product.primary_image_url().is_none());
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(0), "0.00 MB");
        assert_eq!(format_megabytes(1_048_576), "1.00 MB");
    }
}
