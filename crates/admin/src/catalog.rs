//! Product and category forms.

use bytebazaar_core::{Category, CategoryId, ExternalBlob, Product, ProductId};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use tracing::{info, instrument};

use crate::error::AdminError;
use crate::session::AdminSession;

/// New-product form.
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    /// Price in major units as typed (e.g. "39.99").
    pub price: String,
    pub category: String,
    pub featured: bool,
    pub image: Option<ExternalBlob>,
}

impl ProductDraft {
    /// Validate the form into a product created at `now`.
    ///
    /// The id is derived from the creation time in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` if a required field is empty or the
    /// price is not a non-negative amount.
    pub fn build(self, now: DateTime<Utc>) -> Result<Product, AdminError> {
        let required = [&self.name, &self.description, &self.price, &self.category];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(AdminError::validation("Please fill in all required fields"));
        }

        Ok(Product {
            id: ProductId::new(format!("product-{}", now.timestamp_millis())),
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price_cents: parse_price_cents(&self.price)?,
            category: CategoryId::new(self.category.trim()),
            featured: self.featured,
            created_at: now,
            images: self.image.into_iter().collect(),
            digital_download: None,
        })
    }
}

/// Convert a major-unit price to minor units, rounding halves up.
///
/// # Errors
///
/// Returns `AdminError::Validation` for unparsable, negative or
/// out-of-range amounts.
pub fn parse_price_cents(raw: &str) -> Result<u64, AdminError> {
    let invalid = || AdminError::validation("Please enter a valid price");

    let amount: Decimal = raw.trim().parse().map_err(|_| invalid())?;
    if amount.is_sign_negative() {
        return Err(invalid());
    }
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(invalid)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(invalid)
}

/// New-category form.
#[derive(Debug, Clone, Default)]
pub struct CategoryDraft {
    pub name: String,
    pub description: String,
}

impl CategoryDraft {
    /// Validate the form. The id is the lower-cased name with whitespace
    /// runs replaced by `-`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` if the name is empty.
    pub fn build(self) -> Result<Category, AdminError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AdminError::validation("Please enter a category name"));
        }

        Ok(Category {
            id: CategoryId::new(slugify(name)),
            name: name.to_string(),
            description: self.description,
        })
    }
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

impl AdminSession {
    /// Add a product from the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `SetupRequired`, or the store error.
    #[instrument(skip_all)]
    pub async fn add_product(&self, draft: ProductDraft) -> Result<Product, AdminError> {
        self.ensure_setup_complete().await?;
        let product = draft.build(Utc::now())?;
        self.store().add_product(product.clone()).await?;
        info!(product_id = %product.id, "Product added");
        Ok(product)
    }

    /// Add a category from the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `SetupRequired`, or the store error.
    #[instrument(skip_all)]
    pub async fn add_category(&self, draft: CategoryDraft) -> Result<Category, AdminError> {
        self.ensure_setup_complete().await?;
        let category = draft.build()?;
        self.store().add_category(category.clone()).await?;
        info!(category_id = %category.id, "Category added");
        Ok(category)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `SetupRequired` or the store error.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), AdminError> {
        self.ensure_setup_complete().await?;
        self.store().delete_product(product_id).await?;
        info!("Product deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_cents() {
        assert_eq!(parse_price_cents("39.99").unwrap(), 3999);
        assert_eq!(parse_price_cents(" 3999 ").unwrap(), 399_900);
        assert_eq!(parse_price_cents("0.005").unwrap(), 1);
        assert_eq!(parse_price_cents("0.004").unwrap(), 0);
        assert!(parse_price_cents("-1").is_err());
        assert!(parse_price_cents("abc").is_err());
    }

    #[test]
    fn test_parse_price_cents_out_of_range() {
        let err = parse_price_cents("79228162514264337593543950335").unwrap_err();
        assert_eq!(err.user_message(), "Please enter a valid price");
        assert!(parse_price_cents("184467440737095516.16").is_err());
    }

    #[test]
    fn test_product_draft() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let draft = ProductDraft {
            name: "Planner".to_string(),
            description: "Weekly planner".to_string(),
            price: "12.50".to_string(),
            category: "templates".to_string(),
            featured: true,
            image: Some(ExternalBlob::from_url("/assets/planner.png")),
        };

        let product = draft.build(now).unwrap();
        assert_eq!(product.id, "product-1700000000000");
        assert_eq!(product.price_cents, 1250);
        assert_eq!(product.images.len(), 1);
        assert!(!product.is_digital());

        let err = ProductDraft::default().build(now).unwrap_err();
        assert_eq!(err.user_message(), "Please fill in all required fields");
    }

    #[test]
    fn test_category_draft() {
        let category = CategoryDraft {
            name: "  Kids   Worksheets ".to_string(),
            description: "For children".to_string(),
        }
        .build()
        .unwrap();
        assert_eq!(category.id, "kids-worksheets");
        assert_eq!(category.name, "Kids   Worksheets");

        assert!(CategoryDraft::default().build().is_err());
    }
}
