//! Catalog browsing: search text and category narrowing over the product list.

use bytebazaar_core::{CategoryId, Product};

use crate::cache::Query;
use crate::store::Storefront;

/// Category selector value meaning "no narrowing".
pub const ALL_CATEGORIES: &str = "all";

/// Active shop filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    /// Case-insensitive text matched against name and description.
    pub query: String,
    /// `None` shows every category.
    pub category: Option<CategoryId>,
}

impl CatalogFilter {
    /// Build from the raw search box and category selector values.
    #[must_use]
    pub fn new(query: impl Into<String>, category: &str) -> Self {
        let category = category.trim();
        Self {
            query: query.into(),
            category: (!category.is_empty() && category != ALL_CATEGORIES)
                .then(|| CategoryId::new(category)),
        }
    }

    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let needle = self.query.to_lowercase();
        let matches_search = product.name.to_lowercase().contains(&needle)
            || product.description.to_lowercase().contains(&needle);
        let matches_category = self
            .category
            .as_ref()
            .is_none_or(|category| product.category == *category);
        matches_search && matches_category
    }
}

/// Products matching both the search text and the category, in list order.
#[must_use]
pub fn filter_products(
    products: &[Product],
    query: &str,
    category: Option<&CategoryId>,
) -> Vec<Product> {
    let filter = CatalogFilter {
        query: query.to_string(),
        category: category.cloned(),
    };
    products
        .iter()
        .filter(|product| filter.matches(product))
        .cloned()
        .collect()
}

/// The cached product list narrowed by `filter`, keeping the read's status.
pub async fn browse(store: &Storefront, filter: &CatalogFilter) -> Query<Vec<Product>> {
    store.products().await.map(|products| {
        products
            .into_iter()
            .filter(|product| filter.matches(product))
            .collect()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytebazaar_core::ProductId;
    use chrono::DateTime;

    use super::*;

    fn product(id: &str, name: &str, description: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: description.to_string(),
            price_cents: 100,
            category: CategoryId::new(category),
            featured: false,
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            images: vec![],
            digital_download: None,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("p1", "Wedding Planner", "Printable planner", "templates"),
            product("p2", "Kids Worksheets", "Math and science PDFs", "education"),
            product("p3", "Business Guide", "An ebook on planning", "ebooks"),
        ]
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_ref()).collect()
    }

    #[test]
    fn test_search_is_case_insensitive_over_name_and_description() {
        let products = catalog();
        assert_eq!(ids(&filter_products(&products, "PLAN", None)), ["p1", "p3"]);
        assert_eq!(ids(&filter_products(&products, "science", None)), ["p2"]);
        assert_eq!(filter_products(&products, "", None).len(), 3);
        assert!(filter_products(&products, "poster", None).is_empty());
    }

    #[test]
    fn test_category_narrows_results() {
        let products = catalog();
        let ebooks = CategoryId::new("ebooks");
        assert_eq!(ids(&filter_products(&products, "plan", Some(&ebooks))), ["p3"]);
        assert!(filter_products(&products, "kids", Some(&ebooks)).is_empty());
    }

    #[test]
    fn test_filter_from_selector_values() {
        assert_eq!(CatalogFilter::new("x", "all").category, None);
        assert_eq!(CatalogFilter::new("x", "").category, None);
        assert_eq!(
            CatalogFilter::new("x", "education").category,
            Some(CategoryId::new("education"))
        );

        let filter = CatalogFilter::new("", "education");
        let products = catalog();
        let matched: Vec<_> = products.iter().filter(|p| filter.matches(p)).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "p2");
    }
}
