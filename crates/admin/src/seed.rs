//! Demo catalog seeder.
//!
//! Adds the demo categories and products that are not present yet (matched
//! by id), then sets the demo hero banner and brand story. Writes are
//! sequential; seeding twice adds nothing the second time.

use bytebazaar_core::{
    BrandStory, Category, CategoryId, ExternalBlob, HeroBanner, Product, ProductId,
};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::error::AdminError;
use crate::session::AdminSession;

/// Result of a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    /// Number of categories added.
    pub categories_added: usize,
    /// Number of products added.
    pub products_added: usize,
    /// Number of categories and products skipped (already exist).
    pub skipped: usize,
}

/// (id, name, description)
const DEMO_CATEGORIES: [(&str, &str, &str); 4] = [
    (
        "digital-art",
        "Digital Art",
        "Stunning digital artwork and illustrations",
    ),
    (
        "e-books",
        "E-books",
        "Educational and inspiring digital books",
    ),
    (
        "templates",
        "Templates",
        "Professional templates for various needs",
    ),
    (
        "kids-worksheets",
        "Kids Worksheets",
        "Educational worksheets for children",
    ),
];

struct DemoProduct {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    /// Paise
    price_cents: u64,
    category: &'static str,
    featured: bool,
    image: &'static str,
}

const DEMO_PRODUCTS: [DemoProduct; 7] = [
    DemoProduct {
        id: "product-digital-art-abstract",
        name: "Abstract Digital Art Collection",
        description: "A stunning collection of abstract digital artworks featuring vibrant colors and modern designs. Perfect for digital displays and creative projects.",
        price_cents: 399_900,
        category: "digital-art",
        featured: true,
        image: "/assets/generated/digital-art-abstract.dim_400x400.png",
    },
    DemoProduct {
        id: "product-digital-art-landscape",
        name: "Digital Landscape Masterpiece",
        description: "Breathtaking digital landscape art that brings nature to your screen. High-resolution artwork suitable for prints and digital use.",
        price_cents: 479_900,
        category: "digital-art",
        featured: false,
        image: "/assets/generated/digital-art-landscape.dim_400x400.png",
    },
    DemoProduct {
        id: "product-ebook-business-guide",
        name: "Complete Business Growth Guide",
        description: "Comprehensive e-book covering essential strategies for scaling your business in India. Includes case studies, actionable tips, and expert insights.",
        price_cents: 239_900,
        category: "e-books",
        featured: true,
        image: "/assets/generated/ebook-business-guide.dim_400x400.png",
    },
    DemoProduct {
        id: "product-ebook-creative-design",
        name: "Creative Design Principles",
        description: "Master the fundamentals of creative design with this in-depth e-book. Learn color theory, composition, and modern design trends.",
        price_cents: 279_900,
        category: "e-books",
        featured: false,
        image: "/assets/generated/ebook-creative-design.dim_400x400.png",
    },
    DemoProduct {
        id: "product-template-website-modern",
        name: "Modern Website Template Pack",
        description: "Professional website templates with clean, modern designs. Fully responsive and easy to customize for any business or portfolio.",
        price_cents: 639_900,
        category: "templates",
        featured: true,
        image: "/assets/generated/template-website-modern.dim_400x400.png",
    },
    DemoProduct {
        id: "product-template-social-media",
        name: "Social Media Template Bundle",
        description: "Complete social media template bundle with designs for Instagram, Facebook, Twitter, and LinkedIn. Save time and maintain brand consistency.",
        price_cents: 319_900,
        category: "templates",
        featured: false,
        image: "/assets/generated/template-social-media.dim_400x400.png",
    },
    DemoProduct {
        id: "product-kids-worksheets-bundle",
        name: "11000+ Kids Worksheets Bundle",
        description: "Comprehensive collection of over 11,000 educational worksheets for children covering math, science, language arts, and more. Perfect for parents, teachers, and homeschoolers. Includes printable PDFs organized by grade level and subject.",
        price_cents: 499_900,
        category: "kids-worksheets",
        featured: true,
        image: "/assets/generated/ebook-creative-design.dim_400x400.png",
    },
];

const BRAND_STORY: &str = "At Byte Bazaar, we believe in empowering Indian creators and entrepreneurs with high-quality digital products. Our curated collection features stunning digital art, insightful e-books, and professional templates designed to elevate your projects.

As part of the Digital India initiative, we're committed to supporting the growth of India's digital ecosystem. Every product in our store is carefully selected to ensure it meets our standards of excellence.

Whether you're looking to enhance your creative work, learn new skills, or streamline your business processes, we have something special for you. Join thousands of satisfied customers across India who have transformed their digital presence with our premium products.";

/// Demo categories.
#[must_use]
pub fn demo_categories() -> Vec<Category> {
    DEMO_CATEGORIES
        .iter()
        .map(|(id, name, description)| Category {
            id: CategoryId::new(*id),
            name: (*name).to_string(),
            description: (*description).to_string(),
        })
        .collect()
}

/// Demo products created at `now`.
#[must_use]
pub fn demo_products(now: DateTime<Utc>) -> Vec<Product> {
    DEMO_PRODUCTS
        .iter()
        .map(|demo| Product {
            id: ProductId::new(demo.id),
            name: demo.name.to_string(),
            description: demo.description.to_string(),
            price_cents: demo.price_cents,
            category: CategoryId::new(demo.category),
            featured: demo.featured,
            created_at: now,
            images: vec![ExternalBlob::from_url(demo.image)],
            digital_download: None,
        })
        .collect()
}

#[must_use]
pub fn demo_hero_banner() -> HeroBanner {
    HeroBanner {
        title: "Welcome to Byte Bazaar".to_string(),
        subtitle: "Discover Premium Digital Products for Indian Creators and Entrepreneurs"
            .to_string(),
        background_image: Some(ExternalBlob::from_url(
            "/assets/generated/hero-banner-vibrant.dim_1200x600.jpg",
        )),
    }
}

#[must_use]
pub fn demo_brand_story() -> BrandStory {
    BrandStory {
        title: "Our Story".to_string(),
        content: BRAND_STORY.to_string(),
        hero_image: Some(ExternalBlob::from_url(
            "/assets/generated/brand-story-vibrant.dim_800x600.jpg",
        )),
    }
}

impl AdminSession {
    /// Whether the catalog already holds at least the demo data's size.
    pub async fn demo_seeded(&self) -> bool {
        let products = self.store().products().await.data;
        let categories = self.store().categories().await.data;
        products.len() >= DEMO_PRODUCTS.len() && categories.len() >= DEMO_CATEGORIES.len()
    }

    /// Seed the demo catalog and homepage content.
    ///
    /// Stops at the first failed write; entries written before it stay.
    ///
    /// # Errors
    ///
    /// Returns `SetupRequired`, or the store error of the failed write.
    #[instrument(skip(self))]
    pub async fn seed_demo_catalog(&self) -> Result<SeedResult, AdminError> {
        self.ensure_setup_complete().await?;

        let store = self.store();
        let existing_categories = store.categories().await.data;
        let existing_products = store.products().await.data;
        let mut result = SeedResult::default();

        // Categories first so products can reference them
        for category in demo_categories() {
            if existing_categories.iter().any(|c| c.id == category.id) {
                result.skipped += 1;
                continue;
            }
            store.add_category(category).await?;
            result.categories_added += 1;
        }

        for product in demo_products(Utc::now()) {
            if existing_products.iter().any(|p| p.id == product.id) {
                result.skipped += 1;
                continue;
            }
            store.add_product(product).await?;
            result.products_added += 1;
        }

        store.set_hero_banner(demo_hero_banner()).await?;
        store.set_brand_story(demo_brand_story()).await?;

        info!(
            categories_added = result.categories_added,
            products_added = result.products_added,
            skipped = result.skipped,
            "Demo data seeded"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalog_shape() {
        let products = demo_products(Utc::now());
        assert_eq!(products.len(), 7);
        assert_eq!(demo_categories().len(), 4);
        assert_eq!(products.iter().filter(|p| p.featured).count(), 4);

        let categories: Vec<_> = demo_categories().into_iter().map(|c| c.id).collect();
        assert!(products.iter().all(|p| categories.contains(&p.category)));

        let cheapest = products.iter().map(|p| p.price_cents).min();
        assert_eq!(cheapest, Some(239_900));
    }
}
