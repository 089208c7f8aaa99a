mod context;
mod product;
mod seed;

use std::collections::BTreeSet;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use crate::error::CatalogError;

pub use context::{
    build_context, context_line, parse_context_entries, MAX_CONTEXT_PRODUCTS,
    MAX_DESCRIPTION_CHARS,
};
pub use product::{Category, Product};
pub use seed::seed_products;

/// Read-only product snapshot with a lazily built prompt context.
///
/// The context string and fingerprint are derived once per snapshot; `replace`
/// is the only way to change the products and it drops both caches with them.
#[derive(Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
    context: OnceLock<String>,
    fingerprint: OnceLock<String>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        validate(&products)?;
        Ok(Self {
            products,
            context: OnceLock::new(),
            fingerprint: OnceLock::new(),
        })
    }

    pub fn seeded() -> Self {
        Self {
            products: seed_products(),
            context: OnceLock::new(),
            fingerprint: OnceLock::new(),
        }
    }

    pub fn products(&self) -> &[Product] {
        self.products.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn in_stock(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|product| product.in_stock())
    }

    pub fn context(&self) -> &str {
        self.context
            .get_or_init(|| build_context(&self.products))
            .as_str()
    }

    pub fn replace(&mut self, products: Vec<Product>) -> Result<(), CatalogError> {
        validate(&products)?;
        self.products = products;
        self.context = OnceLock::new();
        self.fingerprint = OnceLock::new();
        Ok(())
    }

    pub fn fingerprint(&self) -> &str {
        self.fingerprint
            .get_or_init(|| {
                let bytes = serde_json::to_vec(&self.products).unwrap_or_default();
                let mut hasher = Sha256::new();
                hasher.update(bytes);
                hex::encode(&hasher.finalize()[..8])
            })
            .as_str()
    }
}

fn validate(products: &[Product]) -> Result<(), CatalogError> {
    let mut seen = BTreeSet::new();
    for product in products {
        if product.name.trim().is_empty() {
            return Err(CatalogError::EmptyName { id: product.id });
        }
        if product.price == 0 {
            return Err(CatalogError::InvalidPrice {
                name: product.name.clone(),
            });
        }
        if !(0.0..=5.0).contains(&product.rating) {
            return Err(CatalogError::InvalidRating {
                name: product.name.clone(),
                rating: product.rating,
            });
        }
        if !seen.insert(product.id) {
            return Err(CatalogError::DuplicateId { id: product.id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy(id: u32, name: &str, price: u32) -> Product {
        Product {
            id,
            name: name.to_string(),
            category: Category::Gifts,
            price,
            original_price: None,
            rating: 4.0,
            reviews: 10,
            stock: 1,
            badge: None,
            description: None,
        }
    }

    #[test]
    fn new_rejects_zero_price_and_duplicate_ids() {
        assert_eq!(
            Catalog::new(vec![toy(1, "Free Thing", 0)]).err(),
            Some(CatalogError::InvalidPrice {
                name: "Free Thing".to_string()
            })
        );
        assert_eq!(
            Catalog::new(vec![toy(1, "A", 10), toy(1, "B", 20)]).err(),
            Some(CatalogError::DuplicateId { id: 1 })
        );
    }

    #[test]
    fn seed_catalog_passes_validation() {
        assert!(Catalog::new(seed_products()).is_ok());
        assert!(!Catalog::seeded().is_empty());
    }

    #[test]
    fn context_and_fingerprint_are_cached_until_replace() -> anyhow::Result<()> {
        let mut catalog = Catalog::new(vec![toy(1, "Kite", 300)])?;
        let first = catalog.context() as *const str;
        let second = catalog.context() as *const str;
        assert_eq!(first, second);
        assert!(catalog.context().contains("Kite"));
        let before = catalog.fingerprint().to_string();
        assert_eq!(
            catalog.fingerprint() as *const str,
            catalog.fingerprint() as *const str
        );

        catalog.replace(vec![toy(2, "Yo-yo", 150)])?;
        assert!(catalog.context().contains("Yo-yo"));
        assert!(!catalog.context().contains("Kite"));
        assert_ne!(catalog.fingerprint(), before);
        Ok(())
    }
}
