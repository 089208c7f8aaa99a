use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Educational,
    #[serde(rename = "Outdoor Fun")]
    OutdoorFun,
    Plushies,
    #[serde(rename = "Arts & Crafts")]
    ArtsAndCrafts,
    Robots,
    Gifts,
}

impl Category {
    /// The fixed category vocabulary, in table order.
    pub const ALL: [Category; 6] = [
        Category::Educational,
        Category::OutdoorFun,
        Category::Plushies,
        Category::ArtsAndCrafts,
        Category::Robots,
        Category::Gifts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Educational => "Educational",
            Category::OutdoorFun => "Outdoor Fun",
            Category::Plushies => "Plushies",
            Category::ArtsAndCrafts => "Arts & Crafts",
            Category::Robots => "Robots",
            Category::Gifts => "Gifts",
        }
    }

    pub fn parse(raw: &str) -> Option<Category> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(" and ", " & ")
            .split_whitespace()
            .collect::<Vec<&str>>()
            .join(" ");
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().to_ascii_lowercase() == normalized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub category: Category,
    /// Whole rupees.
    pub price: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<u32>,
    pub rating: f32,
    #[serde(default)]
    pub reviews: u32,
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn popularity(&self) -> f64 {
        f64::from(self.rating) * f64::from(self.reviews)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn category_parse_is_lenient_about_case_and_conjunctions() {
        assert_eq!(Category::parse("plushies"), Some(Category::Plushies));
        assert_eq!(Category::parse(" Arts and Crafts "), Some(Category::ArtsAndCrafts));
        assert_eq!(Category::parse("outdoor   fun"), Some(Category::OutdoorFun));
        assert_eq!(Category::parse("Dolls"), None);
    }

    #[test]
    fn product_deserializes_storefront_json() -> anyhow::Result<()> {
        let product: Product = serde_json::from_value(json!({
            "id": 7,
            "name": "Paint Party Set",
            "category": "Arts & Crafts",
            "price": 899,
            "originalPrice": 1099,
            "rating": 4.5,
            "reviews": 120,
            "stock": 0
        }))?;
        assert_eq!(product.category, Category::ArtsAndCrafts);
        assert_eq!(product.original_price, Some(1099));
        assert!(!product.in_stock());
        assert_eq!(product.badge, None);
        Ok(())
    }
}
