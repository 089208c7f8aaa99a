use super::product::Product;

pub const MAX_CONTEXT_PRODUCTS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 160;

pub fn context_line(product: &Product) -> String {
    let mut line = format!("{} (₹{}", product.name, product.price);
    if let Some(original) = product.original_price {
        line.push_str(&format!(", was ₹{original}"));
    }
    line.push(')');
    line.push_str(&format!(" | Category: {}", product.category));
    line.push_str(&format!(
        " | Rating: {:.1}★ ({} reviews)",
        product.rating, product.reviews
    ));
    if product.in_stock() {
        line.push_str(&format!(" | Stock: {} available", product.stock));
    } else {
        line.push_str(" | Stock: Out of stock");
    }
    if let Some(badge) = product.badge.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        line.push_str(&format!(" | Badge: {badge}"));
    }
    if let Some(description) = product
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        line.push_str(&format!(
            " | Description: {}",
            clamp_chars(&single_line(description), MAX_DESCRIPTION_CHARS)
        ));
    }
    line
}

/// Serialize the catalog, in iteration order, into the prompt context block.
///
/// Only the first `MAX_CONTEXT_PRODUCTS` products are listed, so
/// `parse_context_entries` recovers every product only for catalogs within
/// that bound.
pub fn build_context(products: &[Product]) -> String {
    products
        .iter()
        .take(MAX_CONTEXT_PRODUCTS)
        .map(context_line)
        .collect::<Vec<String>>()
        .join("\n")
}

/// Recover `(name, price)` pairs from a block produced by [`build_context`].
pub fn parse_context_entries(block: &str) -> Vec<(String, u32)> {
    block
        .lines()
        .filter_map(|line| {
            // The category field always follows the price, and names may
            // themselves contain " | ".
            let (head, _) = line.split_once(" | Category: ")?;
            let (name, tail) = head.rsplit_once(" (₹")?;
            let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
            let price = digits.parse::<u32>().ok()?;
            Some((name.to_string(), price))
        })
        .collect()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn clamp_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::catalog::{seed_products, Category};

    fn elephant() -> Product {
        Product {
            id: 2,
            name: "Cuddly Elephant".to_string(),
            category: Category::Plushies,
            price: 1699,
            original_price: Some(1999),
            rating: 4.9,
            reviews: 518,
            stock: 3,
            badge: Some("Most Loved".to_string()),
            description: Some("Soft   grey\nplush".to_string()),
        }
    }

    #[test]
    fn line_carries_every_optional_field() {
        assert_eq!(
            context_line(&elephant()),
            "Cuddly Elephant (₹1699, was ₹1999) | Category: Plushies | Rating: 4.9★ (518 reviews) | Stock: 3 available | Badge: Most Loved | Description: Soft grey plush"
        );
    }

    #[test]
    fn line_marks_out_of_stock_and_skips_missing_fields() {
        let mut product = elephant();
        product.stock = 0;
        product.original_price = None;
        product.badge = None;
        product.description = None;
        assert_eq!(
            context_line(&product),
            "Cuddly Elephant (₹1699) | Category: Plushies | Rating: 4.9★ (518 reviews) | Stock: Out of stock"
        );
    }

    #[test]
    fn long_descriptions_are_clamped() {
        let mut product = elephant();
        product.description = Some("x".repeat(400));
        let line = context_line(&product);
        let description = line.rsplit("Description: ").next().unwrap_or_default();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(description.ends_with('…'));
    }

    #[test]
    fn context_round_trips_names_and_prices() {
        let products = seed_products();
        let parsed: BTreeSet<(String, u32)> =
            parse_context_entries(&build_context(&products)).into_iter().collect();
        let expected: BTreeSet<(String, u32)> = products
            .iter()
            .map(|product| (product.name.clone(), product.price))
            .collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn names_with_parentheses_survive_parsing() {
        let mut product = elephant();
        product.name = "Blocks (Set of 20)".to_string();
        let parsed = parse_context_entries(&build_context(&[product]));
        assert_eq!(parsed, vec![("Blocks (Set of 20)".to_string(), 1699)]);
    }

    #[test]
    fn names_with_field_separators_survive_parsing() {
        let mut product = elephant();
        product.name = "Blocks | Deluxe".to_string();
        let parsed = parse_context_entries(&build_context(&[product]));
        assert_eq!(parsed, vec![("Blocks | Deluxe".to_string(), 1699)]);
    }

    #[test]
    fn context_keeps_catalog_order_and_bound() {
        let mut products = Vec::new();
        for id in 0..(MAX_CONTEXT_PRODUCTS as u32 + 5) {
            let mut product = elephant();
            product.id = id;
            product.name = format!("Toy {id}");
            products.push(product);
        }
        let block = build_context(&products);
        assert_eq!(block.lines().count(), MAX_CONTEXT_PRODUCTS);
        assert!(block.lines().next().unwrap_or_default().starts_with("Toy 0 "));
    }
}
