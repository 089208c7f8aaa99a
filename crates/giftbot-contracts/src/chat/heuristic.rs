//! Offline reply generation over the product catalog.
//!
//! Branches are mutually exclusive and checked in a fixed order:
//! price-bound, category, age, greeting, thanks, best/popular, shipping,
//! then the default top-rated list. Language only selects the template set.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::catalog::{Catalog, Category, Product};
use crate::chat::normalize::Language;
use crate::chat::templates::{fill, templates};

pub const DEFAULT_RECOMMENDED: [Category; 3] =
    [Category::Educational, Category::Plushies, Category::Gifts];
pub const MAX_RECOMMENDED: usize = 4;

const TOP_N: usize = 3;

static PRICE_CEILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:under|below|within|budget|less\s+than|up\s*to|max(?:imum)?)\s*(?:of\s*)?(?:₹|rs\.?|inr)?\s*(\d[\d,]*)",
    )
    .expect("valid price pattern")
});

static STATED_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})\s*(?:\+|(?:-|to)\s*\d{1,2})?\s*(?:years?|yrs?|yo|y/o)\b|\baged?\s*(\d{1,2})\b",
    )
    .expect("valid age pattern")
});

static STATED_MONTHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}\s*months?\b").expect("valid months pattern")
});

/// Keyword table in tie-break order: when two categories match the same
/// number of keywords, the one listed first wins.
const CATEGORY_KEYWORDS: [(Category, &[&str]); 6] = [
    (
        Category::Educational,
        &[
            "learn", "learning", "educational", "education", "stem", "puzzle", "science", "math",
            "maths", "alphabet", "abc", "book", "brain", "counting", "school", "শিক্ষা",
        ],
    ),
    (
        Category::OutdoorFun,
        &[
            "outdoor", "outside", "garden", "gardening", "ball", "sport", "bike", "cycle",
            "cycling", "scooter", "water", "sand", "beach", "park", "kite", "বাইরে",
        ],
    ),
    (
        Category::Plushies,
        &[
            "plush", "plushie", "teddy", "teddies", "bear", "soft", "cuddly", "stuffed", "doll",
            "পুতুল",
        ],
    ),
    (
        Category::ArtsAndCrafts,
        &[
            "art", "craft", "crafting", "paint", "painting", "draw", "drawing", "colour",
            "colouring", "color", "coloring", "clay", "crayon", "sketch", "sketching", "আঁকা",
        ],
    ),
    (
        Category::Robots,
        &[
            "robot", "robotic", "robotics", "coding", "code", "remote", "rc", "tech",
            "technology", "electronic", "drone", "রোবট",
        ],
    ),
    (
        Category::Gifts,
        &[
            "present", "hamper", "birthday", "surprise", "personalised", "personalized", "custom",
            "customised", "customized", "wrap", "wrapping", "উপহার",
        ],
    ),
];

const AGE_WORDS: [&[&str]; 3] = [
    &["toddler", "toddlers", "baby", "babies", "infant", "infants", "newborn"],
    &["preschool", "preschooler", "preschoolers", "kindergarten", "kinder"],
    &["teen", "teens", "teenager", "tween", "tweens"],
];

const AGE_CURATED: [&[&str]; 3] = [
    &["Musical Soft Blocks", "Cuddly Elephant", "Rainbow Stacker"],
    &["Alphabet Puzzle Board", "Paint Party Set", "Garden Explorer Set"],
    &["STEM Robot Kit", "Remote Control Rover", "Clay Modelling Kit"],
];

const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "namaste", "hola", "greetings", "নমস্কার", "হ্যালো",
];
const GREETING_PHRASES: &[&str] = &["good morning", "good afternoon", "good evening"];
const THANKS_WORDS: &[&str] = &[
    "thanks", "thank", "thx", "ty", "bye", "goodbye", "cheers", "ধন্যবাদ", "বিদায়",
];
const THANKS_PHRASES: &[&str] = &["see you"];
const POPULAR_WORDS: &[&str] = &[
    "best", "popular", "top", "trending", "bestseller", "bestsellers", "favourite", "favorite",
    "জনপ্রিয়",
];
const POPULAR_PHRASES: &[&str] = &["most loved"];
const SHIPPING_WORDS: &[&str] = &[
    "ship", "shipping", "shipped", "delivery", "deliver", "delivered", "courier", "dispatch",
    "return", "returns", "refund", "ডেলিভারি",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicBranch {
    PriceBound,
    Category,
    Age,
    Greeting,
    Thanks,
    Popular,
    Shipping,
    Default,
}

impl HeuristicBranch {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeuristicBranch::PriceBound => "price_bound",
            HeuristicBranch::Category => "category",
            HeuristicBranch::Age => "age",
            HeuristicBranch::Greeting => "greeting",
            HeuristicBranch::Thanks => "thanks",
            HeuristicBranch::Popular => "popular",
            HeuristicBranch::Shipping => "shipping",
            HeuristicBranch::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicReply {
    pub branch: HeuristicBranch,
    pub text: String,
}

struct Query {
    lowered: String,
    tokens: Vec<String>,
}

impl Query {
    fn new(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let tokens = lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
        Self { lowered, tokens }
    }

    /// ASCII keywords match a whole token or its plain plural; other scripts
    /// match anywhere in the text.
    fn mentions(&self, keyword: &str) -> bool {
        if keyword.is_ascii() {
            self.tokens.iter().any(|token| {
                token == keyword
                    || token
                        .strip_prefix(keyword)
                        .is_some_and(|suffix| suffix == "s" || suffix == "es")
            })
        } else {
            self.lowered.contains(keyword)
        }
    }

    fn has_word(&self, words: &[&str]) -> bool {
        words.iter().any(|word| {
            if word.is_ascii() {
                self.tokens.iter().any(|token| token == word)
            } else {
                self.lowered.contains(word)
            }
        })
    }

    fn has_phrase(&self, phrases: &[&str]) -> bool {
        let joined = self.tokens.join(" ");
        phrases.iter().any(|phrase| joined.contains(phrase))
    }
}

pub fn respond(catalog: &Catalog, message: &str, language: Language) -> String {
    respond_with_branch(catalog, message, language).text
}

pub fn respond_with_branch(catalog: &Catalog, message: &str, language: Language) -> HeuristicReply {
    let query = Query::new(message);
    let t = templates(language);

    if let Some(limit) = price_ceiling(&query.lowered) {
        return reply(HeuristicBranch::PriceBound, price_reply(catalog, limit, language));
    }

    if let Some(category) = best_category(&query) {
        let picks = top_by(
            catalog.in_stock().filter(|product| product.category == category),
            |product| product.popularity(),
        );
        let text = if picks.is_empty() {
            fill(t.category_sold_out, &[("category", category.as_str())])
        } else {
            fill(
                t.category_hits,
                &[("category", category.as_str()), ("list", &product_list(&picks))],
            )
        };
        return reply(HeuristicBranch::Category, text);
    }

    if let Some(bucket) = age_bucket(&query) {
        let list = AGE_CURATED[bucket]
            .iter()
            .map(|name| format!("• {name}"))
            .collect::<Vec<String>>()
            .join("\n");
        let text = fill(t.age_hits, &[("label", t.age_labels[bucket]), ("list", &list)]);
        return reply(HeuristicBranch::Age, text);
    }

    if query.has_word(GREETING_WORDS) || query.has_phrase(GREETING_PHRASES) {
        return reply(HeuristicBranch::Greeting, t.greeting.to_string());
    }

    if query.has_word(THANKS_WORDS) || query.has_phrase(THANKS_PHRASES) {
        return reply(HeuristicBranch::Thanks, t.thanks.to_string());
    }

    if query.has_word(POPULAR_WORDS) || query.has_phrase(POPULAR_PHRASES) {
        let picks = top_by(catalog.in_stock(), |product| product.popularity());
        let text = if picks.is_empty() {
            t.nothing_in_stock.to_string()
        } else {
            fill(t.popular, &[("list", &product_list(&picks))])
        };
        return reply(HeuristicBranch::Popular, text);
    }

    if query.has_word(SHIPPING_WORDS) {
        return reply(HeuristicBranch::Shipping, t.shipping.to_string());
    }

    let picks = top_by(catalog.in_stock(), |product| f64::from(product.rating));
    let text = if picks.is_empty() {
        t.nothing_in_stock.to_string()
    } else {
        fill(t.default_hits, &[("list", &product_list(&picks))])
    };
    reply(HeuristicBranch::Default, text)
}

/// Rank categories for a search query by keyword hits.
pub fn recommend_categories(query: &str) -> Vec<Category> {
    let query = Query::new(query);
    let mut scored: Vec<(Category, usize)> = CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| (*category, keyword_score(&query, keywords)))
        .filter(|(_, score)| *score > 0)
        .collect();
    if scored.is_empty() {
        return DEFAULT_RECOMMENDED.to_vec();
    }
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(MAX_RECOMMENDED)
        .map(|(category, _)| category)
        .collect()
}

/// Flatten a reply for text-to-speech: no bullets or markdown markers, one
/// sentence per former line.
pub fn speech_text(reply: &str) -> String {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['•', '-', '*'])
                .replace(['*', '#', '_', '`'], "")
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.ends_with(['.', '!', '?', '।', ':']) {
                line
            } else {
                format!("{line}.")
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn reply(branch: HeuristicBranch, text: String) -> HeuristicReply {
    HeuristicReply { branch, text }
}

fn price_ceiling(lowered: &str) -> Option<u32> {
    let captures = PRICE_CEILING.captures(lowered)?;
    let digits: String = captures
        .get(1)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    // A ceiling too large for u32 still bounds the search; saturate it.
    let ceiling = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(ceiling.min(u64::from(u32::MAX)) as u32)
}

fn price_reply(catalog: &Catalog, limit: u32, language: Language) -> String {
    let t = templates(language);
    let limit_text = limit.to_string();
    let mut affordable: Vec<&Product> = catalog
        .in_stock()
        .filter(|product| product.price <= limit)
        .collect();
    if !affordable.is_empty() {
        affordable.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        affordable.truncate(TOP_N);
        return fill(
            t.price_hits,
            &[("limit", &limit_text), ("list", &product_list(&affordable))],
        );
    }
    match catalog.in_stock().min_by_key(|product| product.price) {
        Some(cheapest) => fill(
            t.price_consolation,
            &[
                ("limit", &limit_text),
                ("name", &cheapest.name),
                ("price", &cheapest.price.to_string()),
            ],
        ),
        None => t.nothing_in_stock.to_string(),
    }
}

fn keyword_score(query: &Query, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|keyword| query.mentions(keyword))
        .count()
}

fn best_category(query: &Query) -> Option<Category> {
    let mut best: Option<(Category, usize)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS.iter() {
        let score = keyword_score(query, keywords);
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((*category, score)),
        }
    }
    best.map(|(category, _)| category)
}

fn age_bucket(query: &Query) -> Option<usize> {
    if STATED_MONTHS.is_match(&query.lowered) {
        return Some(0);
    }
    if let Some(captures) = STATED_AGE.captures(&query.lowered) {
        let age = captures
            .get(1)
            .or_else(|| captures.get(2))
            .and_then(|value| value.as_str().parse::<u32>().ok());
        if let Some(age) = age {
            return Some(match age {
                0..=2 => 0,
                3..=6 => 1,
                _ => 2,
            });
        }
    }
    if query.has_phrase(&["older kids", "older children"]) {
        return Some(2);
    }
    AGE_WORDS.iter().position(|words| query.has_word(words))
}

fn top_by<'a, I, F>(products: I, score: F) -> Vec<&'a Product>
where
    I: Iterator<Item = &'a Product>,
    F: Fn(&Product) -> f64,
{
    let mut ranked: Vec<&Product> = products.collect();
    ranked.sort_by(|a, b| score(b).total_cmp(&score(a)));
    ranked.truncate(TOP_N);
    ranked
}

fn product_list(products: &[&Product]) -> String {
    products
        .iter()
        .map(|product| format!("• {} - ₹{}", product.name, product.price))
        .collect::<Vec<String>>()
        .join("\n")
}
