use giftbot_contracts::catalog::Category;
use giftbot_contracts::chat::{ImageSize, Language, MAX_RECOMMENDED};

const SHOP_POLICIES: &str = "\
Shop policies:
- Free shipping on orders above ₹999.
- Delivery takes 3-5 business days.
- Unused toys can be returned within 7 days.
- Gift wrapping is available on request at checkout.";

const RULES: &str = "\
Rules you must always follow:
1. Only recommend products that appear in the CATALOG below. Never invent products, prices or discounts.
2. Whenever you mention a product, give its exact name and price in ₹.
3. If the question is not about toys, gifts or this shop, politely steer the conversation back to finding a toy.
4. If a product is out of stock, say so clearly and suggest an in-stock alternative.";

/// Fixed framing for every chat and voice turn.
pub fn system_preamble(language: Language, voice: bool) -> String {
    let mut preamble = String::from(
        "You are GiftBot, the friendly shopping assistant of an online toy shop. \
         You help parents, relatives and friends pick the right toy or gift for a child.",
    );
    preamble.push_str("\n\n");
    preamble.push_str(SHOP_POLICIES);
    preamble.push_str("\n\n");
    preamble.push_str(RULES);
    if language == Language::Bn {
        preamble.push_str(
            "\n\nReply in Bengali (বাংলা). Keep product names exactly as they appear in the catalog.",
        );
    }
    if voice {
        preamble.push_str(
            "\n\nYour reply will be read aloud. Answer in two or three short sentences, \
             with no markdown, bullets, emoji or lists.",
        );
    }
    preamble
}

pub fn chat_system_prompt(language: Language, voice: bool, catalog_context: &str) -> String {
    let mut prompt = system_preamble(language, voice);
    prompt.push_str("\n\nCATALOG:\n");
    if catalog_context.trim().is_empty() {
        prompt.push_str("(no products are currently listed)");
    } else {
        prompt.push_str(catalog_context);
    }
    prompt
}

/// The chat preamble and catalog, narrowed to ranking categories for a search.
pub fn recommend_system_prompt(language: Language, catalog_context: &str) -> String {
    let mut prompt = chat_system_prompt(language, false, catalog_context);
    prompt.push_str(
        "\n\nFor this request, map the shopper's search query to the catalog's product \
         categories. Reply with category names only, in English, exactly as the catalog \
         spells them.",
    );
    prompt
}

pub fn recommend_prompt(query: &str) -> String {
    let vocabulary = Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<&str>>()
        .join(", ");
    format!(
        "A shopper searched for: \"{query}\".\n\
         Categories: {vocabulary}.\n\
         List the 3 or 4 most relevant categories, most relevant first, \
         comma-separated, using the names exactly as written above and nothing else."
    )
}

/// Map a free-form model reply onto the category vocabulary.
///
/// Unknown names are dropped, duplicates keep their first position and at
/// most [`MAX_RECOMMENDED`] categories are returned.
pub fn parse_recommended_categories(reply: &str) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::new();
    for raw in reply.split([',', '\n', ';']) {
        let cleaned = raw
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | '•'))
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '.'))
            .trim();
        let Some(category) = Category::parse(cleaned) else {
            continue;
        };
        if !out.contains(&category) {
            out.push(category);
        }
        if out.len() == MAX_RECOMMENDED {
            break;
        }
    }
    out
}

pub fn image_generation_prompt(prompt: &str, size: ImageSize) -> String {
    format!(
        "Generate a single image: {prompt}. Aspect ratio {}.",
        size.aspect_ratio()
    )
}

pub fn image_edit_prompt(instruction: &str) -> String {
    format!("Edit the attached image: {instruction}. Return the edited image.")
}
