use super::product::{Category, Product};

#[allow(clippy::too_many_arguments)]
fn product(
    id: u32,
    name: &str,
    category: Category,
    price: u32,
    original_price: Option<u32>,
    rating: f32,
    reviews: u32,
    stock: u32,
    badge: Option<&str>,
    description: &str,
) -> Product {
    Product {
        id,
        name: name.to_string(),
        category,
        price,
        original_price,
        rating,
        reviews,
        stock,
        badge: badge.map(str::to_string),
        description: Some(description.to_string()),
    }
}

/// The storefront's mock inventory, used when the backend runs in mock mode.
pub fn seed_products() -> Vec<Product> {
    vec![
        product(
            1,
            "Rainbow Stacker",
            Category::Educational,
            1199,
            Some(1499),
            4.8,
            342,
            25,
            Some("Bestseller"),
            "Wooden stacking rings in seven colours that teach size and colour sorting.",
        ),
        product(
            2,
            "Cuddly Elephant",
            Category::Plushies,
            1699,
            None,
            4.9,
            518,
            14,
            Some("Most Loved"),
            "Extra-soft grey elephant plush with embroidered eyes, safe from birth.",
        ),
        product(
            3,
            "STEM Robot Kit",
            Category::Robots,
            3499,
            Some(3999),
            4.7,
            289,
            8,
            Some("New"),
            "Build-and-code robot with 12 sensors and a block-based coding app.",
        ),
        product(
            4,
            "Garden Explorer Set",
            Category::OutdoorFun,
            1499,
            None,
            4.5,
            156,
            19,
            None,
            "Kid-sized rake, spade, watering can and bug viewer for backyard adventures.",
        ),
        product(
            5,
            "Paint Party Set",
            Category::ArtsAndCrafts,
            899,
            Some(1099),
            4.6,
            203,
            31,
            None,
            "Washable paints, brushes and an easel apron for budding artists.",
        ),
        product(
            6,
            "Birthday Surprise Hamper",
            Category::Gifts,
            2499,
            None,
            4.7,
            98,
            12,
            Some("Gift Ready"),
            "A curated box of three toys, a card and festive wrapping.",
        ),
        product(
            7,
            "Alphabet Puzzle Board",
            Category::Educational,
            649,
            None,
            4.4,
            412,
            40,
            None,
            "Chunky wooden letters with picture cut-outs for early readers.",
        ),
        product(
            8,
            "Teddy Bear Classic",
            Category::Plushies,
            999,
            Some(1299),
            4.6,
            634,
            0,
            None,
            "The timeless brown teddy with a satin bow.",
        ),
        product(
            9,
            "Remote Control Rover",
            Category::Robots,
            2799,
            None,
            4.3,
            177,
            6,
            None,
            "All-terrain rover with rechargeable battery and 30-minute run time.",
        ),
        product(
            10,
            "Splash Water Blaster",
            Category::OutdoorFun,
            549,
            None,
            4.2,
            265,
            50,
            Some("Summer Pick"),
            "Pump-action water blaster with a 6 metre range.",
        ),
        product(
            11,
            "Clay Modelling Kit",
            Category::ArtsAndCrafts,
            749,
            None,
            4.5,
            141,
            22,
            None,
            "Twelve colours of air-dry clay with sculpting tools.",
        ),
        product(
            12,
            "Musical Soft Blocks",
            Category::Educational,
            1099,
            None,
            4.7,
            188,
            17,
            None,
            "Squeezable blocks that chime, rattle and crinkle for tiny hands.",
        ),
        product(
            13,
            "Unicorn Plush Pillow",
            Category::Plushies,
            1299,
            None,
            4.5,
            221,
            9,
            None,
            "Pastel unicorn that doubles as a nap pillow.",
        ),
        product(
            14,
            "Personalised Storybook",
            Category::Gifts,
            1899,
            None,
            4.8,
            87,
            15,
            Some("Custom"),
            "A hardcover adventure starring the child by name.",
        ),
    ]
}
