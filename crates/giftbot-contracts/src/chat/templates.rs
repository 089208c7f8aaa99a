use crate::chat::normalize::Language;

/// Canned reply text for one language. Placeholders: `{limit}`, `{list}`,
/// `{name}`, `{price}`, `{category}`, `{label}`.
pub(crate) struct Templates {
    pub price_hits: &'static str,
    pub price_consolation: &'static str,
    pub nothing_in_stock: &'static str,
    pub category_hits: &'static str,
    pub category_sold_out: &'static str,
    pub age_hits: &'static str,
    pub greeting: &'static str,
    pub thanks: &'static str,
    pub popular: &'static str,
    pub shipping: &'static str,
    pub default_hits: &'static str,
    pub age_labels: [&'static str; 3],
}

const EN: Templates = Templates {
    price_hits: "Here are our top-rated picks under ₹{limit}:\n{list}\nWant me to narrow it down by age or interest?",
    price_consolation: "I couldn't find anything under ₹{limit} right now. The closest option is {name} at ₹{price}.",
    nothing_in_stock: "Sorry, nothing is in stock right now. Please check back soon!",
    category_hits: "Great choice! Our most-loved {category} toys:\n{list}",
    category_sold_out: "Our {category} toys are all out of stock right now. Ask me about another category!",
    age_hits: "For {label}, we recommend:\n{list}",
    greeting: "Hi there! 👋 I'm GiftBot. Tell me the child's age, your budget, or what they love, and I'll find the perfect toy!",
    thanks: "You're welcome! Happy gifting! 🎁 Come back anytime.",
    popular: "Our customers' favourites right now:\n{list}",
    shipping: "We deliver across India in 3-5 business days. Shipping is free on orders above ₹999, and returns are accepted within 7 days.",
    default_hits: "Here are our top-rated toys:\n{list}\nTell me the child's age, your budget, or their interests for more personal picks!",
    age_labels: ["toddlers (0-2 years)", "little ones (3-6 years)", "kids 7 and up"],
};

const BN: Templates = Templates {
    price_hits: "₹{limit} এর মধ্যে আমাদের সেরা রেটিং পাওয়া খেলনা:\n{list}\nবয়স বা পছন্দ জানালে আরও বেছে দিতে পারি।",
    price_consolation: "₹{limit} এর মধ্যে এখন কিছু পাওয়া যাচ্ছে না। সবচেয়ে কাছের বিকল্প: {name} (₹{price})।",
    nothing_in_stock: "দুঃখিত, এই মুহূর্তে কোনো খেলনা স্টকে নেই। শীঘ্রই আবার দেখুন!",
    category_hits: "দারুণ পছন্দ! {category} বিভাগে আমাদের জনপ্রিয় খেলনা:\n{list}",
    category_sold_out: "{category} বিভাগের সব খেলনা এখন স্টকে নেই। অন্য কোনো বিভাগের কথা জিজ্ঞাসা করুন!",
    age_hits: "{label} এর জন্য আমাদের সুপারিশ:\n{list}",
    greeting: "নমস্কার! 👋 আমি GiftBot। শিশুর বয়স, আপনার বাজেট বা তার পছন্দের কথা বলুন, আমি সেরা খেলনাটি খুঁজে দেব!",
    thanks: "আপনাকেও ধন্যবাদ! শুভ উপহার! 🎁 আবার আসবেন।",
    popular: "এখন গ্রাহকদের সবচেয়ে প্রিয় খেলনা:\n{list}",
    shipping: "আমরা সারা ভারতে ৩-৫ কার্যদিবসে ডেলিভারি করি। ₹৯৯৯ এর বেশি অর্ডারে ফ্রি শিপিং, এবং ৭ দিনের মধ্যে রিটার্ন করা যায়।",
    default_hits: "আমাদের সর্বোচ্চ রেটিং পাওয়া খেলনা:\n{list}\nআরও ভালো পরামর্শের জন্য শিশুর বয়স, বাজেট বা পছন্দ জানান!",
    age_labels: ["০-২ বছরের শিশু", "৩-৬ বছরের শিশু", "৭ বছর ও তার বেশি বয়সী শিশু"],
};

pub(crate) fn templates(language: Language) -> &'static Templates {
    match language {
        Language::En => &EN,
        Language::Bn => &BN,
    }
}

pub(crate) fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}
