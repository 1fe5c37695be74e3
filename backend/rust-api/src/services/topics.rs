/// Article topics for generated tests. Each entry must not contain another
/// entry, so the topic in a prompt can be identified unambiguously.
pub const TOPICS: &[&str] = &[
    "The rise of plant-based meat alternatives",
    "How night markets shape Taiwanese food culture",
    "Why honeybee populations are declining",
    "The psychology behind procrastination",
    "Space tourism and its hidden costs",
    "The history of bubble tea",
    "Coral reef bleaching and ocean warming",
    "Learning a second language as a teenager",
    "The environmental cost of fast fashion",
    "How smartphones changed the way we sleep",
    "Urban farming on city rooftops",
    "The science of habit formation",
    "Volunteering abroad: help or harm?",
    "Esports becoming an official sport",
    "The story of the Braille writing system",
    "Protecting endangered leatherback turtles",
    "Artificial intelligence in the classroom",
    "Why people believe in conspiracy theories",
    "The Mazu pilgrimage and community spirit",
    "Minimalism and the joy of owning less",
    "How vaccines train the immune system",
    "The benefits and risks of remote work",
    "Microplastics in drinking water",
    "The cultural meaning of the Dragon Boat Festival",
    "Street art versus vandalism",
    "Sleep deprivation among high school students",
    "The return of vinyl records",
    "Electric scooters and traffic safety",
    "Food waste in modern supermarkets",
    "The life of Marie Curie",
];
