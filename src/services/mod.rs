pub mod classifier;
pub mod recommendation;

// Re-export commonly used services
pub use classifier::ClassifierService;
pub use recommendation::{
    GenerationClient, JsonFileStore, RecommendationResolver, RemedyGenerator,
};
