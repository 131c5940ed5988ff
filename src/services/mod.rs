pub mod matrix_builder;
pub mod recommendations;
pub mod similarity;
pub mod vectorizer;

pub use recommendations::RecommendationService;
pub use similarity::{cosine_distance, SimilarityIndex};
