pub mod cards; // Nutrition card rendering
pub mod groq; // Groq inference service
pub mod image_source;
pub mod imgbb; // ImgBB image hosting
pub mod normalizer;

pub use groq::{GroqClient, InferenceClient, SamplingOptions};
pub use imgbb::{HostingClient, ImgBbClient};
pub use normalizer::ResponseNormalizer;
