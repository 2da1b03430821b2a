pub mod gemini;
pub mod sightengine;

pub use gemini::GeminiClient;
pub use sightengine::SightengineClient;
