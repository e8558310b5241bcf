//! Text generation used to write summaries.
//!
//! The summarizer only needs "system + prompt in, text + usage out", so the
//! backend sits behind [`TextGenerator`]. [`HttpTextGenerator`] speaks the
//! OpenAI-compatible chat completions API used by llama-server and hosted
//! providers alike.
pub mod runtime_trait;
pub mod http_runtime;

pub use runtime_trait::{GenerationOutput, GenerationRequest, TextGenerator};
pub use http_runtime::HttpTextGenerator;
