//! Built-in model backends.

mod openai;

pub use openai::OpenAiCompatibleBackend;
