//! Model providers implementing [`LessonGenerator`](crate::generator::LessonGenerator)

pub mod openrouter;

pub use openrouter::{GeneratorConfig, OpenRouterGenerator};
