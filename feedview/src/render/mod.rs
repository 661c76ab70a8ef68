//! Template rendering.

mod engine;
mod renderer;

pub use engine::{ExpressionTemplateEngine, TemplateEngine};
pub use renderer::{RenderedArtifact, TemplateRenderer};
