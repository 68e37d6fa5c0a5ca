//! Proxy stack declaration and template synthesis

pub mod definition;
pub mod template;

pub use definition::ProxyStack;
pub use template::{Template, TemplateSynthesizer};
