mod context;
mod protected;

pub(crate) use context::PathContext;
pub use protected::PathClassifier;
