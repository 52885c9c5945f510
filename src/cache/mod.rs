pub mod semantic_cache;

pub use semantic_cache::{pair_key, SemanticCache, Verdict};
