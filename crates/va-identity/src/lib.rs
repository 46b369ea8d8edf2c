//! Identity store: persona, user profile, and memory artifacts (§4.6).

pub mod store;

pub use store::{IdentityArtifact, IdentityStore};
