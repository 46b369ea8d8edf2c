//! Skill discovery and readiness (§4.6 system prompt, §4.5 `activate_skill`).
//!
//! A skill is a directory under the skills root describing a named
//! instruction fragment the orchestrator can fold into the system prompt
//! while it is active. Discovery accepts either a `skill.toml` entry
//! (optionally enriched with SKILL.md frontmatter) or a SKILL.md-only
//! ClawHub SkillPack.

pub mod loader;
pub mod manifest;
pub mod registry;
pub mod types;

pub use manifest::{SkillManifest, SkillReadiness, SkillRequirements, ReadinessStatus};
pub use registry::{ReadinessSummary, SkillsRegistry};
pub use types::{RiskTier, SkillEntry};
