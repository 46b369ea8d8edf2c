use serde::{Deserialize, Serialize};

/// Skill registry settings (§4.5/§4.9) — where `SKILL.md`/`skill.toml`
/// directories are scanned from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    #[serde(default = "d_root")]
    pub root: std::path::PathBuf,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self { root: d_root() }
    }
}

fn d_root() -> std::path::PathBuf {
    std::path::PathBuf::from("./skills")
}
