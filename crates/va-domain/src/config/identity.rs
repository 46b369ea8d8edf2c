use serde::{Deserialize, Serialize};

/// Identity store settings (§4.6) — persona/profile/memory artifact roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Directory holding the three identity artifacts as plain text files.
    #[serde(default = "d_root")]
    pub root: std::path::PathBuf,
    /// Soft cap on memory.md size before appends start trimming oldest entries.
    #[serde(default = "d_memory_max_bytes")]
    pub memory_max_bytes: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            root: d_root(),
            memory_max_bytes: d_memory_max_bytes(),
        }
    }
}

impl IdentityConfig {
    pub fn persona_path(&self) -> std::path::PathBuf {
        self.root.join("persona.md")
    }
    pub fn profile_path(&self) -> std::path::PathBuf {
        self.root.join("profile.md")
    }
    pub fn memory_path(&self) -> std::path::PathBuf {
        self.root.join("memory.md")
    }
}

fn d_root() -> std::path::PathBuf {
    std::path::PathBuf::from("./identity")
}
fn d_memory_max_bytes() -> u64 {
    1_048_576
}
