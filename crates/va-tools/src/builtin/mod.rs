//! Built-in tool set (§4.5). Illustrative, not exhaustive — the registry is
//! open to more tools without orchestrator changes.

pub mod calculate;
pub mod datetime;
pub mod profile;
pub mod read_file;
pub mod run_python;
pub mod skill_toggle;

pub use calculate::CalculateTool;
pub use datetime::GetDatetimeTool;
pub use profile::UpdateUserProfileTool;
pub use read_file::ReadFileTool;
pub use run_python::RunPythonTool;
pub use skill_toggle::{ActivateSkillTool, DeactivateSkillTool};
