//! Tool registry and built-in tools for the agent loop (§4.5).

pub mod builtin;
pub mod file_ops;
pub mod registry;

pub use builtin::{
    ActivateSkillTool, CalculateTool, DeactivateSkillTool, GetDatetimeTool, ReadFileTool,
    RunPythonTool, UpdateUserProfileTool,
};
pub use registry::{Tool, ToolOutcome, ToolRegistry};
