pub mod cancel;
pub mod config;
pub mod error;
pub mod handles;
pub mod message;
pub mod session;
pub mod stream;
pub mod trace;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use handles::{ProfileStore, SkillToggle};
pub use message::{Message, Role, ToolCall, ToolDefinition};
pub use session::{ActiveSkills, SessionState, Turn, TurnMetrics, TurnTimestamps};
pub use stream::{AsrEvent, BoxStream, FinishReason, LlmEvent, Usage};
pub use trace::TraceEvent;
