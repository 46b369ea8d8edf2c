use serde::{Deserialize, Serialize};

/// Agent loop settings (§4.7) — bounds on the LLM/tool-call cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLoopConfig {
    /// Maximum number of LLM↔tool round trips per turn before the loop
    /// forces a final answer.
    #[serde(default = "d_max_rounds")]
    pub max_rounds: u32,
    /// Maximum number of messages retained in history before older
    /// non-system messages are pruned.
    #[serde(default = "d_max_history_messages")]
    pub max_history_messages: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: d_max_rounds(),
            max_history_messages: d_max_history_messages(),
        }
    }
}

fn d_max_rounds() -> u32 {
    5
}
fn d_max_history_messages() -> usize {
    200
}
