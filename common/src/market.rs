use serde::{Deserialize, Serialize};

/// One candidate symbol surfaced by the market-research collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub exchange: String,
    /// Short free-text rationale from the research capability
    pub rationale: String,
}
