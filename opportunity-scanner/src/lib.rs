//! Opportunity Scanner - Layer 1 of the decision pipeline
//!
//! Calls the external market-research capability for a bounded list of
//! candidate opportunities, with timeouts and bounded retries. Persistent
//! failure degrades the cycle instead of failing it.

pub mod research;
pub mod scanner;

pub use research::MarketResearch;
pub use scanner::{OpportunityScanner, ScanOutcome, ScannerConfig};

pub use common::Opportunity;
