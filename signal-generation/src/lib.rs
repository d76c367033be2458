// Signal Generation (Layer 2)
// Turns scanned opportunities into persisted candidate signals and gates
// them into ACTIVE status

pub mod generator;
pub mod quality_gate;
pub mod store;

pub use generator::{
    GenerationCapability, GenerationContext, GeneratorConfig, SignalGenerator, SignalPayload,
};
pub use quality_gate::{GateDecision, QualityGate, RejectReason};
pub use store::{InMemorySignalStore, SignalStore};
