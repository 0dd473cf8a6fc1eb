//! Small ambient configuration knob threaded through `Graph::forward`.

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Enables per-operator-type timing accumulation, reported via
    /// `tracing::debug!` at the end of `forward`.
    pub debug: bool,
}
