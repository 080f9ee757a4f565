use thiserror::Error;

/// Fatal per-instance failures. These abort the running simulation instance
/// and are never retried; a parameter-search caller is expected to score the
/// instance as a failed run instead of aborting its batch.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed waypoint graph or environment setup. A configuration error,
    /// not a runtime contingency.
    #[error("environment configuration error: {0}")]
    Config(String),

    /// Exploration dead end: the node has no neighbors at all. Signals a
    /// graph-construction bug.
    #[error("no waypoint to target from waypoint {0}")]
    NoWaypointToTarget(u32),

    /// A serialized waypoint that does not parse.
    #[error("malformed waypoint message: {0:?}")]
    WaypointMessage(String),
}
