//! Live stream aggregation settings

pub struct StreamConfig {
    /// Recent bars an aggregator keeps around for periodic validation
    pub history_limit: usize,
    /// Run a validation pass every n emitted updates (0 disables it)
    pub validate_every: usize,
    /// Most flat fillers inserted for one gap; a longer gap re-anchors on the new bar
    pub max_gap_fill: usize,
}

pub const STREAM: StreamConfig = StreamConfig {
    history_limit: 2048,
    validate_every: 32,
    max_gap_fill: 10_000,
};
