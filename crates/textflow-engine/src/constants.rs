//! Engine-wide constants
//!
//! Single source of truth for defaults and reserved names.

/// Default values for engine configuration
pub mod defaults {
    /// Maximum number of undo entries kept before the oldest is dropped
    pub const UNDO_LIMIT: usize = 100;
    /// zstd level used for full-graph undo snapshots
    pub const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;
    /// Attempts made to draw a fresh session id before giving up
    pub const MAX_ID_ATTEMPTS: u32 = 16;
    /// Looper wall-clock budget in seconds
    pub const LOOP_TIMEOUT_SECS: f64 = 600.0;
    /// Looper soft limit on accumulated characters
    pub const LOOP_DATA_LIMIT: i64 = 10_000_000;
}

/// Path conventions
pub mod paths {
    /// Path of the implicit root every top-level node hangs from
    pub const ROOT: &str = "/";
    /// Separator between path components
    pub const SEPARATOR: char = '/';
}

/// Parameter names the engine itself relies on
pub mod params {
    /// Universal bypass toggle carried by every node
    pub const ENABLED: &str = "enabled";
}

/// Type tags of the node kinds the engine ships
pub mod node_types {
    pub const LOOPER: &str = "looper";
    pub const LOOP_INPUT: &str = "loop_input";
    pub const LOOP_OUTPUT: &str = "loop_output";
}

/// Names of the internal children every Looper owns
pub mod looper {
    pub const INPUT_NAME: &str = "loop_in";
    pub const OUTPUT_NAME: &str = "loop_out";
}

/// Expression language markers
pub mod markers {
    /// Sigil introducing global references and the loop self-reference
    pub const SIGIL: char = '$';
    /// Loop self-reference, replaced by the loop index minus one
    pub const LOOP_SELF: &str = "$$";
    /// Delimiter of inline expressions
    pub const BACKTICK: char = '`';
    /// Opening of a loop-relative item marker
    pub const ITEM_OPEN: &str = "[[";
}

/// Current version written into flowstate documents
pub const FLOWSTATE_VERSION: u32 = 1;
