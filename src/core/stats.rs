use serde::{Serialize, Deserialize};

/// Result of a full index build
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub heap_tuples: f64,
    pub index_tuples: f64,
}

/// Statistics reported back to the host by bulk delete and vacuum cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkDeleteStats {
    pub num_pages: u32,
    pub num_index_tuples: f64,
    pub tuples_removed: f64,
}

/// Planner inputs for the generic index cost estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostInputs {
    pub index_pages: f64,
    pub index_tuples: f64,
    /// Fraction of index tuples the scan keys are expected to select
    pub selectivity: f64,
    /// Number of scan keys evaluated per tuple
    pub num_keys: usize,
    /// Expected number of repeated scans (nested loops)
    pub loop_count: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostEstimate {
    pub startup_cost: f64,
    pub total_cost: f64,
    pub selectivity: f64,
    pub correlation: f64,
}
