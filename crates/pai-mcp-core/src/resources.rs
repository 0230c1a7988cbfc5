// crates/pai-mcp-core/src/resources.rs
// ============================================================================
// Module: Resource Accounting
// Description: GPU/CPU aggregation over opaque job-spec records.
// Purpose: Feed quota projections for admission control.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Job specs carry GPU/CPU counts as strings under `resourceConfig`. Parsing is
//! lenient on purpose: a malformed or missing quantity contributes zero rather
//! than failing admission. Each spec's quantities are multiplied by its
//! `podCount`, which defaults to 1.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::job::JobSpec;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key holding the per-pod resource block.
const RESOURCE_CONFIG_KEY: &str = "resourceConfig";
/// Key holding the replica count.
const POD_COUNT_KEY: &str = "podCount";
/// GPU quantity key inside the resource block.
const GPU_KEY: &str = "GPU";
/// CPU quantity key inside the resource block.
const CPU_KEY: &str = "CPU";
/// Memory quantity key inside the resource block.
const MEMORY_KEY: &str = "memory";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Aggregate GPU/CPU quantities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceUsage {
    /// Total GPUs.
    pub gpu: u64,
    /// Total CPU cores.
    pub cpu: u64,
}

impl ResourceUsage {
    /// Adds two usages, saturating on overflow.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            gpu: self.gpu.saturating_add(other.gpu),
            cpu: self.cpu.saturating_add(other.cpu),
        }
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a quantity as a base-10 integer, falling back to zero.
#[must_use]
pub fn parse_quantity(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::String(text)) => text.trim().parse::<u64>().unwrap_or(0),
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        _ => 0,
    }
}

/// Returns the spec's pod count, defaulting to 1 when missing or malformed.
#[must_use]
pub fn pod_count(spec: &JobSpec) -> u64 {
    match spec.get(POD_COUNT_KEY) {
        Some(Value::Number(number)) => number.as_u64().unwrap_or(1),
        Some(Value::String(text)) => text.trim().parse::<u64>().unwrap_or(1),
        _ => 1,
    }
}

/// Computes the usage of one spec (per-pod quantity times pod count).
#[must_use]
pub fn spec_usage(spec: &JobSpec) -> ResourceUsage {
    let config = spec.get(RESOURCE_CONFIG_KEY).and_then(Value::as_object);
    let gpu = parse_quantity(config.and_then(|config| config.get(GPU_KEY)));
    let cpu = parse_quantity(config.and_then(|config| config.get(CPU_KEY)));
    let pods = pod_count(spec);
    ResourceUsage {
        gpu: gpu.saturating_mul(pods),
        cpu: cpu.saturating_mul(pods),
    }
}

/// Sums usage across all specs.
#[must_use]
pub fn total_usage(specs: &[JobSpec]) -> ResourceUsage {
    specs.iter().map(spec_usage).fold(ResourceUsage::default(), ResourceUsage::saturating_add)
}

/// Renders a one-line resource summary per spec, e.g. `1 x GPU=8 CPU=32 memory=256Gi`.
#[must_use]
pub fn summarize_specs(specs: &[JobSpec]) -> Vec<String> {
    specs
        .iter()
        .map(|spec| {
            let config = spec.get(RESOURCE_CONFIG_KEY).and_then(Value::as_object);
            let field = |key: &str| {
                config
                    .and_then(|config| config.get(key))
                    .map_or_else(|| "-".to_string(), display_scalar)
            };
            format!(
                "{} x GPU={} CPU={} memory={}",
                pod_count(spec),
                field(GPU_KEY),
                field(CPU_KEY),
                field(MEMORY_KEY)
            )
        })
        .collect()
}

/// Renders a scalar without JSON quoting.
fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
