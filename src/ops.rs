//! The sandbox extension: a single op that hands the bootstrap its seed
//! (capability names for the kind, the data facade, tree limits) and the
//! bootstrap script that installs them.
//!
//! The seed can be taken exactly once. The bootstrap consumes it while the
//! runtime is being built and then drops every reference to `Deno.core`, so
//! template code has no path back to this op or any other.

use crate::capabilities::{CapabilitySet, DocumentKind};
use deno_core::{op2, OpState};
use serde::Serialize;

/// Maximum nesting depth of the document tree a template may return.
pub const MAX_TREE_DEPTH: usize = 256;
/// Maximum number of element and text nodes in one document tree.
pub const MAX_TREE_NODES: usize = 50_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSeed {
    pub kind: DocumentKind,
    pub elements: Vec<&'static str>,
    pub helpers: Vec<&'static str>,
    pub intrinsics: Vec<&'static str>,
    pub data: serde_json::Value,
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl SandboxSeed {
    pub fn new(capabilities: &CapabilitySet, data: serde_json::Value) -> Self {
        Self {
            kind: capabilities.kind(),
            elements: capabilities.elements().collect(),
            helpers: capabilities.helpers().collect(),
            intrinsics: capabilities.intrinsics().to_vec(),
            data,
            max_depth: MAX_TREE_DEPTH,
            max_nodes: MAX_TREE_NODES,
        }
    }
}

#[op2]
#[serde]
pub fn op_sandbox_seed(state: &mut OpState) -> Result<SandboxSeed, deno_core::error::AnyError> {
    state
        .try_take::<SandboxSeed>()
        .ok_or_else(|| anyhow::anyhow!("sandbox seed was already consumed"))
}

// ============================================================================
// Extension Definition
// ============================================================================

deno_core::extension!(
    template_sandbox,
    ops = [op_sandbox_seed],
    esm_entry_point = "ext:template_sandbox/bootstrap.js",
    esm = ["ext:template_sandbox/bootstrap.js" = "src/bootstrap.js"],
    options = {
        seed: SandboxSeed,
    },
    state = |state, options| {
        state.put(options.seed);
    },
);
