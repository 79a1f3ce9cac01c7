//! # Synthesis Phase Module
//!
//! Schema capture only runs while the process is in its synthesis (build)
//! phase. Deployed handlers share the same payload declarations but must not
//! pay the registration cost at invocation time, so capture calls made
//! outside the phase are no-ops unless a payload family explicitly opts in
//! (see [`crate::schema::CapturePolicy`]).
//!
//! The phase is process-wide state. It can be toggled programmatically:
//!
//! ```rust
//! velomap::phase::enter_build_phase();
//! assert!(velomap::phase::is_build_phase());
//! ```
//!
//! or enabled for the whole process with the environment variable
//! `VELOMAP_PHASE=build`, which a synthesis driver exports before loading
//! payload declarations. The env var is read once and cached.
//!
//! ## Environment Variables
//!
//! ### `VELOMAP_PHASE`
//!
//! `build` puts the process in the synthesis phase from startup.
//!
//! ### `VELOMAP_MAX_DEPTH`
//!
//! Maximum nesting depth the field tree builder will expand before failing
//! with `NestingTooDeep`. Accepts decimal (`32`) or hexadecimal (`0x20`).
//! Default: `32`. A payload class that nests itself (directly or through
//! intermediaries) hits this bound instead of overflowing the stack.

use once_cell::sync::Lazy;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default bound on payload nesting depth during tree building.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

static BUILD_PHASE: AtomicBool = AtomicBool::new(false);

static ENV_PHASE: Lazy<bool> = Lazy::new(|| {
    env::var("VELOMAP_PHASE")
        .map(|v| v.eq_ignore_ascii_case("build"))
        .unwrap_or(false)
});

/// Enter the synthesis phase; capture calls become effective.
pub fn enter_build_phase() {
    BUILD_PHASE.store(true, Ordering::SeqCst);
}

/// Leave the synthesis phase; build-phase-only capture calls become no-ops.
pub fn exit_build_phase() {
    BUILD_PHASE.store(false, Ordering::SeqCst);
}

/// Whether capture is currently active, either via [`enter_build_phase`] or
/// the `VELOMAP_PHASE=build` environment variable.
pub fn is_build_phase() -> bool {
    BUILD_PHASE.load(Ordering::SeqCst) || *ENV_PHASE
}

/// Synthesis configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthConfig {
    /// Maximum payload nesting depth the tree builder expands.
    pub max_nesting_depth: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl SynthConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let max_nesting_depth = match env::var("VELOMAP_MAX_DEPTH") {
            Ok(val) => {
                let parsed = if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).ok()
                } else {
                    val.parse::<usize>().ok()
                };
                parsed.filter(|d| *d > 0).unwrap_or(DEFAULT_MAX_NESTING_DEPTH)
            }
            Err(_) => DEFAULT_MAX_NESTING_DEPTH,
        };
        SynthConfig { max_nesting_depth }
    }
}
