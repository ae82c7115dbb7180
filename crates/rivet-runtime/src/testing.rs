//! Shared fixtures for unit tests.

use std::sync::Arc;

use rivet_kernel::defaults::ParameterTable;
use rivet_kernel::tunable::TunableRegistry;
use rivet_types::ExecutionMode;

use crate::mechanism::ControlContext;
use crate::subsystems::{Backends, Mechanisms};

/// A context whose registry holds the built-in defaults for `mode`.
pub(crate) fn context(mode: ExecutionMode) -> ControlContext {
    let registry = Arc::new(TunableRegistry::new(ParameterTable::builtin().resolve(mode)));
    ControlContext::new(registry)
}

/// Every mechanism on simulated backends at the default period.
pub(crate) fn sim_mechanisms() -> Mechanisms {
    let ctx = context(ExecutionMode::Simulated);
    Mechanisms::new(Backends::simulated(ctx.dt()), &ctx)
}
