//! Supply supervision: input-voltage filtering, brightness guards and
//! power-rail fault flags.

mod guard;
mod rail;
mod vin;

pub use guard::{
    GuardAction, InstantGuard, RiseCapConfig, RiseCapGuard, StatefulGuard, StatefulGuardConfig,
    VbusGuardState, VoltageGuardPolicy, decide_capped_level,
};
pub use rail::PowerRailFaults;
pub use vin::{VIN_SAMPLE_WINDOW, VinFilter};
