use std::fmt;

use serde::{Deserialize, Serialize};

use mcm_types::ModelParameter;

/// The data object a manager guards.
///
/// Object stores are exposed through [`HasStore`](mcm_store::HasStore),
/// parameters through [`HasParameter`].
pub trait ModelData: Send + Sync + 'static {
    /// Put the data back into its initial state.
    fn reset_to_default(&mut self);
}

/// A data object that holds exactly one value of parameter `P`.
pub trait HasParameter<P: ModelParameter> {
    fn parameter(&self) -> &P;

    fn parameter_mut(&mut self) -> &mut P;
}

/// Position of a manager in the global lock order.
///
/// A manager may only depend on managers of strictly lower priority, so
/// change cascades always run from particles towards simulations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ManagerPriority {
    Particles,
    Structures,
    Transitions,
    Energies,
    Simulations,
}

impl fmt::Display for ManagerPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Particles => f.write_str("particles"),
            Self::Structures => f.write_str("structures"),
            Self::Transitions => f.write_str("transitions"),
            Self::Energies => f.write_str("energies"),
            Self::Simulations => f.write_str("simulations"),
        }
    }
}

/// How new objects obtain their index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertMode {
    /// Overwrite the first deprecated slot, keeping its index.
    #[default]
    ReuseDeprecated,
    /// Always append with the next index.
    Append,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_follows_dependencies() {
        assert!(ManagerPriority::Particles < ManagerPriority::Structures);
        assert!(ManagerPriority::Structures < ManagerPriority::Transitions);
        assert!(ManagerPriority::Transitions < ManagerPriority::Energies);
        assert!(ManagerPriority::Energies < ManagerPriority::Simulations);
        assert_eq!(ManagerPriority::Energies.to_string(), "energies");
    }
}
