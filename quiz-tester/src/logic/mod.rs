pub mod policy;
pub mod reports;
pub mod runner;
pub mod seeds;
pub mod tester;

pub use policy::Strategy;
pub use runner::{PersistenceWriter, PlayContext, SimulatedAuthority};
pub use seeds::resolve_seed_inputs;
pub use tester::*;
