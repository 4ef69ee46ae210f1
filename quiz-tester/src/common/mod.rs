pub mod scenario;
pub mod util;

pub use util::{load_bank, load_config, split_csv};
