pub mod run;
pub mod types;

pub use run::*;
pub use types::*;
