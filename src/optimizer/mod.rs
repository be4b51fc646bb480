pub mod constraints;
pub mod dispatcher;
pub mod dp;
pub mod extract;
pub mod greedy;
pub mod strategies;
pub mod types;

pub use constraints::*;
pub use dispatcher::*;
pub use dp::*;
pub use extract::*;
pub use greedy::*;
pub use strategies::*;
pub use types::*;
