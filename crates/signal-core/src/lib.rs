pub mod agents;
pub mod error;
pub mod traits;
pub mod types;

pub use agents::*;
pub use error::*;
pub use traits::*;
pub use types::*;
