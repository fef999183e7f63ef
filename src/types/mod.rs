pub mod account;
pub mod broker;
pub mod envelope;
pub mod instrument;
pub mod order;

pub use account::*;
pub use broker::*;
pub use envelope::*;
pub use instrument::*;
pub use order::*;
