pub mod event;
pub mod order;
pub mod status;

pub use event::*;
pub use order::*;
pub use status::*;
