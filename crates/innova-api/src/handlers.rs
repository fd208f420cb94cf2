//! Request handlers.

pub mod background;
pub mod health;
pub mod jobs;
pub mod video;

pub use background::*;
pub use health::*;
pub use jobs::*;
pub use video::*;
