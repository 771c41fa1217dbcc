pub mod config;
pub mod error;
pub mod event;
pub mod record;
pub mod scored;

pub use config::Config;
pub use error::*;
pub use event::*;
pub use record::*;
pub use scored::*;
