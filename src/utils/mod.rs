pub mod errors;
pub mod files;
pub mod output;
pub mod paths;

pub use errors::*;
pub use files::*;
pub use output::*;
pub use paths::*;
