mod credentials;
mod generator;
mod language;
mod prompt;
mod session;

pub use credentials::*;
pub use generator::*;
pub use language::*;
pub use prompt::*;
pub use session::*;
