pub mod assets;
pub mod cli;
pub mod server;
