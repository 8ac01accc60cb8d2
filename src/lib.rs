pub mod backend;
pub mod config;
pub mod edit;
pub mod log;
pub mod lsp;
pub mod util;
