pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod router;
pub mod server;
pub mod signature;
pub mod translate;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use logging::SharedJournal;
pub use server::{build_router, AppState};
