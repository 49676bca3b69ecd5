pub mod analysis_handlers;
pub mod credit_handlers;
pub mod scrape_handlers;
pub mod session_handlers;
pub mod system_handlers;

pub use analysis_handlers::*;
pub use credit_handlers::*;
pub use scrape_handlers::*;
pub use session_handlers::*;
pub use system_handlers::*;
