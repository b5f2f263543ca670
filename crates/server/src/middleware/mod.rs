pub mod session;

pub use session::{require_page_session, require_session};
