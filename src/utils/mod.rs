pub mod fs;
pub mod logging;
pub mod text;

pub use fs::{atomic_write, LockFile};
pub use text::{parse_page_title, truncate_text};
