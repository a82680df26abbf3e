pub mod context;

pub use context::{get_current_user, CurrentUser};
