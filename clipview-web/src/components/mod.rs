//! Reusable HTML components for the preview UI
//!
//! Components are server-rendered HTML fragments used in full pages or as
//! HTMX partial updates.

pub mod layout;
pub mod preview;
pub mod toast;

// Re-export main component functions
pub use layout::{card, file_header, page_shell};
pub use preview::{action_bar, customise_link_menu, preview_area, unmount_on_pagehide};
pub use toast::notification_toast;
