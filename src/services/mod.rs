//! Link resolution and click recording
//!
//! - `traits`: the `LinkResolver` contract
//! - `link_service`: `LinkService`, the repository-backed resolver
//! - `click_dispatcher`: bounded background worker pool for click recording

pub mod click_dispatcher;
pub mod link_service;
pub mod traits;

pub use click_dispatcher::{ClickDispatcher, ClickEvent, DispatcherStats};
pub use link_service::{LinkService, MAX_PAGE_SIZE};
pub use traits::LinkResolver;
