//! Routers, split by audience. Access control does not live here: the edge gate
//! wraps the merged router, and each admin handler calls the route guard itself.

/// Public site: anonymous reads, engagement, application submission.
pub mod public;

/// Sign-in and sign-out.
pub mod session;

/// Admin console pages and the `/admin/api` surface.
pub mod admin;

/// Request bodies above this are refused by axum before the handler runs. It sits
/// above the largest upload ceiling so oversize files reach the per-endpoint check
/// and get a descriptive 400.
pub const UPLOAD_BODY_LIMIT: usize = 60 * 1024 * 1024;
