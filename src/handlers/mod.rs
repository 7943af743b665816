//! HTTP handlers, grouped by the route group that mounts them.
//!
//! Handlers stay thin: extract, validate the payload, make one repository or
//! provider call, and shape the response. Authorization by role happens in the
//! router's guard layer; ownership checks happen in the repository.

pub mod account;
pub mod admin;
pub mod bookings;
pub mod reference;
pub mod stripe;
pub mod upload;
pub mod vehicles;

use crate::pagination::PageRequest;

pub(crate) fn page_of(page: Option<i64>, limit: Option<i64>) -> PageRequest {
    PageRequest::new(page, limit)
}
