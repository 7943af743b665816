//! Listing and booking state machines.
//!
//! Every transition is checked here against an already-loaded row, so the
//! Postgres repository (inside a locked transaction) and the in-memory
//! repository enforce identical rules.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{BookingStatus, ReviewDecision, Vehicle, VehicleStatus},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Vehicle not found")]
    NotFound,

    #[error("Only DRAFT or REJECTED vehicles can be submitted (current status: {0})")]
    NotSubmittable(VehicleStatus),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("At least one image is required before submission")]
    NoImages,

    #[error("Only DRAFT or REJECTED vehicles can be edited (current status: {0})")]
    NotEditable(VehicleStatus),

    #[error("Only PENDING vehicles can be reviewed (current status: {0})")]
    NotReviewable(VehicleStatus),

    #[error("Only APPROVED vehicles can be published (current status: {0})")]
    NotPublishable(VehicleStatus),

    #[error("Booking cannot move from {from} to {to}")]
    BookingTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound => AppError::NotFound(err.to_string()),
            LifecycleError::MissingFields(_) | LifecycleError::NoImages => {
                AppError::Validation(err.to_string())
            }
            _ => AppError::InvalidState(err.to_string()),
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VehicleStatus::Draft => "DRAFT",
            VehicleStatus::Pending => "PENDING",
            VehicleStatus::Approved => "APPROVED",
            VehicleStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

// --- Vehicle lifecycle ---

/// The complete vehicle transition table.
pub fn can_transition(from: VehicleStatus, to: VehicleStatus) -> bool {
    use VehicleStatus::*;
    matches!(
        (from, to),
        (Draft, Pending) | (Rejected, Pending) | (Pending, Approved) | (Pending, Rejected)
    )
}

/// Resolves a loaded row to a vehicle the seller owns. Missing, foreign and
/// soft-deleted vehicles are all reported as not found.
pub fn owned_by(vehicle: Option<Vehicle>, seller_id: Uuid) -> Result<Vehicle, LifecycleError> {
    match vehicle {
        Some(v) if v.seller_id == seller_id && v.is_active => Ok(v),
        _ => Err(LifecycleError::NotFound),
    }
}

/// Submission preconditions, in order: status, required fields, images.
pub fn check_submission(vehicle: &Vehicle) -> Result<(), LifecycleError> {
    if !can_transition(vehicle.status, VehicleStatus::Pending) {
        return Err(LifecycleError::NotSubmittable(vehicle.status));
    }

    let mut missing = Vec::new();
    let model_blank = vehicle
        .model_name
        .as_deref()
        .map(|m| m.trim().is_empty())
        .unwrap_or(true);
    if model_blank {
        missing.push("modelName");
    }
    if vehicle.make_id.is_none() {
        missing.push("makeId");
    }
    if vehicle.type_id.is_none() {
        missing.push("typeId");
    }
    if vehicle.fuel_type_id.is_none() {
        missing.push("fuelTypeId");
    }
    if !missing.is_empty() {
        return Err(LifecycleError::MissingFields(missing));
    }

    if vehicle.images.is_empty() {
        return Err(LifecycleError::NoImages);
    }
    Ok(())
}

pub fn apply_submission(vehicle: &mut Vehicle, now: DateTime<Utc>) {
    vehicle.status = VehicleStatus::Pending;
    vehicle.submitted_at = Some(now);
    vehicle.updated_at = now;
}

pub fn check_editable(vehicle: &Vehicle) -> Result<(), LifecycleError> {
    match vehicle.status {
        VehicleStatus::Draft | VehicleStatus::Rejected => Ok(()),
        other => Err(LifecycleError::NotEditable(other)),
    }
}

pub fn check_review(vehicle: &Vehicle, decision: ReviewDecision) -> Result<(), LifecycleError> {
    if !vehicle.is_active || !can_transition(vehicle.status, decision.resulting_status()) {
        return Err(LifecycleError::NotReviewable(vehicle.status));
    }
    Ok(())
}

/// Approval publishes the listing; rejection takes it down.
pub fn apply_review(vehicle: &mut Vehicle, decision: ReviewDecision, now: DateTime<Utc>) {
    vehicle.status = decision.resulting_status();
    vehicle.is_published = decision == ReviewDecision::Approved;
    vehicle.updated_at = now;
}

pub fn check_publish(vehicle: &Vehicle) -> Result<(), LifecycleError> {
    if vehicle.status != VehicleStatus::Approved {
        return Err(LifecycleError::NotPublishable(vehicle.status));
    }
    Ok(())
}

// --- Booking lifecycle ---

/// Who is asking for a booking status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingActor {
    Buyer,
    Seller,
}

/// Sellers confirm, cancel and complete; buyers may only cancel open bookings.
pub fn check_booking_transition(
    from: BookingStatus,
    to: BookingStatus,
    actor: BookingActor,
) -> Result<(), LifecycleError> {
    use BookingStatus::*;
    let allowed = match actor {
        BookingActor::Seller => matches!(
            (from, to),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        ),
        BookingActor::Buyer => matches!((from, to), (Pending, Cancelled) | (Confirmed, Cancelled)),
    };
    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::BookingTransition { from, to })
    }
}

/// Statuses that hold the vehicle's calendar.
pub fn blocks_calendar(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Confirmed)
}

/// Validates a requested inclusive range and returns its length in days.
pub fn booking_days(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<i64, AppError> {
    if start < today {
        return Err(AppError::Validation("startDate cannot be in the past".into()));
    }
    if end < start {
        return Err(AppError::Validation("endDate must not be before startDate".into()));
    }
    Ok((end - start).num_days() + 1)
}

/// Inclusive ranges overlap when each starts no later than the other ends.
pub fn ranges_overlap(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

pub fn booking_total(days: i64, daily_rate_cents: i64) -> Result<i64, AppError> {
    days.checked_mul(daily_rate_cents)
        .ok_or_else(|| AppError::Validation("Booking total is out of range".into()))
}
