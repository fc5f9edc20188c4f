//! Domain model for grievance complaints.

pub mod complaint;

pub use complaint::{
    Category, Complaint, FieldError, InvalidTransition, NewComplaint, ParseEnumError, Priority,
    Status,
};
