//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names match the persisted cart format so that views can use the
//! same model for both.

pub mod cart_dto;

pub use cart_dto::*;
