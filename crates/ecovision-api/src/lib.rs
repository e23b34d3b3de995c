//! # ecovision-api
//!
//! Typed calls for the EcoVision resources. Every call goes through
//! [`ecovision_auth::AuthClient`], so expired access tokens are refreshed
//! and the request retried once without the caller noticing.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod image;
pub mod types;

pub use client::EcoVisionApi;
pub use errors::{ApiError, Result, user_message};
pub use image::{ImageUpload, MAX_IMAGE_BYTES};
pub use types::{
    LeaderboardEntry, NewWasteBank, OpeningHours, Prediction, TrashCan, WasteBank, WasteType,
};
