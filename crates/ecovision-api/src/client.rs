//! Resource calls routed through the authenticated request layer.

use std::path::Path;

use ecovision_auth::{AuthClient, AuthError, MultipartBody};
use tracing::debug;

use crate::errors::Result;
use crate::image::ImageUpload;
use crate::types::{LeaderboardEntry, NewWasteBank, Prediction, TrashCan, WasteBank};

/// Leaderboard resource.
pub const LEADERBOARD_PATH: &str = "/leaderboard/";
/// Waste bank collection.
pub const WASTE_BANKS_PATH: &str = "/waste-banks";
/// Trash can collection.
pub const TRASH_CANS_PATH: &str = "/trash-cans";
/// Image classification endpoint.
pub const PREDICT_PATH: &str = "/predict/";
/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Typed client for the EcoVision resources.
#[derive(Clone, Debug)]
pub struct EcoVisionApi {
    auth: AuthClient,
}

impl EcoVisionApi {
    /// Wrap an authenticated client.
    pub fn new(auth: AuthClient) -> Self {
        Self { auth }
    }

    /// The underlying authenticated client.
    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Leaderboard rows in rank order.
    #[tracing::instrument(skip_all)]
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        Ok(self.auth.get(LEADERBOARD_PATH).await?)
    }

    /// All waste banks.
    #[tracing::instrument(skip_all)]
    pub async fn waste_banks(&self) -> Result<Vec<WasteBank>> {
        Ok(self.auth.get(WASTE_BANKS_PATH).await?)
    }

    /// Create a waste bank and return the stored record.
    #[tracing::instrument(skip_all, fields(name = %bank.name))]
    pub async fn add_waste_bank(&self, bank: &NewWasteBank) -> Result<WasteBank> {
        let body = serde_json::to_value(bank).map_err(AuthError::from)?;
        Ok(self.auth.post_json(WASTE_BANKS_PATH, body).await?)
    }

    /// All trash cans.
    #[tracing::instrument(skip_all)]
    pub async fn trash_cans(&self) -> Result<Vec<TrashCan>> {
        Ok(self.auth.get(TRASH_CANS_PATH).await?)
    }

    /// Classify an image file.
    pub async fn classify_path(&self, path: &Path) -> Result<Prediction> {
        let upload = ImageUpload::from_path(path).await?;
        self.classify_image(&upload).await
    }

    /// Classify a validated image.
    #[tracing::instrument(skip_all, fields(file = %upload.file_name(), mime = %upload.mime()))]
    pub async fn classify_image(&self, upload: &ImageUpload) -> Result<Prediction> {
        debug!(bytes = upload.bytes().len(), "uploading image");
        let form = MultipartBody::new().file(
            IMAGE_FIELD,
            upload.file_name(),
            upload.mime(),
            upload.bytes().clone(),
        );
        Ok(self.auth.post_multipart(PREDICT_PATH, form).await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
