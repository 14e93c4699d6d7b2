//! Report submission: the draft form, photo capture, location picking and
//! the fallback to the local cache when the server cannot be reached.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;

use super::api::{ApiClient, ClientError};
use super::geo::{GeolocationError, Geolocator};
use super::session::Session;
use super::store::{CachedReport, LocalStore, StoreError};
use crate::models::{Location, Report, ReportStatus, MANUAL_LOCATION, MAX_PHOTOS};

/// Largest accepted photo, in bytes.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{0}")]
    Validation(String),
    #[error("Please log in to report an issue")]
    NotLoggedIn,
    #[error("A submission is already in progress")]
    Busy,
    #[error("Location out of range: {0}")]
    InvalidLocation(Location),
    #[error(transparent)]
    Geolocation(#[from] GeolocationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhotoError {
    #[error("not a supported image (PNG, JPEG, GIF, WebP or BMP)")]
    NotAnImage,
    #[error("larger than {} MB", MAX_PHOTO_BYTES / (1024 * 1024))]
    TooLarge,
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// A photo accepted into the draft, encoded as a data URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub name: String,
    pub data_url: String,
}

/// Result of one upload batch.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub accepted: Vec<String>,
    pub rejected: Vec<(String, PhotoError)>,
    /// Files beyond the per-report limit that were not looked at.
    pub ignored: usize,
}

/// How the current location was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    MapClick,
    MarkerDrag,
    Autocomplete,
    Geolocation,
}

/// Where the draft is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Idle,
    PhotoCaptured,
    LocationSelected,
    Submitting,
    Submitted,
}

/// Outcome of a submission that got past validation.
#[derive(Debug)]
pub enum Submission {
    /// Accepted by the server.
    Synced(Report),
    /// The server could not take it; the report is kept on this device.
    CachedLocally { report: Report, error: ClientError },
}

impl Submission {
    pub fn report(&self) -> &Report {
        match self {
            Submission::Synced(report) | Submission::CachedLocally { report, .. } => report,
        }
    }
}

/// Result of replaying cached reports.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub synced: Vec<Report>,
    pub failed: Vec<(String, ClientError)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Editing,
    Submitting,
    Submitted,
}

/// Owns one report draft and submits it through the API client.
pub struct ReportManager {
    api: ApiClient,
    store: LocalStore,
    issue_type: String,
    description: String,
    address: String,
    location: Option<(Location, LocationSource)>,
    photos: Vec<Photo>,
    phase: Phase,
}

impl ReportManager {
    pub fn new(api: ApiClient, store: LocalStore) -> Self {
        Self {
            api,
            store,
            issue_type: String::new(),
            description: String::new(),
            address: String::new(),
            location: None,
            photos: Vec::new(),
            phase: Phase::Editing,
        }
    }

    pub fn state(&self) -> DraftState {
        match self.phase {
            Phase::Submitting => DraftState::Submitting,
            Phase::Submitted => DraftState::Submitted,
            Phase::Editing if self.location.is_some() => DraftState::LocationSelected,
            Phase::Editing if !self.photos.is_empty() => DraftState::PhotoCaptured,
            Phase::Editing => DraftState::Idle,
        }
    }

    pub fn set_issue_type(&mut self, issue_type: impl Into<String>) {
        self.issue_type = issue_type.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = address.into();
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn location(&self) -> Option<(Location, LocationSource)> {
        self.location
    }

    /// Replace the photo set with up to [`MAX_PHOTOS`] images from `files`.
    ///
    /// Files are decoded independently; a bad file is reported and skipped
    /// without affecting the others.
    pub fn add_photos(&mut self, files: Vec<PhotoFile>) -> UploadOutcome {
        let mut outcome = UploadOutcome {
            ignored: files.len().saturating_sub(MAX_PHOTOS),
            ..UploadOutcome::default()
        };

        self.photos.clear();
        for file in files.into_iter().take(MAX_PHOTOS) {
            match encode_photo(&file.bytes) {
                Ok(data_url) => {
                    outcome.accepted.push(file.name.clone());
                    self.photos.push(Photo {
                        name: file.name,
                        data_url,
                    });
                }
                Err(reason) => {
                    tracing::debug!(file = %file.name, %reason, "Photo rejected");
                    outcome.rejected.push((file.name, reason));
                }
            }
        }

        outcome
    }

    /// Remove the photo at `index`.
    pub fn remove_photo(&mut self, index: usize) -> Option<Photo> {
        (index < self.photos.len()).then(|| self.photos.remove(index))
    }

    /// Set the report location. The most recent call wins regardless of source.
    pub fn set_location(
        &mut self,
        location: Location,
        source: LocationSource,
    ) -> Result<(), ReportError> {
        if !location.is_valid() {
            return Err(ReportError::InvalidLocation(location));
        }
        self.location = Some((location, source));
        Ok(())
    }

    /// Apply an address autocomplete selection: both the address text and its coordinate.
    pub fn select_place(
        &mut self,
        address: impl Into<String>,
        location: Location,
    ) -> Result<(), ReportError> {
        self.set_location(location, LocationSource::Autocomplete)?;
        self.address = address.into();
        Ok(())
    }

    /// Ask the device for its position and use it as the report location.
    pub fn use_current_location(
        &mut self,
        geolocator: &dyn Geolocator,
    ) -> Result<Location, ReportError> {
        let location = geolocator.current_position()?;
        self.set_location(location, LocationSource::Geolocation)?;
        Ok(location)
    }

    /// Check the fields that must be filled before anything is sent.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.issue_type.trim().is_empty() {
            return Err(ReportError::Validation(
                "Please select an issue type".to_string(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(ReportError::Validation(
                "Please provide a description".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the report the draft would submit for `session`.
    pub fn build_report(&self, session: &Session) -> Report {
        let address = match self.address.trim() {
            "" => MANUAL_LOCATION.to_string(),
            address => address.to_string(),
        };

        Report {
            id: Utc::now().timestamp_millis().to_string(),
            user_id: session.user.id.clone(),
            user_name: session.user.name.clone(),
            user_email: session.user.email.clone(),
            issue_type: self.issue_type.trim().to_string(),
            description: self.description.trim().to_string(),
            location: self.location.map(|(location, _)| location),
            address,
            photos: self.photos.iter().map(|p| p.data_url.clone()).collect(),
            timestamp: Utc::now().to_rfc3339(),
            status: ReportStatus::Pending,
            comments: Vec::new(),
        }
    }

    /// Validate and submit the draft.
    ///
    /// Validation failures return before any network call. When the server
    /// rejects the report or cannot be reached, the report is written to the
    /// local cache and returned as [`Submission::CachedLocally`].
    pub async fn submit(&mut self) -> Result<Submission, ReportError> {
        if self.phase == Phase::Submitting {
            return Err(ReportError::Busy);
        }
        self.validate()?;
        let session = self.store.session().ok_or(ReportError::NotLoggedIn)?;
        let report = self.build_report(&session);

        self.phase = Phase::Submitting;
        let result = self.api.create_report(&report).await;

        let submission = match result {
            Ok(stored) => {
                tracing::info!(report_id = %stored.id, "Report submitted");
                Submission::Synced(stored)
            }
            Err(error) => {
                tracing::warn!(report_id = %report.id, %error, "Report kept locally");
                let cached = self.store.cache_report(CachedReport {
                    report: report.clone(),
                    pending_sync: true,
                    last_error: Some(error.to_string()),
                });
                if let Err(store_error) = cached {
                    self.phase = Phase::Editing;
                    return Err(store_error.into());
                }
                Submission::CachedLocally { report, error }
            }
        };

        self.clear_draft();
        self.phase = Phase::Submitted;
        Ok(submission)
    }

    /// Send cached reports that the server has not accepted yet.
    ///
    /// Accepted reports leave the cache; failures stay with their latest error.
    pub async fn sync_pending(&mut self) -> Result<SyncSummary, ReportError> {
        let pending: Vec<CachedReport> = self
            .store
            .cached_reports()
            .into_iter()
            .filter(|entry| entry.pending_sync)
            .collect();

        let mut summary = SyncSummary::default();
        for entry in pending {
            let local_id = entry.report.id.clone();
            match self.api.create_report(&entry.report).await {
                Ok(stored) => {
                    self.store
                        .update(|s| s.report_cache.retain(|c| c.report.id != local_id))?;
                    tracing::info!(local_id = %local_id, report_id = %stored.id, "Cached report synced");
                    summary.synced.push(stored);
                }
                Err(error) => {
                    let message = error.to_string();
                    self.store.update(|s| {
                        for cached in s.report_cache.iter_mut() {
                            if cached.report.id == local_id {
                                cached.last_error = Some(message.clone());
                            }
                        }
                    })?;
                    summary.failed.push((local_id, error));
                }
            }
        }

        Ok(summary)
    }

    /// Discard the draft and return to [`DraftState::Idle`].
    pub fn reset(&mut self) {
        self.clear_draft();
        self.phase = Phase::Editing;
    }

    fn clear_draft(&mut self) {
        self.issue_type.clear();
        self.description.clear();
        self.address.clear();
        self.location = None;
        self.photos.clear();
    }
}

/// Detect the image type from its leading bytes.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") && bytes.len() >= 14 {
        Some("image/bmp")
    } else {
        None
    }
}

/// Encode an image as a `data:` URL.
pub fn encode_photo(bytes: &[u8]) -> Result<String, PhotoError> {
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(PhotoError::TooLarge);
    }
    let mime = sniff_mime(bytes).ok_or(PhotoError::NotAnImage)?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}
