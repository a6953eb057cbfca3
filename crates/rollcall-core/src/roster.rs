//! Roster listing and CSV upload through the authenticated client.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, FilePart, RequestBody};
use crate::models::Student;
use crate::notify::{NoticeKind, Notifier};

pub const STUDENTS_PATH: &str = "/api/v1/auth/users/";
pub const UPLOAD_PATH: &str = "/api/v1/auth/users/upload-users/";

/// Rows shown per roster page
pub const STUDENTS_PER_PAGE: usize = 5;

/// Multipart field the backend reads the CSV from
const UPLOAD_FIELD: &str = "file";

/// A window onto a list, as shown by the paginated table.
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// Zero-based page index
    pub index: usize,
    pub page_count: usize,
    pub total: usize,
}

/// Slice `items` into page `index`. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], index: usize, per_page: usize) -> Page<'_, T> {
    let per_page = per_page.max(1);
    let total = items.len();
    let start = index.saturating_mul(per_page).min(total);
    let end = start.saturating_add(per_page).min(total);
    Page {
        items: &items[start..end],
        index,
        page_count: total.div_ceil(per_page),
        total,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// The server accepted the upload with a status other than 200
    UnexpectedResponse,
}

/// The dashboard's data: the student list and the CSV upload.
pub struct RosterService {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    students: Vec<Student>,
}

impl RosterService {
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            students: Vec::new(),
        }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn page(&self, index: usize) -> Page<'_, Student> {
        paginate(&self.students, index, STUDENTS_PER_PAGE)
    }

    /// Fetch all students, without touching the loaded list
    pub async fn fetch_students(&self) -> Result<Vec<Student>> {
        let students: Vec<Student> = self
            .api
            .get_json(STUDENTS_PATH)
            .await
            .context("Failed to fetch students")?;
        debug!(count = students.len(), "Students fetched");
        Ok(students)
    }

    /// Reload the student list. On failure the previous list is kept and an
    /// error notice is shown.
    pub async fn load(&mut self) -> Result<()> {
        match self.fetch_students().await {
            Ok(students) => {
                self.students = students;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load roster");
                if !is_session_expired(&e) {
                    self.notifier.notify(NoticeKind::Error, "Failed to fetch students.");
                }
                Err(e)
            }
        }
    }

    /// Upload a CSV file, then reload the roster when the server reports success.
    pub async fn upload(&mut self, path: Option<&Path>) -> Result<UploadOutcome> {
        let Some(path) = path else {
            self.notifier
                .notify(NoticeKind::Error, "Please select a file to upload.");
            anyhow::bail!("No file selected for upload");
        };

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());
        info!(file = %file_name, bytes = bytes.len(), "Uploading roster");

        let body = RequestBody::Multipart(FilePart {
            field: UPLOAD_FIELD.to_string(),
            file_name,
            mime: "text/csv".to_string(),
            bytes,
        });

        let response = match self.api.request(Method::POST, UPLOAD_PATH, body).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Roster upload failed");
                if !e.is_session_expired() {
                    let message = e.detail().unwrap_or_else(|| format!("Upload failed: {}", e));
                    self.notifier.notify(NoticeKind::Error, &message);
                }
                return Err(anyhow::Error::new(e).context("Failed to upload roster"));
            }
        };

        if response.status() != StatusCode::OK {
            warn!(status = response.status().as_u16(), "Unexpected upload response");
            self.notifier
                .notify(NoticeKind::Error, "Unexpected response format.");
            return Ok(UploadOutcome::UnexpectedResponse);
        }

        self.notifier
            .notify(NoticeKind::Success, "File uploaded successfully");
        // The upload itself succeeded; a failed reload has already been reported
        if let Err(e) = self.load().await {
            debug!(error = %e, "Roster reload after upload failed");
        }
        Ok(UploadOutcome::Uploaded)
    }
}

/// The session controller reports expiry itself; don't notify twice
fn is_session_expired(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_session_expired)
}
