use super::client::ApiClient;
use super::types::{
    AdmissionCenter, ApiError, Audio, Book, Counselor, Enrollment, EventRow, GalleryImage,
    NewEnrollment, Newsletter, Video,
};

/// Typed content reads. Every list is a plain filtered select; screens do
/// their own client-side narrowing on the returned rows.
impl ApiClient {
    pub async fn list_books(&self) -> Result<Vec<Book>, ApiError> {
        self.select_rows("books", &[], Some("created_at.desc")).await
    }

    pub async fn list_audios(&self) -> Result<Vec<Audio>, ApiError> {
        self.select_rows("audios", &[], Some("created_at.desc"))
            .await
    }

    pub async fn list_videos(&self) -> Result<Vec<Video>, ApiError> {
        self.select_rows("videos", &[], Some("created_at.desc"))
            .await
    }

    pub async fn list_events(&self) -> Result<Vec<EventRow>, ApiError> {
        self.select_rows("events", &[], Some("starts_at.asc")).await
    }

    pub async fn list_newsletters(&self) -> Result<Vec<Newsletter>, ApiError> {
        self.select_rows("newsletters", &[], Some("published_on.desc"))
            .await
    }

    pub async fn list_gallery(&self) -> Result<Vec<GalleryImage>, ApiError> {
        self.select_rows("gallery", &[], Some("created_at.desc"))
            .await
    }

    pub async fn list_counselors(&self) -> Result<Vec<Counselor>, ApiError> {
        self.select_rows("counselors", &[], Some("full_name.asc"))
            .await
    }

    pub async fn list_admission_centers(&self) -> Result<Vec<AdmissionCenter>, ApiError> {
        self.select_rows("admission_centers", &[], Some("name.asc"))
            .await
    }

    pub async fn list_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, ApiError> {
        let filter = format!("eq.{}", user_id);
        self.select_rows(
            "enrollments",
            &[("user_id", filter.as_str())],
            Some("created_at.desc"),
        )
        .await
    }

    pub async fn enroll(&self, enrollment: &NewEnrollment) -> Result<Enrollment, ApiError> {
        self.insert_row("enrollments", enrollment).await
    }
}
