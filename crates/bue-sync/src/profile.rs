//! Writes to the signed-in user's own profile record, `users/{uid}`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{AuthSession, Connectivity, RealtimeDatabase, is_valid_key, paths};
use crate::error::ProfileWriteError;

pub const USER_IMAGE_FIELD: &str = "userImage";

// Owned by `SavedEventRelations`; a plain overwrite would drop the other side.
const RESERVED_FIELDS: &[&str] = &["savedEvents"];

#[derive(Clone)]
pub struct ProfileWriter {
    db: Arc<dyn RealtimeDatabase>,
    auth: Arc<dyn AuthSession>,
    connectivity: Arc<dyn Connectivity>,
}

impl ProfileWriter {
    pub fn new(
        db: Arc<dyn RealtimeDatabase>,
        auth: Arc<dyn AuthSession>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            db,
            auth,
            connectivity,
        }
    }

    /// Replaces one field of the signed-in user's record. A `null` value
    /// removes the field.
    pub async fn update_field(&self, field: &str, value: Value) -> Result<(), ProfileWriteError> {
        let uid = self.preflight(field)?;

        if let Err(e) = self.db.set(&paths::user_field(&uid, field), value).await {
            warn!("Failed to update field {} for {}: {}", field, uid, e);
            return Err(e.into());
        }
        info!("Updated field {} for {}", field, uid);
        Ok(())
    }

    /// Points the profile at an already uploaded image.
    pub async fn set_profile_image_url(&self, download_url: &str) -> Result<(), ProfileWriteError> {
        self.update_field(USER_IMAGE_FIELD, Value::from(download_url))
            .await
    }

    fn preflight(&self, field: &str) -> Result<String, ProfileWriteError> {
        if !self.connectivity.is_online() {
            return Err(ProfileWriteError::Offline);
        }
        let uid = self
            .auth
            .current_uid()
            .ok_or(ProfileWriteError::SignedOut)?;

        if !is_valid_key(&uid) {
            return Err(ProfileWriteError::InvalidKey(uid));
        }
        if !is_valid_key(field) {
            return Err(ProfileWriteError::InvalidKey(field.to_string()));
        }
        if RESERVED_FIELDS.contains(&field) {
            return Err(ProfileWriteError::ReservedField(field.to_string()));
        }
        Ok(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::platform::{NetworkStatus, Session};
    use serde_json::json;

    fn writer(backend: &Arc<MemoryBackend>, session: Session, online: bool) -> ProfileWriter {
        ProfileWriter::new(
            backend.clone(),
            Arc::new(session),
            Arc::new(NetworkStatus::new(online)),
        )
    }

    #[tokio::test]
    async fn updates_only_the_named_field() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "users/u1",
            json!({ "firstName": "Rhett", "lastName": "Terrier", "savedEvents": ["E1"] }),
        );
        let profile = writer(&backend, Session::signed_in("u1"), true);

        profile.update_field("firstName", json!("Ada")).await.unwrap();
        assert_eq!(
            backend.value_at("users/u1"),
            Some(json!({ "firstName": "Ada", "lastName": "Terrier", "savedEvents": ["E1"] }))
        );
    }

    #[tokio::test]
    async fn image_url_lands_in_user_image() {
        let backend = Arc::new(MemoryBackend::new());
        let profile = writer(&backend, Session::signed_in("u1"), true);

        profile
            .set_profile_image_url("https://cdn.example/u1.png")
            .await
            .unwrap();
        assert_eq!(
            backend.value_at("users/u1/userImage"),
            Some(json!("https://cdn.example/u1.png"))
        );
    }

    #[tokio::test]
    async fn gated_writes_do_no_io() {
        let backend = Arc::new(MemoryBackend::new());

        let offline = writer(&backend, Session::signed_in("u1"), false);
        assert!(matches!(
            offline.update_field("firstName", json!("Ada")).await,
            Err(ProfileWriteError::Offline)
        ));

        let signed_out = writer(&backend, Session::default(), true);
        assert!(matches!(
            signed_out.set_profile_image_url("https://cdn.example/x.png").await,
            Err(ProfileWriteError::SignedOut)
        ));

        let online = writer(&backend, Session::signed_in("u1"), true);
        assert!(matches!(
            online.update_field("first.name", json!("Ada")).await,
            Err(ProfileWriteError::InvalidKey(_))
        ));
        assert!(matches!(
            online.update_field("savedEvents", json!([])).await,
            Err(ProfileWriteError::ReservedField(_))
        ));

        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_path("users/u1/lastName");
        let profile = writer(&backend, Session::signed_in("u1"), true);

        assert!(matches!(
            profile.update_field("lastName", json!("T")).await,
            Err(ProfileWriteError::Backend(_))
        ));
        assert_eq!(backend.value_at("users/u1/lastName"), None);
    }
}
