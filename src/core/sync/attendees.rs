use tracing::info;

use crate::{
    core::{
        auth::AuthProvider,
        db::{DocumentStore, StoreResult},
        sync::{CollectionSync, SyncedRecord},
    },
    models::{ATTENDEES, Attendee, CHECKED_IN, CheckInPayload},
};

impl SyncedRecord for Attendee {
    const COLLECTION: &'static str = ATTENDEES;
    const ORDER_FIELD: &'static str = "checkInTime";
    const LOAD_ERROR: &'static str = "Unable to load the attendee list.";
}

/// Live check-in list, latest check-in first.
pub type Attendees<S, A> = CollectionSync<Attendee, S, A>;

impl<S: DocumentStore, A: AuthProvider> CollectionSync<Attendee, S, A> {
    /// Record a check-in. The attendee shows up with the next snapshot.
    pub async fn check_in(&self, payload: CheckInPayload) -> StoreResult<String> {
        let attendee = Attendee {
            id: String::new(),
            user_id: payload.user_id,
            display_name: payload.display_name,
            picture_url: payload.picture_url.unwrap_or_default(),
            status: CHECKED_IN.to_string(),
            check_in_time: None,
        };
        let id = self.add(&attendee).await?;
        info!(id = %id, user_id = %attendee.user_id, "attendee checked in");
        Ok(id)
    }
}
