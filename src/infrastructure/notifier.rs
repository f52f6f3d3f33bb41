use uuid::Uuid;

use crate::domain::errors::NotifyError;
use crate::domain::ports::{NotificationKind, NotificationSender};

/// Notification sender that writes to the application log. Stands in for a
/// real channel (mail, push, ...) wired up at deployment time.
pub struct LogNotifier;

impl NotificationSender for LogNotifier {
    fn send(
        &self,
        user_id: Uuid,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        log::info!("notification [{kind:?}] to user {user_id}: {message}");
        Ok(())
    }
}
