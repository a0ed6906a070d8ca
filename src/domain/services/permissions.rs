use crate::domain::models::event::Event;
use crate::domain::models::user::{Role, UserSummary};
use crate::domain::ports::PermissionOracle;
use crate::error::BookingError;

/// Admins and event managers manage every event. Event leaders manage an
/// event only when its association token resolves to a group they own or
/// additionally manage. Teachers and students manage nothing.
pub async fn is_user_able_to_manage_event(
    oracle: &dyn PermissionOracle,
    user: &UserSummary,
    event: &Event,
) -> Result<bool, BookingError> {
    match user.role {
        Role::Admin | Role::EventManager => Ok(true),
        Role::EventLeader => {
            if let Some(token) = event.group_token.as_deref() {
                if let Some(association) = oracle.lookup_association_token(user, token).await? {
                    return oracle
                        .is_owner_or_additional_manager(&association.group_id, &user.id)
                        .await;
                }
            }
            Ok(false)
        }
        Role::Teacher | Role::Student => Ok(false),
    }
}
