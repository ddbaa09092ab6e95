use diesel::prelude::*;
use serde::Deserialize;

/// A Telegram chat to deliver artifacts to. Both secrets are stored sealed by
/// the credential vault and only opened for the duration of a delivery.
#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::destinations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Destination {
    pub id: i32,
    pub name: String,
    pub bot_token_encrypted: String,
    pub channel_id_encrypted: String,
    pub created_at: jiff_diesel::Timestamp,
    pub updated_at: jiff_diesel::Timestamp,
}

#[derive(Debug, Insertable, Deserialize, Clone)]
#[diesel(table_name = crate::schema::destinations)]
pub struct NewDestination {
    pub name: String,
    pub bot_token_encrypted: String,
    pub channel_id_encrypted: String,
}
