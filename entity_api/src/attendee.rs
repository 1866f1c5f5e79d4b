//! CRUD operations for attendees table.

use super::error::Error;
use entity::attendees::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, ActiveValue::Set, ConnectionTrait, DatabaseConnection, QueryOrder,
};

/// Attendee fields supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAttendee {
    pub name: String,
    pub email: String,
    pub is_organizer: bool,
}

pub(crate) async fn insert<C: ConnectionTrait>(
    db: &C,
    session_id: Id,
    new_attendee: NewAttendee,
) -> Result<Model, Error> {
    let now = chrono::Utc::now();

    Ok(ActiveModel {
        session_id: Set(session_id),
        name: Set(new_attendee.name),
        email: Set(new_attendee.email),
        is_organizer: Set(new_attendee.is_organizer),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Adds an attendee to an existing session
pub async fn create(
    db: &DatabaseConnection,
    session_id: Id,
    new_attendee: NewAttendee,
) -> Result<Model, Error> {
    debug!(
        "Adding attendee {} to session {session_id}",
        new_attendee.email
    );
    insert(db, session_id, new_attendee).await
}

/// Lists the attendees of a session, organizers first
pub async fn find_by_session_id(
    db: &DatabaseConnection,
    session_id: Id,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .order_by_desc(Column::IsOrganizer)
        .order_by_asc(Column::CreatedAt)
        .all(db)
        .await?)
}
