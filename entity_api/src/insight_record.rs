//! Queries for insight_records table.

use super::error::Error;
use entity::delivery_outcome::DeliveryOutcome;
use entity::insight_records::{ActiveModel, Column, Entity, Model};
use entity::lists::{ActionItems, TextList};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{Set, Unchanged},
    ConnectionTrait, DatabaseConnection,
};

/// Synthesis output to store for a session.
#[derive(Clone, Debug, PartialEq)]
pub struct NewInsight {
    pub summary: String,
    pub decisions: TextList,
    pub action_items: ActionItems,
    pub open_questions: TextList,
    pub topics: TextList,
    pub extraction_provider: String,
    pub extraction_model: String,
    pub tokens_used: i32,
    pub extraction_seconds: f64,
}

impl NewInsight {
    pub fn summary_word_count(&self) -> i32 {
        self.summary.split_whitespace().count() as i32
    }
}

/// Delivery-tracking fields written after a successful send.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliveryTracking {
    pub delivered_at: DateTimeWithTimeZone,
    pub recipients: TextList,
    pub outcome: DeliveryOutcome,
}

/// Finds the insight record of a session, if one was synthesized
pub async fn find_by_session_id(
    db: &DatabaseConnection,
    session_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .one(db)
        .await?)
}

/// Inserts the record for a session, or overwrites its content in place.
///
/// Overwriting resets the delivery tracking since the stored content has not been sent yet.
pub(crate) async fn upsert<C: ConnectionTrait>(
    db: &C,
    session_id: Id,
    new_insight: NewInsight,
) -> Result<Model, Error> {
    let now = chrono::Utc::now();
    let summary_word_count = new_insight.summary_word_count();
    let existing = Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .one(db)
        .await?;

    let active_model = ActiveModel {
        session_id: Set(session_id),
        summary: Set(new_insight.summary),
        summary_word_count: Set(summary_word_count),
        decisions: Set(new_insight.decisions),
        action_items: Set(new_insight.action_items),
        open_questions: Set(new_insight.open_questions),
        topics: Set(new_insight.topics),
        extraction_provider: Set(new_insight.extraction_provider),
        extraction_model: Set(new_insight.extraction_model),
        tokens_used: Set(new_insight.tokens_used),
        extraction_seconds: Set(new_insight.extraction_seconds),
        delivered_at: Set(None),
        delivered_recipients: Set(TextList::default()),
        delivery_outcome: Set(None),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    match existing {
        Some(existing) => {
            debug!("Regenerating insight record {} for session {session_id}", existing.id);
            Ok(ActiveModel {
                id: Unchanged(existing.id),
                created_at: Unchanged(existing.created_at),
                ..active_model
            }
            .update(db)
            .await?)
        }
        None => {
            debug!("Creating insight record for session {session_id}");
            Ok(ActiveModel {
                created_at: Set(now.into()),
                ..active_model
            }
            .insert(db)
            .await?)
        }
    }
}

/// Overwrites only the delivery-tracking fields of a session's record.
pub(crate) async fn record_delivery<C: ConnectionTrait>(
    db: &C,
    session_id: Id,
    tracking: DeliveryTracking,
) -> Result<Model, Error> {
    let existing = Entity::find()
        .filter(Column::SessionId.eq(session_id))
        .one(db)
        .await?
        .ok_or_else(Error::not_found)?;

    debug!(
        "Recording delivery of insight record {} to {} recipient(s)",
        existing.id,
        tracking.recipients.len()
    );

    Ok(ActiveModel {
        id: Unchanged(existing.id),
        delivered_at: Set(Some(tracking.delivered_at)),
        delivered_recipients: Set(tracking.recipients),
        delivery_outcome: Set(Some(tracking.outcome)),
        updated_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    }
    .update(db)
    .await?)
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use entity::lists::ActionItem;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn insight_model(session_id: Id) -> Model {
        let now = chrono::Utc::now();
        Model {
            id: Id::new_v4(),
            session_id,
            summary: "The team synced on the release.".to_string(),
            summary_word_count: 6,
            decisions: TextList(vec!["Ship on Friday".to_string()]),
            action_items: ActionItems(vec![ActionItem {
                task: "Write release notes".to_string(),
                owner: Some("Ada".to_string()),
                due_date: None,
            }]),
            open_questions: TextList::default(),
            topics: TextList(vec!["release".to_string()]),
            extraction_provider: "openai".to_string(),
            extraction_model: "gpt-4-turbo-preview".to_string(),
            tokens_used: 812,
            extraction_seconds: 2.5,
            delivered_at: None,
            delivered_recipients: TextList::default(),
            delivery_outcome: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[tokio::test]
    async fn find_by_session_id_returns_none_before_synthesis() -> Result<(), Error> {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![Vec::<Model>::new()])
            .into_connection();

        assert!(find_by_session_id(&db, Id::new_v4()).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn record_delivery_updates_only_tracking_fields() -> Result<(), Error> {
        let session_id = Id::new_v4();
        let before = insight_model(session_id);
        let mut after = before.clone();
        after.delivered_recipients = TextList(vec!["a@x.com".to_string()]);
        after.delivery_outcome = Some(DeliveryOutcome::Sent);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![before.clone()], vec![after.clone()]])
            .into_connection();

        let updated = record_delivery(
            &db,
            session_id,
            DeliveryTracking {
                delivered_at: chrono::Utc::now().into(),
                recipients: TextList(vec!["a@x.com".to_string()]),
                outcome: DeliveryOutcome::Sent,
            },
        )
        .await?;

        assert_eq!(updated.summary, before.summary);
        assert_eq!(updated.action_items, before.action_items);
        assert_eq!(updated.delivery_outcome, Some(DeliveryOutcome::Sent));

        Ok(())
    }

    #[test]
    fn summary_word_count_splits_on_whitespace() {
        let insight = NewInsight {
            summary: "  Quick   sync on\nrelease ".to_string(),
            decisions: TextList::default(),
            action_items: ActionItems::default(),
            open_questions: TextList::default(),
            topics: TextList::default(),
            extraction_provider: "openai".to_string(),
            extraction_model: "gpt-4-turbo-preview".to_string(),
            tokens_used: 0,
            extraction_seconds: 0.0,
        };
        assert_eq!(insight.summary_word_count(), 4);
    }
}
