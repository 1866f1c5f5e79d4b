use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS meeting_synthesis;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO meeting_synthesis, public;")
            .await?;

        // The service connects as the meeting_synthesis role
        manager
            .get_connection()
            .execute_unprepared(r#"
                DO $$ BEGIN
                    GRANT ALL ON SCHEMA meeting_synthesis TO meeting_synthesis;

                    ALTER DEFAULT PRIVILEGES IN SCHEMA meeting_synthesis GRANT ALL ON TABLES TO meeting_synthesis;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA meeting_synthesis GRANT ALL ON SEQUENCES TO meeting_synthesis;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA meeting_synthesis GRANT ALL ON FUNCTIONS TO meeting_synthesis;
                END $$;
            "#)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(r#"
                DO $$ BEGIN
                    ALTER DEFAULT PRIVILEGES IN SCHEMA meeting_synthesis REVOKE ALL ON FUNCTIONS FROM meeting_synthesis;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA meeting_synthesis REVOKE ALL ON SEQUENCES FROM meeting_synthesis;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA meeting_synthesis REVOKE ALL ON TABLES FROM meeting_synthesis;
                    REVOKE ALL ON SCHEMA meeting_synthesis FROM meeting_synthesis;
                END $$;
            "#)
            .await?;

        // CASCADE removes every object in the schema
        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS meeting_synthesis CASCADE;")
            .await?;

        Ok(())
    }
}
