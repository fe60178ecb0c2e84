use rusqlite::Connection;

use crate::error::Result;

/// Initialise every table. Safe to call on every startup — `IF NOT EXISTS`
/// throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS businesses (
            business_id        TEXT PRIMARY KEY NOT NULL,
            business_name       TEXT NOT NULL UNIQUE,
            owner_id            TEXT NOT NULL,
            internal_api_key    TEXT NOT NULL UNIQUE,
            business_description TEXT,
            address             TEXT,
            phone_number        TEXT,
            website             TEXT,
            fallback_reply      TEXT,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            user_id     TEXT PRIMARY KEY NOT NULL,
            first_name  TEXT,
            last_name   TEXT,
            email       TEXT UNIQUE,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS agents (
            agent_id    TEXT PRIMARY KEY NOT NULL,
            business_id TEXT NOT NULL REFERENCES businesses(business_id),
            agent_name  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS template_variables (
            variable_id     TEXT PRIMARY KEY NOT NULL,
            variable_name   TEXT NOT NULL UNIQUE,
            description     TEXT,
            default_value   TEXT,
            example         TEXT,
            category        TEXT NOT NULL DEFAULT 'unknown',
            is_dynamic      INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS templates (
            template_id     TEXT PRIMARY KEY NOT NULL,
            business_id     TEXT NOT NULL REFERENCES businesses(business_id),
            template_name   TEXT NOT NULL,
            template_type   TEXT NOT NULL,
            content         TEXT NOT NULL,
            system_prompt   TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_templates_business
            ON templates(business_id, template_type);

        CREATE TABLE IF NOT EXISTS template_variable_usage (
            template_id TEXT NOT NULL REFERENCES templates(template_id),
            variable_id TEXT NOT NULL REFERENCES template_variables(variable_id),
            PRIMARY KEY (template_id, variable_id)
        );

        CREATE TABLE IF NOT EXISTS stages (
            stage_id                        TEXT PRIMARY KEY NOT NULL,
            business_id                     TEXT NOT NULL REFERENCES businesses(business_id),
            agent_id                        TEXT REFERENCES agents(agent_id),
            stage_name                      TEXT NOT NULL,
            stage_description               TEXT,
            stage_type                      TEXT NOT NULL DEFAULT 'information',
            stage_selection_template_id     TEXT NOT NULL REFERENCES templates(template_id),
            data_extraction_template_id     TEXT NOT NULL REFERENCES templates(template_id),
            response_generation_template_id TEXT NOT NULL REFERENCES templates(template_id),
            created_at                      TEXT NOT NULL,
            updated_at                      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_stages_business
            ON stages(business_id, created_at);

        CREATE TABLE IF NOT EXISTS stage_transitions (
            business_id   TEXT NOT NULL REFERENCES businesses(business_id),
            from_stage_id TEXT NOT NULL REFERENCES stages(stage_id),
            to_stage_id   TEXT NOT NULL REFERENCES stages(stage_id),
            condition     TEXT,
            PRIMARY KEY (business_id, from_stage_id, to_stage_id),
            CHECK (from_stage_id != to_stage_id)
        );

        CREATE TABLE IF NOT EXISTS conversations (
            conversation_id     TEXT PRIMARY KEY NOT NULL,
            business_id         TEXT NOT NULL REFERENCES businesses(business_id),
            user_id             TEXT NOT NULL REFERENCES users(user_id),
            agent_id            TEXT REFERENCES agents(agent_id),
            current_stage_id    TEXT REFERENCES stages(stage_id),
            session_id          TEXT NOT NULL,
            start_time          TEXT NOT NULL,
            last_updated        TEXT NOT NULL,
            status              TEXT NOT NULL DEFAULT 'active',
            conversation_summary TEXT,
            llm_call_id         TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations(business_id, user_id);
        CREATE INDEX IF NOT EXISTS idx_conversations_session
            ON conversations(business_id, session_id);

        CREATE TABLE IF NOT EXISTS messages (
            message_id      TEXT PRIMARY KEY NOT NULL,
            conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
            message_content TEXT NOT NULL,
            sender_type     TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS extracted_data (
            extraction_id   TEXT PRIMARY KEY NOT NULL,
            conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
            stage_id        TEXT REFERENCES stages(stage_id),
            data_type       TEXT NOT NULL,
            extracted_data  TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_extracted_data_conversation
            ON extracted_data(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS llm_calls (
            call_id       TEXT PRIMARY KEY NOT NULL,
            business_id   TEXT NOT NULL REFERENCES businesses(business_id),
            input_text    TEXT NOT NULL,
            response      TEXT NOT NULL,
            system_prompt TEXT,
            call_type     TEXT NOT NULL,
            error         TEXT,
            timestamp     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_llm_calls_business
            ON llm_calls(business_id, timestamp);

        CREATE TABLE IF NOT EXISTS audit_logs (
            log_id      TEXT PRIMARY KEY NOT NULL,
            business_id TEXT NOT NULL REFERENCES businesses(business_id),
            user_id     TEXT,
            action_type TEXT NOT NULL,
            action_data TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_business
            ON audit_logs(business_id, created_at);

        CREATE TABLE IF NOT EXISTS ai_control_settings (
            business_id     TEXT NOT NULL REFERENCES businesses(business_id),
            conversation_id TEXT,
            user_id         TEXT,
            paused          INTEGER NOT NULL DEFAULT 0,
            expires_at      TEXT,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (business_id, conversation_id, user_id)
        );
        ",
    )?;
    Ok(())
}
