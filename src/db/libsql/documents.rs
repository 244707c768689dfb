//! ProfileDocumentStore implementation for LibSqlBackend.

use async_trait::async_trait;
use chrono::Utc;
use libsql::params;

use super::{LibSqlBackend, fmt_ts, get_text};
use crate::db::ProfileDocumentStore;
use crate::error::DatabaseError;
use crate::profile::{AdditionalProfile, FieldValue, ProfileField};

fn encode(value: &FieldValue) -> Result<String, DatabaseError> {
    let json = value
        .to_json()
        .map_err(|e| DatabaseError::Serialization(format!("{}: {e}", value.field())))?;
    Ok(json.to_string())
}

const UPSERT_FIELD: &str = "INSERT INTO profile_documents (user_id, field, value, updated_at) \
     VALUES (?1, ?2, ?3, ?4) \
     ON CONFLICT(user_id, field) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

#[async_trait]
impl ProfileDocumentStore for LibSqlBackend {
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        self.run_migrations().await
    }

    async fn get_document(
        &self,
        user_id: &str,
        fields: Option<&[ProfileField]>,
    ) -> Result<Option<AdditionalProfile>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT field, value FROM profile_documents WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut document = AdditionalProfile::default();
        let mut found = false;
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            found = true;
            let name = get_text(&row, 0);
            let Ok(field) = name.parse::<ProfileField>() else {
                tracing::warn!(user_id, field = %name, "Ignoring unknown stored category");
                continue;
            };
            if fields.is_some_and(|wanted| !wanted.contains(&field)) {
                continue;
            }
            let json: serde_json::Value = serde_json::from_str(&get_text(&row, 1))
                .map_err(|e| DatabaseError::Serialization(format!("{field}: {e}")))?;
            let value = FieldValue::from_json(field, json)
                .map_err(|e| DatabaseError::Serialization(format!("{field}: {e}")))?;
            document.set_field(value);
        }

        Ok(found.then_some(document))
    }

    async fn put_field(&self, user_id: &str, value: &FieldValue) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            UPSERT_FIELD,
            params![
                user_id,
                value.field().as_str(),
                encode(value)?,
                fmt_ts(&Utc::now())
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
        tracing::debug!(user_id, field = %value.field(), "Wrote profile category");
        Ok(())
    }

    async fn upsert_document(
        &self,
        user_id: &str,
        document: &AdditionalProfile,
    ) -> Result<(), DatabaseError> {
        let values = document.field_values();
        let encoded = values
            .iter()
            .map(|v| Ok((v.field().as_str(), encode(v)?)))
            .collect::<Result<Vec<_>, DatabaseError>>()?;
        let now = fmt_ts(&Utc::now());

        let conn = self.connect().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        tx.execute(
            "DELETE FROM profile_documents WHERE user_id = ?1",
            params![user_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
        for (field, value) in encoded {
            tx.execute(UPSERT_FIELD, params![user_id, field, value, now.as_str()])
                .await
                .map_err(|e| DatabaseError::Query(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn delete_document(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let rows_affected = conn
            .execute(
                "DELETE FROM profile_documents WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(rows_affected > 0)
    }
}
