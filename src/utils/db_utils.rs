use actix_web::error::ErrorBadRequest;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlPool;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only columns in `allowed` may appear in the payload; anything else is a
/// 400, which also keeps column names out of attacker control.
pub fn build_update_sql(
    table: &str,
    allowed: &[&str],
    payload: &Value,
    id_column: &str,
    id_value: SqlValue,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ErrorBadRequest(format!("Unknown field: {}", unknown)));
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values -> SqlValue
    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    values.push(SqlValue::DateTime(dt));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            // arrays/objects target JSON columns; MySQL casts the text form
            other => values.push(SqlValue::String(other.to_string())),
        }
    }

    // WHERE <id_column> = ?
    values.push(id_value);

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: &[&str] = &["name", "trial_days", "time_zone"];

    #[test]
    fn builds_update_for_allowed_fields() {
        let payload = json!({"name": "ADPA", "trial_days": 30});
        let update = build_update_sql(
            "business_configs",
            ALLOWED,
            &payload,
            "id",
            SqlValue::String("adpa".to_string()),
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE business_configs SET name = ?, trial_days = ? WHERE id = ?"
        );
        assert_eq!(update.values.len(), 3);
    }

    #[test]
    fn rejects_unknown_field() {
        let payload = json!({"name": "ADPA", "is_admin": true});
        assert!(
            build_update_sql(
                "business_configs",
                ALLOWED,
                &payload,
                "id",
                SqlValue::String("adpa".to_string()),
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_empty_payload() {
        let payload = json!({});
        assert!(
            build_update_sql(
                "business_configs",
                ALLOWED,
                &payload,
                "id",
                SqlValue::String("adpa".to_string()),
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_non_object_payload() {
        let payload = json!([1, 2, 3]);
        assert!(
            build_update_sql(
                "business_configs",
                ALLOWED,
                &payload,
                "id",
                SqlValue::String("adpa".to_string()),
            )
            .is_err()
        );
    }

    #[test]
    fn arrays_serialize_for_json_columns() {
        let payload = json!({"working_days": [1, 2, 3, 4, 5]});
        let update = build_update_sql(
            "business_configs",
            &["working_days"],
            &payload,
            "id",
            SqlValue::String("adpa".to_string()),
        )
        .unwrap();

        match &update.values[0] {
            SqlValue::String(s) => assert_eq!(s, "[1,2,3,4,5]"),
            other => panic!("expected serialized JSON string, got {:?}", other),
        }
    }

    #[test]
    fn date_strings_become_dates() {
        let payload = json!({"name": "2024-01-15"});
        let update = build_update_sql(
            "business_configs",
            ALLOWED,
            &payload,
            "id",
            SqlValue::String("adpa".to_string()),
        )
        .unwrap();

        assert!(matches!(update.values[0], SqlValue::Date(_)));
    }
}
