use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlays rows of the `business_rules` table (`{"value": ...}`) on the file config.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        let mut rules = defaults;
        for (key, value) in rows {
            apply_rule(&mut rules, &key, &value);
        }
        Ok(rules)
    }
}

fn apply_rule(rules: &mut BusinessRules, key: &str, value: &Value) {
    let Some(v) = value.get("value") else {
        warn!("Business rule {} has no \"value\" field, ignoring", key);
        return;
    };

    let applied = match key {
        "hold_ttl_seconds" => v.as_u64().map(|n| rules.hold_ttl_seconds = n).is_some(),
        "hold_sweep_interval_seconds" => {
            v.as_u64().map(|n| rules.hold_sweep_interval_seconds = n).is_some()
        }
        "low_availability_percent" => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(|n| rules.low_availability_percent = n)
            .is_some(),
        "booking_reference_prefix" => v
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| rules.booking_reference_prefix = s.to_string())
            .is_some(),
        "flight_list_limit" => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(|n| rules.flight_list_limit = n)
            .is_some(),
        _ => {
            warn!("Unknown business rule {}", key);
            return;
        }
    };

    if applied {
        info!("Business rule {} = {}", key, v);
    } else {
        warn!("Business rule {} has an unusable value {}", key, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rules_overlay_known_keys() {
        let mut rules = BusinessRules::default();
        apply_rule(&mut rules, "hold_ttl_seconds", &json!({"value": 300}));
        apply_rule(&mut rules, "booking_reference_prefix", &json!({"value": "KAU"}));
        apply_rule(&mut rules, "low_availability_percent", &json!({"value": "lots"}));
        apply_rule(&mut rules, "unknown_rule", &json!({"value": 1}));

        assert_eq!(rules.hold_ttl_seconds, 300);
        assert_eq!(rules.booking_reference_prefix, "KAU");
        assert_eq!(rules.low_availability_percent, 25);
    }
}
