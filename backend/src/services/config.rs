//! Consumption-rate / safety-factor configuration service
//!
//! Loads configuration snapshots for the pure resolver and applies audited
//! parameter changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use shared::{
    diff_parameters, resolve, resolve_split_ratio, validate_change_reason,
    validate_daily_consumption_rate, validate_ratio_percent, validate_safety_factor,
    validate_scope, BloodType, Catalog, ConfigChangeRecord, ConfigOverride, ConfigSnapshot,
    FamilyTarget, Resolution, DEFAULT_SPLIT_RATIO, SPLIT_RATIO_KEY,
};

use super::decode_blood_type;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ConfigService {
    db: PgPool,
    parameter_set: String,
}

#[derive(Debug, FromRow)]
struct OverrideRow {
    id: Uuid,
    blood_type: Option<String>,
    preparation_id: Option<i32>,
    parameter_set: String,
    daily_consumption_rate: Decimal,
    safety_factor: Decimal,
    ratio_percent: Option<Decimal>,
    updated_at: DateTime<Utc>,
}

impl OverrideRow {
    fn into_override(self) -> AppResult<ConfigOverride> {
        Ok(ConfigOverride {
            id: self.id,
            blood_type: self.blood_type.as_deref().map(decode_blood_type).transpose()?,
            preparation_id: self.preparation_id,
            parameter_set: self.parameter_set,
            daily_consumption_rate: self.daily_consumption_rate,
            safety_factor: self.safety_factor,
            ratio_percent: self.ratio_percent,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChangeRow {
    id: Uuid,
    blood_type: Option<String>,
    preparation_id: Option<i32>,
    parameter_name: String,
    old_value: Option<Decimal>,
    new_value: Decimal,
    reason: String,
    actor: Option<Uuid>,
    changed_at: DateTime<Utc>,
}

impl ChangeRow {
    fn into_record(self) -> AppResult<ConfigChangeRecord> {
        Ok(ConfigChangeRecord {
            id: self.id,
            blood_type: self.blood_type.as_deref().map(decode_blood_type).transpose()?,
            preparation_id: self.preparation_id,
            parameter_name: self.parameter_name,
            old_value: self.old_value,
            new_value: self.new_value,
            reason: self.reason,
            actor: self.actor,
            changed_at: self.changed_at,
        })
    }
}

const OVERRIDE_COLUMNS: &str = "id, blood_type, preparation_id, parameter_set, \
     daily_consumption_rate, safety_factor, ratio_percent, updated_at";

/// Input for a parameter change. Omitting both scope fields edits the common row.
#[derive(Debug, Deserialize)]
pub struct UpdateParametersInput {
    pub blood_type: Option<BloodType>,
    pub preparation_id: Option<i32>,
    pub daily_consumption_rate: Decimal,
    pub safety_factor: Decimal,
    pub ratio_percent: Option<Decimal>,
    pub change_reason: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateParametersResult {
    #[serde(rename = "override")]
    pub config_override: ConfigOverride,
    /// Empty when every value was already current
    pub changes: Vec<ConfigChangeRecord>,
}

/// Resolved view for one (blood type, preparation)
#[derive(Debug, Serialize)]
pub struct ResolvedParameters {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    #[serde(flatten)]
    pub resolution: Resolution,
    pub split_ratio: Decimal,
    /// Present for red-cell preparations
    pub family_target: Option<FamilyTarget>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSplitRatioInput {
    pub ratio_percent: Decimal,
    pub change_reason: String,
}

#[derive(Debug, Serialize)]
pub struct SplitRatioSetting {
    pub ratio_percent: Decimal,
    /// False when the built-in default applies
    pub configured: bool,
}

impl ConfigService {
    pub fn new(db: PgPool, parameter_set: impl Into<String>) -> Self {
        Self {
            db,
            parameter_set: parameter_set.into(),
        }
    }

    // ========================================================================
    // Snapshot & Resolution
    // ========================================================================

    pub async fn list_overrides(&self) -> AppResult<Vec<ConfigOverride>> {
        let rows = sqlx::query_as::<_, OverrideRow>(&format!(
            "SELECT {} FROM config_overrides WHERE parameter_set = $1 \
             ORDER BY blood_type NULLS FIRST, preparation_id NULLS FIRST",
            OVERRIDE_COLUMNS
        ))
        .bind(&self.parameter_set)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(OverrideRow::into_override).collect()
    }

    /// Every stored configuration row, for the pure resolver
    pub async fn load_snapshot(&self) -> AppResult<ConfigSnapshot> {
        let overrides = self.list_overrides().await?;

        let settings: HashMap<String, String> =
            sqlx::query_as::<_, (String, String)>("SELECT key, value FROM master_config")
                .fetch_all(&self.db)
                .await?
                .into_iter()
                .collect();

        Ok(ConfigSnapshot::new(overrides, settings))
    }

    /// Current red-cell targets per blood type, resolved against the first
    /// sub-product. Empty when the catalog has no red-cell pair.
    pub fn family_targets(
        snapshot: &ConfigSnapshot,
        catalog: &Catalog,
    ) -> HashMap<BloodType, FamilyTarget> {
        let Some(pair) = catalog.dynamic_pair() else {
            return HashMap::new();
        };

        BloodType::ALL
            .into_iter()
            .map(|bt| {
                let resolution = resolve(snapshot, bt, pair.first.id);
                let ratio = resolve_split_ratio(snapshot, bt, pair.first.id);
                (bt, FamilyTarget::compute(bt, resolution.parameters, ratio))
            })
            .collect()
    }

    pub async fn resolve_for(
        &self,
        catalog: &Catalog,
        blood_type: BloodType,
        preparation_id: i32,
    ) -> AppResult<ResolvedParameters> {
        let product = catalog
            .get(preparation_id)
            .ok_or_else(|| AppError::NotFound(format!("Preparation {}", preparation_id)))?;

        let snapshot = self.load_snapshot().await?;
        let resolution = resolve(&snapshot, blood_type, preparation_id);

        let (split_ratio, family_target) = match catalog.dynamic_pair() {
            Some(pair) if product.is_dynamic() => {
                let ratio = resolve_split_ratio(&snapshot, blood_type, pair.first.id);
                let family = Self::family_targets(&snapshot, catalog).remove(&blood_type);
                (ratio, family)
            }
            _ => (resolve_split_ratio(&snapshot, blood_type, preparation_id), None),
        };

        Ok(ResolvedParameters {
            blood_type,
            preparation_id,
            resolution,
            split_ratio,
            family_target,
        })
    }

    // ========================================================================
    // Parameter Changes
    // ========================================================================

    /// Upsert an override row and record one change per modified parameter,
    /// all in one transaction
    pub async fn update_parameters(
        &self,
        catalog: &Catalog,
        input: UpdateParametersInput,
        actor: Option<Uuid>,
    ) -> AppResult<UpdateParametersResult> {
        validate_scope(input.blood_type, input.preparation_id)?;
        validate_daily_consumption_rate(input.daily_consumption_rate)?;
        validate_safety_factor(input.safety_factor)?;
        if let Some(ratio) = input.ratio_percent {
            validate_ratio_percent(ratio)?;
        }
        let reason = validate_change_reason(&input.change_reason)?;

        if let Some(preparation_id) = input.preparation_id {
            if catalog.get(preparation_id).is_none() {
                return Err(AppError::NotFound(format!("Preparation {}", preparation_id)));
            }
        }

        let blood_type = input.blood_type.map(|bt| bt.as_str());

        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, OverrideRow>(&format!(
            "SELECT {} FROM config_overrides \
             WHERE blood_type IS NOT DISTINCT FROM $1 \
               AND preparation_id IS NOT DISTINCT FROM $2 \
               AND parameter_set = $3 \
             FOR UPDATE",
            OVERRIDE_COLUMNS
        ))
        .bind(blood_type)
        .bind(input.preparation_id)
        .bind(&self.parameter_set)
        .fetch_optional(&mut *tx)
        .await?
        .map(OverrideRow::into_override)
        .transpose()?;

        let changes = diff_parameters(
            existing.as_ref(),
            input.daily_consumption_rate,
            input.safety_factor,
            input.ratio_percent,
        );

        let config_override = match (existing, changes.is_empty()) {
            (Some(current), true) => current,
            (Some(current), false) => sqlx::query_as::<_, OverrideRow>(&format!(
                "UPDATE config_overrides \
                 SET daily_consumption_rate = $2, safety_factor = $3, \
                     ratio_percent = COALESCE($4, ratio_percent), updated_at = NOW() \
                 WHERE id = $1 \
                 RETURNING {}",
                OVERRIDE_COLUMNS
            ))
            .bind(current.id)
            .bind(input.daily_consumption_rate)
            .bind(input.safety_factor)
            .bind(input.ratio_percent)
            .fetch_one(&mut *tx)
            .await?
            .into_override()?,
            (None, _) => sqlx::query_as::<_, OverrideRow>(&format!(
                "INSERT INTO config_overrides \
                 (blood_type, preparation_id, parameter_set, daily_consumption_rate, safety_factor, ratio_percent) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING {}",
                OVERRIDE_COLUMNS
            ))
            .bind(blood_type)
            .bind(input.preparation_id)
            .bind(&self.parameter_set)
            .bind(input.daily_consumption_rate)
            .bind(input.safety_factor)
            .bind(input.ratio_percent)
            .fetch_one(&mut *tx)
            .await?
            .into_override()?,
        };

        let mut records = Vec::with_capacity(changes.len());
        for change in &changes {
            let row = sqlx::query_as::<_, ChangeRow>(
                r#"
                INSERT INTO config_change_records
                    (blood_type, preparation_id, parameter_set, parameter_name, old_value, new_value, reason, actor)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id, blood_type, preparation_id, parameter_name, old_value, new_value,
                          reason, actor, changed_at
                "#,
            )
            .bind(blood_type)
            .bind(input.preparation_id)
            .bind(&self.parameter_set)
            .bind(change.parameter_name)
            .bind(change.old_value)
            .bind(change.new_value)
            .bind(&reason)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;
            records.push(row.into_record()?);
        }

        tx.commit().await?;

        tracing::info!(
            blood_type = blood_type.unwrap_or("ALL"),
            preparation_id = ?input.preparation_id,
            changed = records.len(),
            "Configuration parameters updated"
        );

        Ok(UpdateParametersResult {
            config_override,
            changes: records,
        })
    }

    /// Change history, newest first
    pub async fn history(&self, limit: i64) -> AppResult<Vec<ConfigChangeRecord>> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT id, blood_type, preparation_id, parameter_name, old_value, new_value,
                   reason, actor, changed_at
            FROM config_change_records
            WHERE parameter_set = $1
            ORDER BY changed_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(&self.parameter_set)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ChangeRow::into_record).collect()
    }

    // ========================================================================
    // Global Split Ratio
    // ========================================================================

    pub async fn get_split_ratio(&self) -> AppResult<SplitRatioSetting> {
        let raw = sqlx::query_scalar::<_, String>("SELECT value FROM master_config WHERE key = $1")
            .bind(SPLIT_RATIO_KEY)
            .fetch_optional(&self.db)
            .await?;

        let stored = raw
            .and_then(|v| v.trim().parse::<Decimal>().ok())
            .filter(|p| validate_ratio_percent(*p).is_ok());

        Ok(match stored {
            Some(ratio_percent) => SplitRatioSetting {
                ratio_percent,
                configured: true,
            },
            None => SplitRatioSetting {
                ratio_percent: DEFAULT_SPLIT_RATIO * Decimal::ONE_HUNDRED,
                configured: false,
            },
        })
    }

    pub async fn set_split_ratio(
        &self,
        input: UpdateSplitRatioInput,
        actor: Option<Uuid>,
    ) -> AppResult<SplitRatioSetting> {
        validate_ratio_percent(input.ratio_percent)?;
        let reason = validate_change_reason(&input.change_reason)?;

        let previous = self.get_split_ratio().await?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO master_config (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(SPLIT_RATIO_KEY)
        .bind(input.ratio_percent.normalize().to_string())
        .execute(&mut *tx)
        .await?;

        if !previous.configured || previous.ratio_percent != input.ratio_percent {
            sqlx::query(
                r#"
                INSERT INTO config_change_records
                    (parameter_set, parameter_name, old_value, new_value, reason, actor)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&self.parameter_set)
            .bind(SPLIT_RATIO_KEY)
            .bind(previous.configured.then_some(previous.ratio_percent))
            .bind(input.ratio_percent)
            .bind(&reason)
            .bind(actor)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(ratio_percent = %input.ratio_percent, "Red-cell split ratio updated");

        Ok(SplitRatioSetting {
            ratio_percent: input.ratio_percent,
            configured: true,
        })
    }
}
