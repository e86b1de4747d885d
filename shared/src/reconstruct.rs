//! Historical stock reconstruction
//!
//! Only the current stock is stored. Day-by-day history is derived by walking
//! backward from today: the snapshot recorded for day `d` is end-of-day stock,
//! and subtracting `d`'s net movements yields end-of-day `d - 1`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

use crate::alert::stock_ratio;
use crate::models::{BloodType, Catalog, Component, InboundRecord, StockKey};
use crate::target::FamilyTarget;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("No stock data between {start} and {end}")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },
}

/// A ledger movement reduced to its calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedMovement {
    pub date: NaiveDate,
    pub key: StockKey,
    pub in_qty: i32,
    pub out_qty: i32,
}

impl DatedMovement {
    pub fn delta(&self) -> i32 {
        self.in_qty - self.out_qty
    }
}

/// Net movement per key per day
pub type DailyDeltas = BTreeMap<NaiveDate, BTreeMap<StockKey, i32>>;

/// Sum same-day movements before replay
pub fn daily_deltas(movements: &[DatedMovement]) -> DailyDeltas {
    let mut deltas = DailyDeltas::new();
    for m in movements {
        *deltas.entry(m.date).or_default().entry(m.key).or_insert(0) += m.delta();
    }
    deltas
}

/// Backward subtraction went negative and was clamped to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriftEvent {
    /// Day whose movements were being undone
    pub date: NaiveDate,
    pub key: StockKey,
    pub computed_qty: i32,
}

/// Output of the backward walk
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconstruction {
    /// End-of-day stock per key
    pub days: BTreeMap<NaiveDate, BTreeMap<StockKey, i32>>,
    /// Stock at the end of the day before the earliest recorded day
    pub opening: BTreeMap<StockKey, i32>,
    pub drift: Vec<DriftEvent>,
    /// Keys that have movements but no current stock row; their movements are skipped
    pub orphaned_keys: BTreeSet<StockKey>,
}

/// Walk from `today` back through `start` (inclusive).
///
/// Nothing is recorded when `start` is after `today`.
pub fn reconstruct(
    today: NaiveDate,
    start: NaiveDate,
    current: &HashMap<StockKey, i32>,
    deltas: &DailyDeltas,
) -> Reconstruction {
    let mut iter_stock: BTreeMap<StockKey, i32> =
        current.iter().map(|(k, v)| (*k, *v)).collect();
    let mut result = Reconstruction::default();

    let mut day = today;
    while day >= start {
        result.days.insert(day, iter_stock.clone());

        if let Some(day_deltas) = deltas.get(&day) {
            for (key, delta) in day_deltas {
                let Some(qty) = iter_stock.get_mut(key) else {
                    result.orphaned_keys.insert(*key);
                    continue;
                };

                let computed = *qty - delta;
                if computed < 0 {
                    result.drift.push(DriftEvent {
                        date: day,
                        key: *key,
                        computed_qty: computed,
                    });
                    *qty = 0;
                } else {
                    *qty = computed;
                }
            }
        }

        day = match day.pred_opt() {
            Some(previous) => previous,
            None => break,
        };
    }

    result.opening = iter_stock;
    result
}

/// One chart: ascending dates with a value per blood type per date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries<T> {
    pub dates: Vec<NaiveDate>,
    pub series: BTreeMap<BloodType, Vec<T>>,
}

/// Family stock below its current target on some day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertHistoryEntry {
    pub date: NaiveDate,
    pub blood_type: BloodType,
    pub component: Component,
    pub qty: i32,
    pub target: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_in: i64,
    pub total_out: i64,
    /// Red-cell stock across blood types, averaged over the window's days
    pub avg_family: Decimal,
    /// Lowest daily red-cell stock across blood types
    pub min_family: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayDiagnostics {
    pub drift: Vec<DriftEvent>,
    pub orphaned_keys: Vec<StockKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: ReportSummary,
    pub charts: BTreeMap<Component, ChartSeries<i32>>,
    /// Red-cell stock divided by the resolved daily consumption rate
    pub family_ratio: ChartSeries<Decimal>,
    pub alerts: Vec<AlertHistoryEntry>,
    pub inbound: ChartSeries<i32>,
    pub diagnostics: ReplayDiagnostics,
}

/// Flat row used for CSV export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyFamilyRow {
    pub date: NaiveDate,
    pub component: Component,
    pub blood_type: BloodType,
    pub qty: i32,
}

impl AnalyticsReport {
    pub fn family_rows(&self) -> Vec<DailyFamilyRow> {
        let mut rows = Vec::new();
        for (component, chart) in &self.charts {
            for (i, date) in chart.dates.iter().enumerate() {
                for (blood_type, values) in &chart.series {
                    rows.push(DailyFamilyRow {
                        date: *date,
                        component: *component,
                        blood_type: *blood_type,
                        qty: values.get(i).copied().unwrap_or(0),
                    });
                }
            }
        }
        rows
    }
}

/// Everything the report needs, already loaded
pub struct ReportInput<'a> {
    pub today: NaiveDate,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub catalog: &'a Catalog,
    pub current: &'a HashMap<StockKey, i32>,
    pub movements: &'a [DatedMovement],
    pub inbound: &'a [InboundRecord],
    /// Current red-cell targets; targets are not replayed historically
    pub family_targets: &'a HashMap<BloodType, FamilyTarget>,
}

/// Sum of one component's stock for one blood type on one day
fn family_qty(
    snapshot: &BTreeMap<StockKey, i32>,
    members: &BTreeSet<i32>,
    blood_type: BloodType,
) -> i32 {
    snapshot
        .iter()
        .filter(|(k, _)| k.blood_type == blood_type && members.contains(&k.preparation_id))
        .map(|(_, qty)| *qty)
        .sum()
}

/// Replay the ledger and derive charts, alert history and summary for `[start, end]`
pub fn build_report(input: &ReportInput<'_>) -> Result<AnalyticsReport, ReconstructError> {
    let deltas = daily_deltas(input.movements);
    let replay = reconstruct(input.today, input.start, input.current, &deltas);

    let window: Vec<(&NaiveDate, &BTreeMap<StockKey, i32>)> =
        replay.days.range(input.start..=input.end).collect();

    if window.iter().all(|(_, snapshot)| snapshot.is_empty()) {
        return Err(ReconstructError::EmptyWindow {
            start: input.start,
            end: input.end,
        });
    }

    let dates: Vec<NaiveDate> = window.iter().map(|(d, _)| **d).collect();

    let members_of = |component: Component| -> BTreeSet<i32> {
        input.catalog.family(component).map(|p| p.id).collect()
    };

    let mut charts = BTreeMap::new();
    for component in Component::ALL {
        let members = members_of(component);
        let series = BloodType::ALL
            .into_iter()
            .map(|bt| {
                let values = window
                    .iter()
                    .map(|(_, snapshot)| family_qty(snapshot, &members, bt))
                    .collect();
                (bt, values)
            })
            .collect();
        charts.insert(
            component,
            ChartSeries {
                dates: dates.clone(),
                series,
            },
        );
    }

    let red_cells = &charts[&Component::Rbc];

    let mut ratio_series = BTreeMap::new();
    for bt in BloodType::ALL {
        let Some(target) = input.family_targets.get(&bt) else {
            continue;
        };
        let rate = target.parameters.daily_consumption_rate;
        let values: Option<Vec<Decimal>> = red_cells.series[&bt]
            .iter()
            .map(|qty| stock_ratio(*qty, rate))
            .collect();
        if let Some(values) = values {
            ratio_series.insert(bt, values);
        }
    }

    let mut alerts = Vec::new();
    for (i, date) in dates.iter().enumerate().rev() {
        for bt in BloodType::ALL {
            let Some(target) = input.family_targets.get(&bt) else {
                continue;
            };
            let qty = red_cells.series[&bt][i];
            if qty < target.total {
                alerts.push(AlertHistoryEntry {
                    date: *date,
                    blood_type: bt,
                    component: Component::Rbc,
                    qty,
                    target: target.total,
                });
            }
        }
    }

    let mut inbound_series: BTreeMap<BloodType, Vec<i32>> =
        BloodType::ALL.into_iter().map(|bt| (bt, vec![0; dates.len()])).collect();
    let date_index: HashMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    for record in input.inbound {
        if let Some(i) = date_index.get(&record.receive_date) {
            if let Some(values) = inbound_series.get_mut(&record.blood_type) {
                values[*i] += record.qty;
            }
        }
    }

    let (total_in, total_out) = input
        .movements
        .iter()
        .filter(|m| m.date >= input.start && m.date <= input.end)
        .fold((0i64, 0i64), |(i, o), m| (i + m.in_qty as i64, o + m.out_qty as i64));

    let daily_family_totals: Vec<i32> = (0..dates.len())
        .map(|i| red_cells.series.values().map(|v| v[i]).sum())
        .collect();
    let avg_family = if daily_family_totals.is_empty() {
        Decimal::ZERO
    } else {
        let sum: i64 = daily_family_totals.iter().map(|v| *v as i64).sum();
        (Decimal::from(sum) / Decimal::from(daily_family_totals.len())).round_dp(1)
    };
    let min_family = daily_family_totals.iter().copied().min().unwrap_or(0);

    Ok(AnalyticsReport {
        start_date: input.start,
        end_date: input.end,
        summary: ReportSummary {
            total_in,
            total_out,
            avg_family,
            min_family,
        },
        family_ratio: ChartSeries {
            dates: dates.clone(),
            series: ratio_series,
        },
        charts,
        alerts,
        inbound: ChartSeries {
            dates,
            series: inbound_series,
        },
        diagnostics: ReplayDiagnostics {
            drift: replay.drift,
            orphaned_keys: replay.orphaned_keys.into_iter().collect(),
        },
    })
}
