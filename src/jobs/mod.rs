use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    infrastructure::state::AppState,
    services::alerts::{AlertKind, AlertService},
};

/// Next instant strictly after `now` whose UTC wall-clock time is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Spawns one daily task per alert job. Returns no handles when alerts are
/// disabled.
pub fn spawn_alert_jobs(state: Arc<AppState>) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let alerts = &state.config.alerts;
    if !alerts.enabled {
        info!("scheduled alerts disabled");
        return Ok(Vec::new());
    }
    let schedule = [
        (AlertKind::LowStock, alerts.low_stock_time()?),
        (AlertKind::DailyReport, alerts.daily_report_time()?),
    ];
    Ok(schedule
        .into_iter()
        .map(|(kind, at)| spawn_daily(Arc::clone(&state), kind, at))
        .collect())
}

fn spawn_daily(state: Arc<AppState>, kind: AlertKind, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        let service = AlertService::new(state);
        loop {
            let now = Utc::now();
            let next = next_run_after(now, at);
            info!(job = kind.as_str(), next_run = %next, "alert job scheduled");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match service.run(kind).await {
                Ok(outcome) if outcome.all_failed() => {
                    warn!(job = kind.as_str(), failed = outcome.failed.len(), "every alert delivery failed")
                }
                Ok(_) => {}
                Err(err) => error!(job = kind.as_str(), error = %err, "alert job failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn runs_later_today_when_time_is_ahead() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now, at(8, 0)),
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn rolls_to_tomorrow_once_time_has_passed() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 18, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now, at(18, 0)),
            Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
        );
    }
}
