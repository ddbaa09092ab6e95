//! Schedule preview command handler

use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::jobs::upcoming_runs;

pub struct ScheduleCommandHandler {
    config: Settings,
}

impl ScheduleCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn preview(
        &self,
        cron: &str,
        count: usize,
        from: Option<Timestamp>,
        timezone: Option<&str>,
    ) -> AppResult<()> {
        let zone_name = timezone.unwrap_or(&self.config.scheduler.timezone);
        let zone = TimeZone::get(zone_name)
            .map_err(|e| AppError::validation("timezone", e.to_string()))?;
        let from = from.unwrap_or_else(Timestamp::now).to_zoned(zone);

        for line in preview_lines(cron, &from, count)? {
            println!("{line}");
        }
        Ok(())
    }
}

pub(crate) fn preview_lines(cron: &str, from: &Zoned, count: usize) -> AppResult<Vec<String>> {
    let runs = upcoming_runs(cron, from, count)
        .map_err(|e| AppError::validation("cron", e.to_string()))?;

    let mut lines = vec![format!(
        "Next {} run(s) of '{}' in {}:",
        runs.len(),
        cron,
        from.time_zone().iana_name().unwrap_or("custom zone")
    )];
    lines.extend(runs.iter().map(|at| {
        format!(
            "  {}  ({})",
            at.strftime("%a %Y-%m-%d %H:%M %Z"),
            at.timestamp()
        )
    }));
    Ok(lines)
}
