use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::calendar::ActiveDay;
use super::records::{ScheduleType, ServiceId};
use super::schedule::StopRow;

/// What happens to an overlay whose service is also cancelled that day.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The cancellation removes the base schedule and the overlay still runs.
    #[default]
    OverlayWins,
    /// The cancellation removes the base schedule and the overlay.
    CancellationWins,
}

/// Stop rows for one date before and after exceptions are applied.
#[derive(Debug)]
pub struct ResolvedDay<'a> {
    pub date: NaiveDate,
    /// Permanent schedules only, as planned in the long term timetable.
    pub timetabled: Vec<&'a StopRow>,
    /// What actually runs once cancellations and overlays are applied.
    pub scheduled: Vec<&'a StopRow>,
}

fn is_type(row: &StopRow, schedule_types: &[ScheduleType]) -> bool {
    schedule_types.contains(&row.header().schedule_type)
}

pub fn resolve<'a>(active: &ActiveDay<'a>, policy: ConflictPolicy) -> ResolvedDay<'a> {
    let cancelled: HashSet<&ServiceId> = active
        .cancellations
        .iter()
        .map(|row| &row.header.service_id)
        .collect();
    let overlaid: HashSet<&ServiceId> = active
        .stops
        .iter()
        .filter(|row| is_type(row, &[ScheduleType::Overlay]))
        .map(|row| &row.header().service_id)
        .collect();

    let conflicts = cancelled.intersection(&overlaid).count();
    if conflicts > 0 {
        debug!(
            "{}: {conflicts} services both cancelled and overlaid, applying {policy:?}",
            active.date
        );
    }

    let timetabled: Vec<&StopRow> = active
        .stops
        .iter()
        .filter(|row| is_type(row, &[ScheduleType::Permanent]))
        .copied()
        .collect();

    let base = active
        .stops
        .iter()
        .filter(|row| is_type(row, &[ScheduleType::Permanent, ScheduleType::New]))
        .filter(|row| {
            let service_id = &row.header().service_id;
            !cancelled.contains(service_id) && !overlaid.contains(service_id)
        });
    let overlays = active
        .stops
        .iter()
        .filter(|row| is_type(row, &[ScheduleType::Overlay]))
        .filter(|row| match policy {
            ConflictPolicy::OverlayWins => true,
            ConflictPolicy::CancellationWins => !cancelled.contains(&row.header().service_id),
        });
    let scheduled: Vec<&StopRow> = base.chain(overlays).copied().collect();

    ResolvedDay {
        date: active.date,
        timetabled,
        scheduled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Tiploc;
    use crate::schedule::{ScheduleTables, build_tables};
    use crate::test_feed::{Feed, bs, li_pass, li_station, lo, lt};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn tables(lines: Vec<String>) -> ScheduleTables {
        build_tables(&Feed(lines).lines()).unwrap()
    }

    fn count_at(rows: &[&StopRow], tiploc: &str) -> usize {
        rows.iter()
            .filter(|row| row.stop.tiploc == Tiploc(tiploc.to_string()))
            .count()
    }

    fn ids(rows: &[&StopRow]) -> Vec<String> {
        let mut ids: Vec<String> = rows.iter().map(|row| row.header().service_id.0.clone()).collect();
        ids.dedup();
        ids
    }

    #[test]
    fn test_no_exceptions_keeps_timetable() {
        let tables = tables(vec![
            bs("P00001", "240101", "241231", "1111100", 'P'),
            lo("KNGX", "0800"),
            lt("YORK", "1000"),
            bs("P00002", "240101", "241231", "1111100", 'P'),
            lo("LEEDS", "0900"),
            lt("YORK", "1100"),
        ]);
        let resolved = resolve(&ActiveDay::on(&tables, monday()), ConflictPolicy::default());
        assert_eq!(resolved.timetabled, resolved.scheduled);
        assert_eq!(count_at(&resolved.scheduled, "YORK"), 2);
    }

    #[test]
    fn test_cancellation_removes_from_scheduled_only() {
        let tables = tables(vec![
            bs("P00001", "240101", "241231", "1111100", 'P'),
            lo("KNGX", "0800"),
            lt("YORK", "1000"),
            bs("P00001", "240101", "240101", "1000000", 'C'),
            bs("P00002", "240101", "241231", "1111100", 'P'),
            lo("LEEDS", "0900"),
            lt("YORK", "1100"),
        ]);
        let resolved = resolve(&ActiveDay::on(&tables, monday()), ConflictPolicy::default());
        assert_eq!(count_at(&resolved.timetabled, "YORK"), 2);
        assert_eq!(count_at(&resolved.scheduled, "YORK"), 1);
        assert_eq!(ids(&resolved.scheduled), vec!["P00002"]);

        // The cancellation only covers the Monday
        let tuesday = monday().succ_opt().unwrap();
        let resolved = resolve(&ActiveDay::on(&tables, tuesday), ConflictPolicy::default());
        assert_eq!(count_at(&resolved.scheduled, "YORK"), 2);
    }

    #[test]
    fn test_overlay_replaces_base() {
        let tables = tables(vec![
            bs("P00001", "240101", "241231", "1111100", 'P'),
            lo("KNGX", "0800"),
            li_station("STEVNGE", "0825"),
            li_station("PBRO", "0850"),
            li_station("DONC", "0930"),
            lt("YORK", "1000"),
            bs("P00001", "240101", "240107", "1111111", 'O'),
            lo("KNGX", "0810"),
            li_pass("STEVNGE", "0830"),
            li_station("PBRO", "0900"),
            lt("DONC", "0945"),
        ]);
        let resolved = resolve(&ActiveDay::on(&tables, monday()), ConflictPolicy::default());
        assert_eq!(resolved.timetabled.len(), 5);
        assert_eq!(resolved.scheduled.len(), 4);
        assert!(
            resolved
                .scheduled
                .iter()
                .all(|row| row.header().schedule_type == ScheduleType::Overlay)
        );
        assert_eq!(count_at(&resolved.scheduled, "YORK"), 0);
    }

    #[test]
    fn test_new_schedules_are_scheduled_not_timetabled() {
        let tables = tables(vec![
            bs("N00001", "240101", "240107", "1111111", 'N'),
            lo("KNGX", "0800"),
            lt("YORK", "1000"),
        ]);
        let resolved = resolve(&ActiveDay::on(&tables, monday()), ConflictPolicy::default());
        assert!(resolved.timetabled.is_empty());
        assert_eq!(resolved.scheduled.len(), 2);
    }

    #[test]
    fn test_conflict_policy() {
        let tables = tables(vec![
            bs("P00001", "240101", "241231", "1111100", 'P'),
            lo("KNGX", "0800"),
            lt("YORK", "1000"),
            bs("P00001", "240101", "240101", "1000000", 'O'),
            lo("KNGX", "0830"),
            lt("YORK", "1030"),
            bs("P00001", "240101", "240101", "1000000", 'C'),
        ]);
        let active = ActiveDay::on(&tables, monday());

        let overlay_wins = resolve(&active, ConflictPolicy::OverlayWins);
        assert_eq!(overlay_wins.scheduled.len(), 2);
        assert!(
            overlay_wins
                .scheduled
                .iter()
                .all(|row| row.header().schedule_type == ScheduleType::Overlay)
        );

        let cancellation_wins = resolve(&active, ConflictPolicy::CancellationWins);
        assert!(cancellation_wins.scheduled.is_empty());
        assert_eq!(cancellation_wins.timetabled.len(), 2);
    }
}
