use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use farm_planning::lifecycle::refresh_derived;
use farm_planning::{
    ActivityService, ActivityType, AlertContext, Clock, EntityRef, FixedClock, InMemoryActivityStore,
    NewActivity, PlannedActivity, PlanningConfig,
};
use proptest::prelude::*;
use uuid::Uuid;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap()
}

fn activity_at(start_offset_hours: i64, window_hours: i64, progress: u8) -> PlannedActivity {
    let start = base_time() + Duration::hours(start_offset_hours);
    let mut req = NewActivity::new(
        "Irrigate",
        ActivityType::Irrigation,
        start,
        start + Duration::hours(window_hours),
    );
    req.estimated_duration_hours = 8.0;
    let mut a = PlannedActivity::new(&req, base_time()).unwrap();
    a.progress_percentage = progress;
    a
}

fn service_at(clock: &Arc<FixedClock>) -> ActivityService {
    ActivityService::new(Arc::new(InMemoryActivityStore::new())).with_clock(clock.clone())
}

fn window(start_offset_hours: i64, window_hours: i64) -> NewActivity {
    let start = base_time() + Duration::hours(start_offset_hours);
    NewActivity::new(
        "Spread compost",
        ActivityType::Fertilization,
        start,
        start + Duration::hours(window_hours),
    )
}

#[derive(Debug, Clone)]
enum Change {
    Advance(i64),
    Progress(u8),
    Weather(bool),
    Crew(usize),
    Roster(Option<usize>),
    Cancel,
}

fn change() -> impl Strategy<Value = Change> {
    prop_oneof![
        4 => (1i64..96).prop_map(Change::Advance),
        4 => (0u8..40).prop_map(Change::Progress),
        2 => any::<bool>().prop_map(Change::Weather),
        2 => (0usize..5).prop_map(Change::Crew),
        2 => proptest::option::of(0usize..4).prop_map(Change::Roster),
        1 => Just(Change::Cancel),
    ]
}

proptest! {
    #[test]
    fn state_depends_only_on_current_fields(
        start_offset in -300i64..300,
        window_hours in 1i64..400,
        steps in proptest::collection::vec(0i32..=100, 0..8),
        gaps in proptest::collection::vec(0i64..72, 8),
        settle_hours in 0i64..200,
        cancel in any::<bool>(),
    ) {
        let mut steps = steps;
        steps.sort_unstable();
        let target = steps.last().copied().unwrap_or(0);

        // One farm records progress step by step with reads in between.
        let stepwise_clock = Arc::new(FixedClock::new(base_time()));
        let stepwise = service_at(&stepwise_clock);
        let a = stepwise.create_activity(window(start_offset, window_hours)).unwrap();
        for (step, gap) in steps.iter().zip(&gaps) {
            stepwise_clock.advance(Duration::hours(*gap));
            stepwise.get_activity(a.id).unwrap();
            stepwise.set_progress(a.id, *step).unwrap();
        }

        // The other jumps straight to the same progress at the end.
        let direct_clock = Arc::new(FixedClock::new(base_time()));
        let direct = service_at(&direct_clock);
        let b = direct.create_activity(window(start_offset, window_hours)).unwrap();

        let end = stepwise_clock.now() + Duration::hours(settle_hours);
        stepwise_clock.set(end);
        direct_clock.set(end);
        direct.set_progress(b.id, target).unwrap();

        if cancel {
            prop_assert_eq!(
                stepwise.cancel_activity(a.id).is_ok(),
                direct.cancel_activity(b.id).is_ok()
            );
        }

        let a = stepwise.get_activity(a.id).unwrap();
        let b = direct.get_activity(b.id).unwrap();
        prop_assert_eq!(a.progress_percentage, b.progress_percentage);
        prop_assert_eq!(a.planned_end, b.planned_end);
        prop_assert_eq!(a.cancelled, b.cancelled);
        prop_assert_eq!(a.state, b.state);
    }

    #[test]
    fn stored_progress_never_decreases(steps in proptest::collection::vec(-20i32..130, 1..12)) {
        let clock = Arc::new(FixedClock::new(base_time()));
        let service = service_at(&clock);
        let a = service
            .create_activity(NewActivity::new(
                "Prune",
                ActivityType::Pruning,
                base_time(),
                base_time() + Duration::days(3),
            ))
            .unwrap();

        let mut last = 0u8;
        for step in steps {
            clock.advance(Duration::hours(2));
            let result = service.set_progress(a.id, step);
            let stored = service.get_activity(a.id).unwrap().progress_percentage;
            prop_assert!(stored >= last);
            if step.clamp(0, 100) < i32::from(last) {
                prop_assert!(result.is_err());
            }
            last = stored;
        }
    }

    #[test]
    fn alerts_stay_unique_and_settled_over_any_sequence(
        start_offset in -200i64..200,
        window_hours in 1i64..300,
        changes in proptest::collection::vec(change(), 1..24),
    ) {
        let config = PlanningConfig::default();
        let mut now = base_time();
        let mut minimum = None;
        let mut a = activity_at(start_offset, window_hours, 0);

        for change in changes {
            match change {
                Change::Advance(hours) => now += Duration::hours(hours),
                Change::Progress(points) if !a.cancelled => {
                    a.progress_percentage = a.progress_percentage.saturating_add(points).min(100);
                }
                Change::Progress(_) => {}
                Change::Weather(flag) => a.adverse_weather = flag,
                Change::Crew(size) => {
                    a.assigned_workers = (0..size).map(|_| EntityRef::unnamed(Uuid::new_v4())).collect();
                }
                Change::Roster(headcount) => minimum = headcount,
                Change::Cancel if a.progress_percentage < 100 => a.cancelled = true,
                Change::Cancel => {}
            }

            let context = AlertContext {
                minimum_headcount: if a.state.is_terminal() { None } else { minimum },
            };
            refresh_derived(&mut a, &context, now, &config);

            // At most one open alert per type.
            let mut open: Vec<_> = a.active_alerts().map(|x| x.alert_type).collect();
            let before = open.len();
            open.sort();
            open.dedup();
            prop_assert_eq!(open.len(), before);

            // Re-deriving at the same instant changes nothing.
            let settled = a.clone();
            let touched = refresh_derived(&mut a, &context, now, &config);
            prop_assert!(touched.is_empty());
            prop_assert_eq!(&a, &settled);
        }
    }
}
