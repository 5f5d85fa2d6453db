//! Date combination rules and point-in-time predicates.
//!
//! # Invariants
//! - Due dates combine by earliest non-null value.
//! - Defer dates combine by latest non-null value.
//! - An instant equal to `now` is available, not deferred, and not overdue.

/// Default look-ahead window for due-soon views.
pub const DEFAULT_DUE_SOON_HOURS: i64 = 48;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Earliest non-null of the three inputs.
pub fn resolve_effective_due(
    item_due: Option<i64>,
    parent_effective_due: Option<i64>,
    project_due: Option<i64>,
) -> Option<i64> {
    [item_due, parent_effective_due, project_due]
        .into_iter()
        .flatten()
        .min()
}

/// Latest non-null of the three inputs.
pub fn resolve_effective_defer(
    item_defer: Option<i64>,
    parent_effective_defer: Option<i64>,
    project_defer: Option<i64>,
) -> Option<i64> {
    [item_defer, parent_effective_defer, project_defer]
        .into_iter()
        .flatten()
        .max()
}

pub fn is_available(effective_defer: Option<i64>, now: i64) -> bool {
    effective_defer.map_or(true, |defer| defer <= now)
}

pub fn is_deferred(effective_defer: Option<i64>, now: i64) -> bool {
    effective_defer.is_some_and(|defer| defer > now)
}

pub fn is_overdue(effective_due: Option<i64>, now: i64) -> bool {
    effective_due.is_some_and(|due| due < now)
}

/// True when due strictly after `now` and no later than `now + threshold_hours`.
pub fn is_due_soon(effective_due: Option<i64>, now: i64, threshold_hours: i64) -> bool {
    let horizon = now.saturating_add(threshold_hours.saturating_mul(MILLIS_PER_HOUR));
    effective_due.is_some_and(|due| due > now && due <= horizon)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = MILLIS_PER_HOUR;
    const DAY: i64 = 24 * HOUR;
    const JAN_5: i64 = 4 * DAY;
    const JAN_8: i64 = 7 * DAY;
    const JAN_10: i64 = 9 * DAY;
    const JAN_15: i64 = 14 * DAY;
    const JAN_20: i64 = 19 * DAY;
    const JAN_30: i64 = 29 * DAY;

    #[test]
    fn due_resolves_to_earliest_non_null() {
        assert_eq!(resolve_effective_due(None, None, None), None);
        assert_eq!(resolve_effective_due(Some(JAN_15), None, None), Some(JAN_15));
        assert_eq!(resolve_effective_due(None, Some(JAN_15), None), Some(JAN_15));
        assert_eq!(resolve_effective_due(None, None, Some(JAN_15)), Some(JAN_15));
        assert_eq!(resolve_effective_due(Some(JAN_10), None, Some(JAN_15)), Some(JAN_10));
        assert_eq!(resolve_effective_due(Some(JAN_20), None, Some(JAN_15)), Some(JAN_15));
        assert_eq!(
            resolve_effective_due(Some(JAN_20), Some(JAN_15), Some(JAN_30)),
            Some(JAN_15)
        );
    }

    #[test]
    fn defer_resolves_to_latest_non_null() {
        assert_eq!(resolve_effective_defer(None, None, None), None);
        assert_eq!(resolve_effective_defer(None, None, Some(JAN_15)), Some(JAN_15));
        assert_eq!(resolve_effective_defer(Some(JAN_20), None, Some(JAN_15)), Some(JAN_20));
        assert_eq!(resolve_effective_defer(Some(JAN_10), None, Some(JAN_15)), Some(JAN_15));
        assert_eq!(
            resolve_effective_defer(Some(JAN_10), Some(JAN_20), Some(JAN_15)),
            Some(JAN_20)
        );
    }

    #[test]
    fn nested_defer_takes_blocking_ancestor() {
        let phase = resolve_effective_defer(Some(JAN_10), None, Some(JAN_5));
        assert_eq!(phase, Some(JAN_10));
        let subtask = resolve_effective_defer(Some(JAN_8), phase, Some(JAN_5));
        assert_eq!(subtask, Some(JAN_10));
    }

    #[test]
    fn adding_dates_is_monotonic() {
        let inputs = [None, Some(JAN_10), Some(JAN_20)];
        for a in inputs {
            for b in inputs {
                for c in inputs {
                    let due = resolve_effective_due(a, b, c);
                    let with_earlier = resolve_effective_due(a, b, Some(JAN_5));
                    assert!(with_earlier <= due.or(Some(i64::MAX)));

                    let defer = resolve_effective_defer(a, b, c);
                    let with_later = resolve_effective_defer(Some(JAN_30), b, c);
                    assert!(with_later >= defer);
                }
            }
        }
    }

    #[test]
    fn boundaries_treat_now_as_available_and_not_overdue() {
        let now = JAN_15 + 12 * HOUR;
        assert!(is_available(Some(now), now));
        assert!(!is_deferred(Some(now), now));
        assert!(!is_overdue(Some(now), now));

        assert!(is_available(None, now));
        assert!(!is_deferred(None, now));
        assert!(is_available(Some(JAN_10), now));
        assert!(is_deferred(Some(JAN_20), now));
        assert!(is_overdue(Some(JAN_10), now));
        assert!(!is_overdue(Some(JAN_20), now));
        assert!(!is_overdue(None, now));
    }

    #[test]
    fn due_soon_upper_bound_is_inclusive() {
        let now = JAN_15 + 12 * HOUR;
        assert!(is_due_soon(Some(now + 48 * HOUR), now, DEFAULT_DUE_SOON_HOURS));
        assert!(!is_due_soon(Some(now + 48 * HOUR + 1), now, DEFAULT_DUE_SOON_HOURS));
        assert!(!is_due_soon(Some(now), now, DEFAULT_DUE_SOON_HOURS));
        assert!(!is_due_soon(Some(JAN_10), now, DEFAULT_DUE_SOON_HOURS));
        assert!(!is_due_soon(None, now, DEFAULT_DUE_SOON_HOURS));
    }

    #[test]
    fn due_soon_respects_custom_threshold() {
        let now = JAN_15 + 12 * HOUR;
        let in_36h = now + 36 * HOUR;
        let in_60h = now + 60 * HOUR;
        assert!(is_due_soon(Some(in_36h), now, 48));
        assert!(!is_due_soon(Some(in_36h), now, 24));
        assert!(is_due_soon(Some(in_60h), now, 72));
    }
}
