//! Chronological master schedule built from per-condition event lists.

use serde::{Deserialize, Serialize};

use crate::types::Event;

/// One event of the master schedule, tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Timing triple.
    pub event: Event,
    /// Index of the condition list the event came from.
    pub condition: usize,
    /// Position of the event inside its condition list.
    pub index: usize,
}

impl ScheduledEvent {
    /// Whether `other` is the same source event.
    pub fn same_source(&self, other: &ScheduledEvent) -> bool {
        self.condition == other.condition && self.index == other.index
    }
}

/// All events of a run in onset order.
///
/// Every input event appears exactly once. Events sharing an onset keep
/// their input order (condition, then position).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterSchedule {
    events: Vec<ScheduledEvent>,
    n_conditions: usize,
}

impl MasterSchedule {
    /// Merge one event list per condition.
    pub fn new(conditions: &[Vec<Event>]) -> Self {
        let mut events: Vec<ScheduledEvent> = conditions
            .iter()
            .enumerate()
            .flat_map(|(condition, evs)| {
                evs.iter().enumerate().map(move |(index, event)| ScheduledEvent {
                    event: *event,
                    condition,
                    index,
                })
            })
            .collect();
        events.sort_by(|a, b| a.event.onset.total_cmp(&b.event.onset));

        Self {
            events,
            n_conditions: conditions.len(),
        }
    }

    /// Number of scheduled events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the schedule has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of condition lists the schedule was built from.
    pub fn n_conditions(&self) -> usize {
        self.n_conditions
    }

    /// Events in onset order.
    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    /// Iterate over events in onset order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScheduledEvent> {
        self.events.iter()
    }

    /// Timing of one condition's events, in onset order.
    pub fn condition(&self, condition: usize) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.condition == condition)
            .map(|e| e.event)
            .collect()
    }

    /// Timing of one condition's events, leaving out `excluded`.
    pub fn condition_without(&self, condition: usize, excluded: &ScheduledEvent) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.condition == condition && !e.same_source(excluded))
            .map(|e| e.event)
            .collect()
    }

    /// Timing of every event except `excluded`.
    pub fn without(&self, excluded: &ScheduledEvent) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| !e.same_source(excluded))
            .map(|e| e.event)
            .collect()
    }
}

impl<'a> IntoIterator for &'a MasterSchedule {
    type Item = &'a ScheduledEvent;
    type IntoIter = std::slice::Iter<'a, ScheduledEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions() -> Vec<Vec<Event>> {
        vec![
            vec![Event::impulse(30.0), Event::impulse(0.0)],
            vec![Event::impulse(10.0)],
            vec![Event::impulse(20.0), Event::impulse(40.0)],
        ]
    }

    #[test]
    fn test_sorted_by_onset() {
        let sched = MasterSchedule::new(&conditions());
        let onsets: Vec<f64> = sched.iter().map(|e| e.event.onset).collect();
        assert_eq!(onsets, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
        assert_eq!(sched.n_conditions(), 3);
    }

    #[test]
    fn test_keeps_source_indices() {
        let sched = MasterSchedule::new(&conditions());
        let first = sched.events()[0];
        assert_eq!((first.condition, first.index), (0, 1));
        let fourth = sched.events()[3];
        assert_eq!((fourth.condition, fourth.index), (0, 0));
    }

    #[test]
    fn test_every_event_once() {
        let conds = conditions();
        let sched = MasterSchedule::new(&conds);
        assert_eq!(sched.len(), conds.iter().map(Vec::len).sum::<usize>());
        for (c, evs) in conds.iter().enumerate() {
            for i in 0..evs.len() {
                let hits = sched.iter().filter(|e| e.condition == c && e.index == i).count();
                assert_eq!(hits, 1);
            }
        }
    }

    #[test]
    fn test_exclusion_by_identity() {
        let sched = MasterSchedule::new(&conditions());
        // Condition 0 is listed out of time order; exclusion must still hit
        // the right event
        let target = sched.events()[3];
        let rest = sched.condition_without(0, &target);
        assert_eq!(rest, vec![Event::impulse(0.0)]);
        assert_eq!(sched.without(&target).len(), 4);
        assert_eq!(sched.condition_without(1, &target).len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let sched = MasterSchedule::new(&[]);
        assert!(sched.is_empty());
        assert_eq!(sched.n_conditions(), 0);
    }
}
