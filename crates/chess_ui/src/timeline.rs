//! Grouped, cancellable tweens advanced once per frame.
//!
//! A [`Timeline`] interpolates a vector of floats over a duration and hands
//! the eased values to its update callback. Timelines are generic over the
//! context `C` they mutate (the scene, in practice), which the scheduler
//! passes in on every [`TimelineScheduler::advance`] call.

use std::f32::consts::PI;
use std::fmt;
use std::time::Duration;

use log::{debug, trace};

/// Tag used only for bulk cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelineGroup {
    Camera,
    Piece,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    QuadraticOut,
    QuadraticInOut,
    ExponentialOut,
    SineInOut,
}

impl Easing {
    /// Maps linear progress in `[0, 1]` to eased progress.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadraticOut => t * (2.0 - t),
            Easing::QuadraticInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::ExponentialOut => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f32.powf(-10.0 * t)
                }
            }
            Easing::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimelineHandle(u64);

pub type UpdateFn<C> = Box<dyn FnMut(&mut C, &[f32]) + Send + Sync>;
pub type CompleteFn<C> = Box<dyn FnOnce(&mut C, &mut Followups<'_, C>) + Send + Sync>;

/// A keyframed interpolation with an optional continuation.
///
/// The continuation in `next` starts when this timeline completes and keeps
/// the same handle and group, so cancelling the handle or the group stops
/// the whole chain.
pub struct Timeline<C> {
    label: &'static str,
    from: Vec<f32>,
    to: Vec<f32>,
    duration: Duration,
    delay: Duration,
    easing: Easing,
    on_update: Option<UpdateFn<C>>,
    on_complete: Option<CompleteFn<C>>,
    next: Option<Box<Timeline<C>>>,
}

impl<C> Timeline<C> {
    /// `from` and `to` must have the same number of channels.
    pub fn new(label: &'static str, from: Vec<f32>, to: Vec<f32>, duration: Duration) -> Self {
        debug_assert_eq!(from.len(), to.len(), "timeline '{label}' has mismatched channels");
        Self {
            label,
            from,
            to,
            duration,
            delay: Duration::ZERO,
            easing: Easing::Linear,
            on_update: None,
            on_complete: None,
            next: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn on_update(mut self, update: impl FnMut(&mut C, &[f32]) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(update));
        self
    }

    pub fn on_complete(
        mut self,
        complete: impl FnOnce(&mut C, &mut Followups<'_, C>) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(complete));
        self
    }

    /// Appends a continuation at the end of the chain.
    pub fn then(mut self, next: Timeline<C>) -> Self {
        let tail = match self.next.take() {
            Some(existing) => (*existing).then(next),
            None => next,
        };
        self.next = Some(Box::new(tail));
        self
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn start_delay(&self) -> Duration {
        self.delay
    }

    pub fn continuation(&self) -> Option<&Timeline<C>> {
        self.next.as_deref()
    }

    /// Linear progress after `elapsed`, or `None` while the start delay runs.
    fn progress(&self, elapsed: Duration) -> Option<f32> {
        let active = elapsed.checked_sub(self.delay)?;
        if self.duration.is_zero() {
            return Some(1.0);
        }
        Some((active.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0))
    }

    fn values_at(&self, progress: f32) -> Vec<f32> {
        let eased = self.easing.apply(progress);
        self.from
            .iter()
            .zip(&self.to)
            .map(|(start, end)| start + (end - start) * eased)
            .collect()
    }
}

impl<C> fmt::Debug for Timeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("label", &self.label)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("duration", &self.duration)
            .field("delay", &self.delay)
            .field("easing", &self.easing)
            .field("next", &self.next)
            .finish()
    }
}

struct Entry<C> {
    handle: TimelineHandle,
    group: TimelineGroup,
    elapsed: Duration,
    timeline: Timeline<C>,
}

/// Timelines scheduled from a completion callback.
///
/// They join the scheduler once the callback returns and are first advanced
/// on the following pass.
pub struct Followups<'a, C> {
    next_handle: &'a mut u64,
    scheduled: Vec<Entry<C>>,
}

impl<C> Followups<'_, C> {
    pub fn schedule(&mut self, timeline: Timeline<C>, group: TimelineGroup) -> TimelineHandle {
        let handle = TimelineHandle(*self.next_handle);
        *self.next_handle += 1;
        self.scheduled.push(Entry {
            handle,
            group,
            elapsed: Duration::ZERO,
            timeline,
        });
        handle
    }
}

pub struct TimelineScheduler<C> {
    entries: Vec<Entry<C>>,
    next_handle: u64,
}

impl<C> Default for TimelineScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TimelineScheduler<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_handle: 1,
        }
    }

    /// Registers a timeline; its clock starts with the next `advance`.
    pub fn schedule(&mut self, timeline: Timeline<C>, group: TimelineGroup) -> TimelineHandle {
        let handle = TimelineHandle(self.next_handle);
        self.next_handle += 1;
        debug!(
            "scheduling '{}' as {:?} in {:?}",
            timeline.label, handle, group
        );
        self.entries.push(Entry {
            handle,
            group,
            elapsed: Duration::ZERO,
            timeline,
        });
        handle
    }

    /// Drops every timeline in `group` without running completions.
    /// Returns how many were removed.
    pub fn cancel_group(&mut self, group: TimelineGroup) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.group != group);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("cancelled {removed} timeline(s) in {group:?}");
        }
        removed
    }

    /// Drops one timeline chain without running its completion.
    pub fn cancel(&mut self, handle: TimelineHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.handle != handle);
        before != self.entries.len()
    }

    pub fn is_active(&self, handle: TimelineHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    pub fn get(&self, handle: TimelineHandle) -> Option<&Timeline<C>> {
        self.entries
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| &entry.timeline)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    pub fn active_in(&self, group: TimelineGroup) -> usize {
        self.entries.iter().filter(|entry| entry.group == group).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active timelines of a group, oldest first.
    pub fn iter_group(
        &self,
        group: TimelineGroup,
    ) -> impl Iterator<Item = (TimelineHandle, &Timeline<C>)> + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.group == group)
            .map(|entry| (entry.handle, &entry.timeline))
    }

    /// Moves every timeline forward by `dt`.
    ///
    /// Entries are visited from the tail backwards. Continuations and
    /// followups are appended at the tail, behind the cursor, so nothing
    /// scheduled during this pass is visited again before the next one.
    pub fn advance(&mut self, dt: Duration, context: &mut C) {
        let mut index = self.entries.len();
        while index > 0 {
            index -= 1;

            let entry = &mut self.entries[index];
            entry.elapsed += dt;
            let Some(progress) = entry.timeline.progress(entry.elapsed) else {
                continue;
            };

            let values = entry.timeline.values_at(progress);
            if let Some(update) = entry.timeline.on_update.as_mut() {
                update(context, &values);
            }
            if progress < 1.0 {
                continue;
            }

            let Entry {
                handle,
                group,
                timeline,
                ..
            } = self.entries.remove(index);
            trace!("'{}' completed", timeline.label);

            let mut followups = Followups {
                next_handle: &mut self.next_handle,
                scheduled: Vec::new(),
            };
            if let Some(complete) = timeline.on_complete {
                complete(context, &mut followups);
            }
            let scheduled = followups.scheduled;

            if let Some(next) = timeline.next {
                self.entries.push(Entry {
                    handle,
                    group,
                    elapsed: Duration::ZERO,
                    timeline: *next,
                });
            }
            self.entries.extend(scheduled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        updates: Vec<(u32, Vec<f32>)>,
        completions: Vec<u32>,
    }

    const FRAME: Duration = Duration::from_millis(100);

    fn tagged(id: u32, millis: u64) -> Timeline<Probe> {
        Timeline::new("probe", vec![0.0], vec![10.0], Duration::from_millis(millis))
            .on_update(move |probe: &mut Probe, values| probe.updates.push((id, values.to_vec())))
            .on_complete(move |probe: &mut Probe, _| probe.completions.push(id))
    }

    fn updates_of(probe: &Probe, id: u32) -> usize {
        probe.updates.iter().filter(|(owner, _)| *owner == id).count()
    }

    #[test]
    fn easing_keeps_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::QuadraticOut,
            Easing::QuadraticInOut,
            Easing::ExponentialOut,
            Easing::SineInOut,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-3, "{easing:?}");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{easing:?}");
        }
    }

    #[test]
    fn interpolates_every_channel_with_one_scalar() {
        let mut scheduler = TimelineScheduler::new();
        let mut probe = Probe::default();
        scheduler.schedule(
            Timeline::new("pair", vec![0.0, 100.0], vec![10.0, 0.0], Duration::from_millis(400))
                .on_update(|probe: &mut Probe, values| probe.updates.push((1, values.to_vec()))),
            TimelineGroup::Other,
        );

        scheduler.advance(FRAME, &mut probe);
        let values = &probe.updates[0].1;
        assert!((values[0] - 2.5).abs() < 1e-4);
        assert!((values[1] - 75.0).abs() < 1e-3);
    }

    #[test]
    fn cancelling_a_group_leaves_the_others_running() {
        let mut scheduler = TimelineScheduler::new();
        let mut probe = Probe::default();
        for id in 0..3 {
            scheduler.schedule(tagged(id, 1000), TimelineGroup::Piece);
        }
        for id in 10..12 {
            scheduler.schedule(tagged(id, 1000), TimelineGroup::Camera);
        }
        scheduler.advance(FRAME, &mut probe);

        assert_eq!(scheduler.cancel_group(TimelineGroup::Piece), 3);
        assert_eq!(scheduler.active_count(), 2);
        assert_eq!(scheduler.active_in(TimelineGroup::Camera), 2);

        scheduler.advance(FRAME, &mut probe);
        assert_eq!(updates_of(&probe, 10), 2);
        assert_eq!(updates_of(&probe, 11), 2);
        assert_eq!(updates_of(&probe, 0), 1);
    }

    #[test]
    fn cancelled_timelines_never_complete() {
        let mut scheduler = TimelineScheduler::new();
        let mut probe = Probe::default();
        let cancelled = scheduler.schedule(tagged(1, 300), TimelineGroup::Piece);
        scheduler.schedule(tagged(2, 300), TimelineGroup::Piece);

        scheduler.advance(FRAME, &mut probe);
        assert!(scheduler.cancel(cancelled));
        assert!(!scheduler.cancel(cancelled));
        for _ in 0..10 {
            scheduler.advance(FRAME, &mut probe);
        }

        assert_eq!(probe.completions, vec![2]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn start_delay_holds_back_updates() {
        let mut scheduler = TimelineScheduler::new();
        let mut probe = Probe::default();
        let handle = scheduler.schedule(
            tagged(1, 200).delay(Duration::from_millis(250)),
            TimelineGroup::Piece,
        );
        assert_eq!(
            scheduler.get(handle).map(Timeline::start_delay),
            Some(Duration::from_millis(250))
        );

        scheduler.advance(FRAME, &mut probe);
        scheduler.advance(FRAME, &mut probe);
        assert!(probe.updates.is_empty());

        scheduler.advance(FRAME, &mut probe);
        scheduler.advance(FRAME, &mut probe);
        assert_eq!(updates_of(&probe, 1), 2);
        assert!(probe.completions.is_empty());

        scheduler.advance(FRAME, &mut probe);
        assert_eq!(probe.completions, vec![1]);
    }

    #[test]
    fn zero_duration_completes_on_first_advance() {
        let mut scheduler = TimelineScheduler::new();
        let mut probe = Probe::default();
        scheduler.schedule(tagged(7, 0), TimelineGroup::Other);
        scheduler.advance(Duration::from_millis(1), &mut probe);
        assert_eq!(probe.updates, vec![(7, vec![10.0])]);
        assert_eq!(probe.completions, vec![7]);
    }

    #[test]
    fn continuation_runs_after_its_parent_under_the_same_handle() {
        let mut scheduler = TimelineScheduler::new();
        let mut probe = Probe::default();
        let handle = scheduler.schedule(tagged(1, 100).then(tagged(2, 200)), TimelineGroup::Piece);

        scheduler.advance(FRAME, &mut probe);
        assert_eq!(probe.completions, vec![1]);
        assert_eq!(updates_of(&probe, 2), 0);
        assert!(scheduler.is_active(handle));

        scheduler.advance(FRAME, &mut probe);
        assert_eq!(updates_of(&probe, 2), 1);
        assert_eq!(probe.updates.last().map(|(_, v)| v[0]), Some(5.0));

        assert!(scheduler.cancel(handle));
        scheduler.advance(FRAME, &mut probe);
        assert_eq!(probe.completions, vec![1]);
    }

    #[test]
    fn followups_wait_for_the_next_pass() {
        let mut scheduler = TimelineScheduler::new();
        let mut probe = Probe::default();
        scheduler.schedule(tagged(1, 1000), TimelineGroup::Piece);
        scheduler.schedule(
            tagged(2, 100).on_complete(|probe: &mut Probe, followups| {
                probe.completions.push(2);
                followups.schedule(tagged(3, 200), TimelineGroup::Piece);
            }),
            TimelineGroup::Piece,
        );
        scheduler.schedule(tagged(4, 1000), TimelineGroup::Piece);

        scheduler.advance(FRAME, &mut probe);
        assert_eq!(probe.completions, vec![2]);
        assert_eq!(updates_of(&probe, 3), 0);
        assert_eq!(updates_of(&probe, 1), 1);
        assert_eq!(updates_of(&probe, 4), 1);

        scheduler.advance(FRAME, &mut probe);
        assert_eq!(updates_of(&probe, 3), 1);
        assert_eq!(updates_of(&probe, 1), 2);
        assert_eq!(updates_of(&probe, 4), 2);

        scheduler.advance(FRAME, &mut probe);
        assert_eq!(probe.completions, vec![2, 3]);
    }
}
