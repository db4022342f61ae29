// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::CompanyId;

/// Fixed-interval timer driven by the event loop. It never fires on its
/// own; callers ask how many intervals elapsed since the last check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatingTask {
    interval: Duration,
    next_due: Option<Instant>,
}

impl RepeatingTask {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Starting an already running task keeps its schedule.
    pub fn start(&mut self, now: Instant) {
        if self.next_due.is_none() {
            self.next_due = Some(now + self.interval);
        }
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Number of intervals that elapsed up to `now`. Advances the schedule.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        let Some(mut next) = self.next_due else {
            return 0;
        };
        if self.interval.is_zero() {
            self.next_due = Some(now);
            return 1;
        }
        let mut ticks = 0;
        while next <= now {
            ticks += 1;
            next += self.interval;
        }
        self.next_due = Some(next);
        ticks
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due
            .map(|next| next.saturating_duration_since(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoScrollConfig {
    /// Height of the top and bottom trigger zones, in rows.
    pub margin_rows: u16,
    /// Viewport rows scrolled per tick at the inner edge of the zone.
    pub min_speed: f32,
    /// Viewport rows scrolled per tick at the outer edge of the zone.
    pub max_speed: f32,
    pub tick: Duration,
    /// Rows the range endpoint advances per tick.
    pub step_rows: usize,
}

impl Default for AutoScrollConfig {
    fn default() -> Self {
        Self {
            margin_rows: 2,
            min_speed: 1.0,
            max_speed: 4.0,
            tick: Duration::from_millis(30),
            step_rows: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollTick {
    pub direction: ScrollDirection,
    pub speed: f32,
    pub ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerModifiers {
    /// Toggle one row without touching the rest (Ctrl).
    pub discrete: bool,
    /// Keep the current selection as the base of a new range (Shift).
    pub extend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDown {
    RangeStarted { anchor: usize },
    /// The row was already selected; it may become the origin of a drag.
    DragCandidate(CompanyId),
    Toggled { id: CompanyId, selected: bool },
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RangeSession {
    anchor: usize,
    far: usize,
    base: BTreeSet<CompanyId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScrollZone {
    direction: ScrollDirection,
    speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEngine {
    selected: BTreeSet<CompanyId>,
    range: Option<RangeSession>,
    autoscroll: AutoScrollConfig,
    task: RepeatingTask,
    zone: Option<ScrollZone>,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(AutoScrollConfig::default())
    }
}

impl SelectionEngine {
    pub fn new(autoscroll: AutoScrollConfig) -> Self {
        Self {
            selected: BTreeSet::new(),
            range: None,
            task: RepeatingTask::new(autoscroll.tick),
            autoscroll,
            zone: None,
        }
    }

    pub fn autoscroll_config(&self) -> &AutoScrollConfig {
        &self.autoscroll
    }

    pub fn selected(&self) -> &BTreeSet<CompanyId> {
        &self.selected
    }

    pub fn selected_ids(&self) -> Vec<CompanyId> {
        self.selected.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, id: CompanyId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_range_selecting(&self) -> bool {
        self.range.is_some()
    }

    pub fn is_autoscrolling(&self) -> bool {
        self.task.is_running()
    }

    /// Visible-index endpoints of the running range session.
    pub fn range_bounds(&self) -> Option<(usize, usize)> {
        self.range.as_ref().map(|range| (range.anchor, range.far))
    }

    pub fn toggle(&mut self, id: CompanyId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    pub fn replace(&mut self, ids: impl IntoIterator<Item = CompanyId>) {
        self.selected = ids.into_iter().collect();
    }

    pub fn select_all(&mut self, visible: &[CompanyId]) {
        self.replace(visible.iter().copied());
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn remove(&mut self, ids: &[CompanyId]) {
        for id in ids {
            self.selected.remove(id);
        }
    }

    /// Header checkbox state. Compares sizes only, so stale ids from another
    /// tab can make it read as checked.
    pub fn all_visible_selected(&self, visible: &[CompanyId]) -> bool {
        self.selected.len() == visible.len()
    }

    pub fn pointer_down(
        &mut self,
        index: usize,
        visible: &[CompanyId],
        modifiers: PointerModifiers,
    ) -> PointerDown {
        let Some(index) = clamp_index(index, visible.len()) else {
            return PointerDown::Ignored;
        };
        let id = visible[index];
        if modifiers.discrete {
            let selected = self.toggle(id);
            return PointerDown::Toggled { id, selected };
        }
        if self.selected.contains(&id) {
            return PointerDown::DragCandidate(id);
        }
        let base = if modifiers.extend {
            self.selected.clone()
        } else {
            BTreeSet::new()
        };
        self.range = Some(RangeSession {
            anchor: index,
            far: index,
            base,
        });
        self.recompute(visible);
        PointerDown::RangeStarted { anchor: index }
    }

    /// Moves the far endpoint. Returns false when no session is running.
    pub fn pointer_move(&mut self, index: usize, visible: &[CompanyId]) -> bool {
        let Some(index) = clamp_index(index, visible.len()) else {
            return false;
        };
        let Some(range) = self.range.as_mut() else {
            return false;
        };
        range.far = index;
        self.recompute(visible);
        true
    }

    /// Ends the range session, keeping the last computed selection.
    pub fn pointer_up(&mut self) -> bool {
        self.stop_autoscroll();
        self.range.take().is_some()
    }

    /// Aborts the range session and auto-scroll; the selection stays as it is.
    pub fn cancel(&mut self) -> bool {
        self.pointer_up()
    }

    /// Re-evaluates the trigger zones for a pointer at `row` of a viewport
    /// `height` rows tall. Outside a zone auto-scroll stops.
    pub fn update_autoscroll(&mut self, row: u16, height: u16, now: Instant) {
        if self.range.is_none() {
            self.stop_autoscroll();
            return;
        }
        match scroll_zone(&self.autoscroll, row, height) {
            Some(zone) => {
                self.zone = Some(zone);
                self.task.start(now);
            }
            None => self.stop_autoscroll(),
        }
    }

    pub fn stop_autoscroll(&mut self) {
        self.task.stop();
        self.zone = None;
    }

    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.task.time_until_due(now)
    }

    /// Runs every auto-scroll tick due at `now`.
    pub fn tick(&mut self, now: Instant, visible: &[CompanyId]) -> Option<ScrollTick> {
        let zone = self.zone?;
        self.range.as_ref()?;
        let ticks = self.task.due_ticks(now);
        if ticks == 0 {
            return None;
        }
        self.advance(zone.direction, ticks, visible);
        Some(ScrollTick {
            direction: zone.direction,
            speed: zone.speed,
            ticks,
        })
    }

    /// Moves the far endpoint `ticks` steps, clamped to the visible bounds.
    pub fn advance(&mut self, direction: ScrollDirection, ticks: u32, visible: &[CompanyId]) {
        if visible.is_empty() {
            return;
        }
        let last = visible.len() - 1;
        let step = self.autoscroll.step_rows;
        let Some(range) = self.range.as_mut() else {
            return;
        };
        for _ in 0..ticks {
            range.far = match direction {
                ScrollDirection::Up => range.far.saturating_sub(step),
                ScrollDirection::Down => range.far.saturating_add(step).min(last),
            };
        }
        self.recompute(visible);
    }

    fn recompute(&mut self, visible: &[CompanyId]) {
        let Some(range) = self.range.as_mut() else {
            return;
        };
        if visible.is_empty() {
            return;
        }
        let last = visible.len() - 1;
        range.anchor = range.anchor.min(last);
        range.far = range.far.min(last);
        let (start, end) = if range.anchor <= range.far {
            (range.anchor, range.far)
        } else {
            (range.far, range.anchor)
        };
        let mut selected = range.base.clone();
        selected.extend(visible[start..=end].iter().copied());
        self.selected = selected;
    }
}

fn clamp_index(index: usize, len: usize) -> Option<usize> {
    if len == 0 { None } else { Some(index.min(len - 1)) }
}

fn scroll_zone(config: &AutoScrollConfig, row: u16, height: u16) -> Option<ScrollZone> {
    let margin = config.margin_rows;
    if margin == 0 || height == 0 {
        return None;
    }
    let (direction, depth) = if row < margin {
        (ScrollDirection::Up, margin - row)
    } else if row >= height.saturating_sub(margin) {
        (
            ScrollDirection::Down,
            (row - height.saturating_sub(margin) + 1).min(margin),
        )
    } else {
        return None;
    };
    let ratio = f32::from(depth) / f32::from(margin);
    Some(ScrollZone {
        direction,
        speed: config.min_speed + (config.max_speed - config.min_speed) * ratio,
    })
}
