// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    ActiveTab, BulkReassignRequest, CompanyId, ListChange, ListId, ListTab, RepresentativeId,
    RepresentativeTab, SelectionEngine,
};

/// Ids carried by a row drag: the whole selection when the origin row is
/// part of it, otherwise the origin alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    ids: Vec<CompanyId>,
}

impl DragPayload {
    pub fn from_origin(selection: &SelectionEngine, origin: CompanyId) -> Self {
        let ids = if selection.is_selected(origin) {
            selection.selected_ids()
        } else {
            vec![origin]
        };
        Self { ids }
    }

    pub fn ids(&self) -> &[CompanyId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclassification {
    SetList(Option<ListId>),
    SetRepresentative(RepresentativeId),
}

impl Reclassification {
    pub const fn request(self) -> BulkReassignRequest {
        match self {
            Self::SetList(None) => BulkReassignRequest::list(ListChange::Unassign),
            Self::SetList(Some(id)) => BulkReassignRequest::list(ListChange::SetTo(id)),
            Self::SetRepresentative(id) => BulkReassignRequest::representative(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropResolution {
    Apply(Reclassification),
    /// Accepted but changes nothing.
    Ignore,
    Reject,
}

pub const fn resolve_drop(target: ActiveTab) -> DropResolution {
    match target {
        ActiveTab::List(ListTab::All | ListTab::Unassigned) => {
            DropResolution::Apply(Reclassification::SetList(None))
        }
        ActiveTab::List(ListTab::List(id)) => {
            DropResolution::Apply(Reclassification::SetList(Some(id)))
        }
        ActiveTab::List(ListTab::Met | ListTab::NotMet) => DropResolution::Reject,
        ActiveTab::Representative(RepresentativeTab::All) => DropResolution::Ignore,
        ActiveTab::Representative(RepresentativeTab::Representative(id)) => {
            DropResolution::Apply(Reclassification::SetRepresentative(id))
        }
    }
}

pub const fn accepts_drop(target: ActiveTab) -> bool {
    !matches!(resolve_drop(target), DropResolution::Reject)
}

/// Pointer gesture in progress. Range selection and row dragging never
/// overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Gesture {
    #[default]
    Idle,
    RangeSelecting,
    Dragging(DragPayload),
}

impl Gesture {
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn payload(&self) -> Option<&DragPayload> {
        match self {
            Self::Dragging(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn begin_range(&mut self) -> bool {
        if matches!(self, Self::Dragging(_)) {
            return false;
        }
        *self = Self::RangeSelecting;
        true
    }

    /// Suppressed while a range selection is running.
    pub fn begin_drag(&mut self, payload: DragPayload) -> bool {
        if matches!(self, Self::RangeSelecting) || payload.is_empty() {
            return false;
        }
        *self = Self::Dragging(payload);
        true
    }

    /// Returns the drag payload, if a drag was running.
    pub fn finish(&mut self) -> Option<DragPayload> {
        match std::mem::take(self) {
            Self::Dragging(payload) => Some(payload),
            _ => None,
        }
    }
}
