// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    ActiveTab, ActivityId, ActivityInput, AutoScrollConfig, BulkOutcome, BulkReassignRequest,
    Company, CompanyId, CompanyInput, CompanyPatch, CrmError, CrmResult, DeletionConfirmation,
    DragPayload, DropResolution, FilterColumn, FilterEditor, FilterQuery, FilterValue, Gesture,
    ImportReport, ListChange, ListId, ListInput, ListKey, ListTab, Persistence, PointerDown, PointerModifiers,
    RecordStore, RepresentativeId, RepresentativeInput, RepresentativeTab, ScrollTick,
    SelectionEngine, Snapshot, ViewMode, apply_bulk_reassign, delete_companies, import_companies,
    load_snapshot, resolve_drop, tab_ids, visible_companies, visible_ids,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectCondition {
    /// Every company whose representative is checked in the column filter.
    RepresentativeFilter,
    /// Every company whose list is checked in the column filter.
    ListFilter,
    AllVisible,
    /// Every company in the active tab, ignoring search and column filters.
    AllInTab,
}

impl SelectCondition {
    pub const ALL: [Self; 4] = [
        Self::RepresentativeFilter,
        Self::ListFilter,
        Self::AllVisible,
        Self::AllInTab,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::RepresentativeFilter => "担当者フィルタの会社",
            Self::ListFilter => "リストフィルタの会社",
            Self::AllVisible => "表示中のすべて",
            Self::AllInTab => "タブ内のすべて",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Menu {
    #[default]
    Closed,
    SelectionOptions,
    BulkAssign,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkspaceOptions {
    pub autoscroll: AutoScrollConfig,
    pub default_view: ViewMode,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            autoscroll: AutoScrollConfig::default(),
            default_view: ViewMode::ByList,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    Applied(BulkOutcome),
    Ignored,
    NoDrag,
}

/// Owns the record store and every piece of view state derived from it.
/// The UI reads through accessors and changes things only through the
/// operations below.
#[derive(Debug, Clone)]
pub struct Workspace {
    store: RecordStore,
    search: String,
    tab: ActiveTab,
    filters: FilterEditor,
    selection: SelectionEngine,
    gesture: Gesture,
    menu: Menu,
    pending_delete: Option<DeletionConfirmation>,
}

impl Workspace {
    pub fn new(snapshot: Snapshot, options: WorkspaceOptions) -> Self {
        Self {
            store: RecordStore::from_snapshot(snapshot),
            search: String::new(),
            tab: ActiveTab::all_for(options.default_view),
            filters: FilterEditor::default(),
            selection: SelectionEngine::new(options.autoscroll),
            gesture: Gesture::Idle,
            menu: Menu::Closed,
            pending_delete: None,
        }
    }

    pub fn load<P: Persistence + ?Sized>(
        persistence: &mut P,
        options: WorkspaceOptions,
    ) -> Result<Self> {
        let snapshot = load_snapshot(persistence)?;
        info!(
            companies = snapshot.companies.len(),
            activities = snapshot.activities.len(),
            representatives = snapshot.representatives.len(),
            lists = snapshot.lists.len(),
            "workspace loaded"
        );
        Ok(Self::new(snapshot, options))
    }

    /// Re-reads every collection. Selection and filters are kept.
    pub fn reload<P: Persistence + ?Sized>(&mut self, persistence: &mut P) -> Result<()> {
        let snapshot = load_snapshot(persistence)?;
        self.store.replace_all(snapshot);
        if !self.tab_exists(self.tab) {
            self.tab = ActiveTab::all_for(self.tab.view_mode());
        }
        Ok(())
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    // --- tabs and search ---

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn active_tab(&self) -> ActiveTab {
        self.tab
    }

    pub fn view_mode(&self) -> ViewMode {
        self.tab.view_mode()
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) -> bool {
        if !self.tab_exists(tab) {
            return false;
        }
        self.tab = tab;
        true
    }

    pub fn toggle_view_mode(&mut self) {
        self.tab = ActiveTab::all_for(self.view_mode().toggled());
    }

    /// Tabs of the current view mode, in display order.
    pub fn tabs(&self) -> Vec<ActiveTab> {
        match self.view_mode() {
            ViewMode::ByList => {
                let mut tabs = vec![
                    ActiveTab::List(ListTab::All),
                    ActiveTab::List(ListTab::Unassigned),
                    ActiveTab::List(ListTab::Met),
                    ActiveTab::List(ListTab::NotMet),
                ];
                tabs.extend(
                    self.store
                        .lists()
                        .iter()
                        .map(|list| ActiveTab::List(ListTab::List(list.id))),
                );
                tabs
            }
            ViewMode::ByRepresentative => {
                let mut tabs = vec![ActiveTab::Representative(RepresentativeTab::All)];
                tabs.extend(self.store.representatives().iter().map(|rep| {
                    ActiveTab::Representative(RepresentativeTab::Representative(rep.id))
                }));
                tabs
            }
        }
    }

    pub fn tab_label(&self, tab: ActiveTab) -> String {
        match tab {
            ActiveTab::List(ListTab::All) | ActiveTab::Representative(RepresentativeTab::All) => {
                "すべて".to_owned()
            }
            ActiveTab::List(ListTab::Unassigned) => "未割り当て".to_owned(),
            ActiveTab::List(ListTab::Met) => "商談済み".to_owned(),
            ActiveTab::List(ListTab::NotMet) => "未商談".to_owned(),
            ActiveTab::List(ListTab::List(id)) => self.store.list_name(Some(id)).to_owned(),
            ActiveTab::Representative(RepresentativeTab::Representative(id)) => {
                self.store.representative_name(id).to_owned()
            }
        }
    }

    fn tab_exists(&self, tab: ActiveTab) -> bool {
        match tab {
            ActiveTab::List(ListTab::List(id)) => self.store.list(id).is_some(),
            ActiveTab::Representative(RepresentativeTab::Representative(id)) => {
                self.store.representative(id).is_some()
            }
            _ => true,
        }
    }

    // --- filters ---

    pub fn filters(&self) -> &FilterEditor {
        &self.filters
    }

    pub fn open_filter(&mut self, column: FilterColumn) {
        self.filters.open(column);
    }

    pub fn toggle_filter_value(&mut self, value: FilterValue) -> bool {
        self.filters.toggle(value)
    }

    pub fn confirm_filter(&mut self) {
        self.filters.confirm();
    }

    pub fn cancel_filter(&mut self) {
        self.filters.cancel();
    }

    pub fn clear_filter(&mut self, column: FilterColumn) {
        self.filters.clear_column(column);
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear_all();
    }

    fn query(&self) -> FilterQuery<'_> {
        FilterQuery {
            search: &self.search,
            tab: self.tab,
            filters: self.filters.committed(),
        }
    }

    pub fn visible_ids(&self) -> Vec<CompanyId> {
        visible_ids(&self.store, self.query())
    }

    pub fn visible_companies(&self) -> Vec<&Company> {
        visible_companies(&self.store, self.query())
    }

    // --- selection ---

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn toggle_selected(&mut self, id: CompanyId) -> bool {
        self.selection.toggle(id)
    }

    pub fn select_all_visible(&mut self) {
        let visible = self.visible_ids();
        self.selection.select_all(&visible);
    }

    /// Header checkbox: clears when every visible row reads as selected,
    /// otherwise selects all visible rows.
    pub fn toggle_all_visible(&mut self) {
        let visible = self.visible_ids();
        if self.selection.all_visible_selected(&visible) {
            self.selection.clear();
        } else {
            self.selection.select_all(&visible);
        }
    }

    pub fn all_visible_selected(&self) -> bool {
        self.selection.all_visible_selected(&self.visible_ids())
    }

    pub fn select_by(&mut self, condition: SelectCondition) {
        let committed = self.filters.committed();
        let ids: Vec<CompanyId> = match condition {
            SelectCondition::RepresentativeFilter => self
                .store
                .companies()
                .iter()
                .filter(|company| committed.representatives.contains(&company.representative_id))
                .map(|company| company.id)
                .collect(),
            SelectCondition::ListFilter => self
                .store
                .companies()
                .iter()
                .filter(|company| committed.lists.contains(&ListKey::of(company.list_id)))
                .map(|company| company.id)
                .collect(),
            SelectCondition::AllVisible => self.visible_ids(),
            SelectCondition::AllInTab => tab_ids(&self.store, self.tab),
        };
        debug!(?condition, count = ids.len(), "select by condition");
        self.selection.replace(ids);
        self.menu = Menu::Closed;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- menus ---

    pub fn menu(&self) -> Menu {
        self.menu
    }

    pub fn open_menu(&mut self, menu: Menu) -> CrmResult<()> {
        if menu == Menu::BulkAssign && self.selection.is_empty() {
            return Err(CrmError::validation("select at least one company first"));
        }
        self.menu = menu;
        Ok(())
    }

    pub fn close_menus(&mut self) {
        self.menu = Menu::Closed;
    }

    /// Escape: aborts range selection and auto-scroll, closes menus and
    /// dialogs. The selection itself is left alone.
    pub fn cancel(&mut self) {
        self.selection.cancel();
        if self.gesture == Gesture::RangeSelecting {
            self.gesture = Gesture::Idle;
        }
        self.menu = Menu::Closed;
        self.pending_delete = None;
    }

    // --- pointer gestures ---

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn pointer_down(&mut self, index: usize, modifiers: PointerModifiers) -> PointerDown {
        if matches!(self.gesture, Gesture::Dragging(_)) {
            return PointerDown::Ignored;
        }
        let visible = self.visible_ids();
        let outcome = self.selection.pointer_down(index, &visible, modifiers);
        if matches!(outcome, PointerDown::RangeStarted { .. }) {
            self.gesture.begin_range();
        }
        outcome
    }

    pub fn pointer_move(&mut self, index: usize) -> bool {
        if !self.selection.is_range_selecting() {
            return false;
        }
        let visible = self.visible_ids();
        self.selection.pointer_move(index, &visible)
    }

    pub fn pointer_up(&mut self) {
        self.selection.pointer_up();
        if self.gesture == Gesture::RangeSelecting {
            self.gesture = Gesture::Idle;
        }
    }

    pub fn update_autoscroll(&mut self, row: u16, height: u16, now: Instant) {
        self.selection.update_autoscroll(row, height, now);
    }

    pub fn autoscroll_tick(&mut self, now: Instant) -> Option<ScrollTick> {
        if !self.selection.is_autoscrolling() {
            return None;
        }
        let visible = self.visible_ids();
        self.selection.tick(now, &visible)
    }

    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.selection.time_until_tick(now)
    }

    /// Starts dragging `origin` (with the selection when it is part of it).
    /// Suppressed while a range selection runs.
    pub fn begin_drag(&mut self, origin: CompanyId) -> bool {
        if self.selection.is_range_selecting() {
            return false;
        }
        let payload = DragPayload::from_origin(&self.selection, origin);
        self.gesture.begin_drag(payload)
    }

    pub fn drag_payload(&self) -> Option<&DragPayload> {
        self.gesture.payload()
    }

    pub fn end_drag(&mut self) {
        self.gesture.finish();
    }

    pub fn drop_on<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        target: ActiveTab,
    ) -> CrmResult<DropOutcome> {
        let Some(payload) = self.gesture.finish() else {
            return Ok(DropOutcome::NoDrag);
        };
        match resolve_drop(target) {
            DropResolution::Reject => Err(CrmError::validation(format!(
                "companies cannot be moved to {}",
                self.tab_label(target)
            ))),
            DropResolution::Ignore => Ok(DropOutcome::Ignored),
            DropResolution::Apply(change) => {
                let outcome = apply_bulk_reassign(
                    persistence,
                    &mut self.store,
                    payload.ids(),
                    &change.request(),
                )?;
                Ok(DropOutcome::Applied(outcome))
            }
        }
    }

    // --- bulk operations ---

    /// Applies the request to every selected company. Ids that failed stay
    /// selected so the user can retry them.
    pub fn bulk_reassign<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        request: &BulkReassignRequest,
    ) -> CrmResult<BulkOutcome> {
        let list = match request.list_change {
            ListChange::SetTo(list) => Some(list),
            ListChange::NoChange | ListChange::Unassign => None,
        };
        self.ensure_targets_exist(request.representative_id, list)?;
        let ids = self.selection.selected_ids();
        let outcome = apply_bulk_reassign(persistence, &mut self.store, &ids, request)?;
        self.selection.replace(outcome.failed_ids());
        self.menu = Menu::Closed;
        Ok(outcome)
    }

    pub fn request_delete_selected(&mut self) -> CrmResult<&DeletionConfirmation> {
        let confirmation =
            DeletionConfirmation::prepare(&self.store, &self.selection.selected_ids())?;
        let confirmation: &DeletionConfirmation = self.pending_delete.insert(confirmation);
        Ok(confirmation)
    }

    pub fn pending_delete(&self) -> Option<&DeletionConfirmation> {
        self.pending_delete.as_ref()
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn confirm_delete<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
    ) -> CrmResult<BulkOutcome> {
        let confirmation = self
            .pending_delete
            .take()
            .ok_or_else(|| CrmError::validation("nothing is waiting for confirmation"))?;
        let outcome = delete_companies(persistence, &mut self.store, &confirmation);
        self.selection.clear();
        Ok(outcome)
    }

    // --- single-record operations ---

    pub fn add_company<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        input: &CompanyInput,
    ) -> CrmResult<CompanyId> {
        input.validate()?;
        self.ensure_targets_exist(Some(input.representative_id), input.list_id)?;
        let company = persistence.add_company(input)?;
        let id = company.id;
        self.store.insert_company(company);
        Ok(id)
    }

    pub fn update_company<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: CompanyId,
        patch: &CompanyPatch,
    ) -> CrmResult<()> {
        patch.validate()?;
        if self.store.company(id).is_none() {
            return Err(CrmError::validation(format!("company {id} does not exist")));
        }
        self.ensure_targets_exist(patch.representative_id, patch.list_id.flatten())?;
        let company = persistence.update_company(id, patch)?;
        self.store.replace_company(company);
        Ok(())
    }

    /// Rejects assignments to a representative or list the store does not hold.
    fn ensure_targets_exist(
        &self,
        representative: Option<RepresentativeId>,
        list: Option<ListId>,
    ) -> CrmResult<()> {
        if let Some(id) = representative
            && self.store.representative(id).is_none()
        {
            return Err(CrmError::validation(format!(
                "representative {id} does not exist"
            )));
        }
        if let Some(id) = list
            && self.store.list(id).is_none()
        {
            return Err(CrmError::validation(format!("list {id} does not exist")));
        }
        Ok(())
    }

    pub fn delete_company<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: CompanyId,
    ) -> CrmResult<()> {
        persistence.delete_company(id)?;
        self.store.remove_company(id);
        self.selection.remove(&[id]);
        Ok(())
    }

    pub fn add_activity<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        input: ActivityInput,
    ) -> CrmResult<ActivityId> {
        input.validate()?;
        if self.store.company(input.company_id).is_none() {
            return Err(CrmError::validation(format!(
                "company {} does not exist",
                input.company_id
            )));
        }
        let activity = persistence.add_activity(&input.normalized())?;
        let id = activity.id;
        self.store.insert_activity(activity);
        Ok(id)
    }

    pub fn update_activity<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: ActivityId,
        input: ActivityInput,
    ) -> CrmResult<()> {
        input.validate()?;
        if self.store.activity(id).is_none() {
            return Err(CrmError::validation(format!("activity {id} does not exist")));
        }
        if self.store.company(input.company_id).is_none() {
            return Err(CrmError::validation(format!(
                "company {} does not exist",
                input.company_id
            )));
        }
        let activity = persistence.update_activity(id, &input.normalized())?;
        self.store.insert_activity(activity);
        Ok(())
    }

    pub fn delete_activity<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: ActivityId,
    ) -> CrmResult<()> {
        persistence.delete_activity(id)?;
        self.store.remove_activity(id);
        Ok(())
    }

    pub fn add_representative<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        input: &RepresentativeInput,
    ) -> CrmResult<RepresentativeId> {
        input.validate()?;
        let representative = persistence.add_representative(input)?;
        let id = representative.id;
        self.store.insert_representative(representative);
        Ok(id)
    }

    pub fn update_representative<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: RepresentativeId,
        input: &RepresentativeInput,
    ) -> CrmResult<()> {
        input.validate()?;
        let representative = persistence.update_representative(id, input)?;
        self.store.insert_representative(representative);
        Ok(())
    }

    /// Refused while any company is still assigned to the representative.
    pub fn delete_representative<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: RepresentativeId,
    ) -> CrmResult<()> {
        self.store.ensure_representative_deletable(id)?;
        persistence.delete_representative(id)?;
        self.store.remove_representative(id)?;
        self.filters.forget(FilterValue::Representative(id));
        if self.tab == ActiveTab::Representative(RepresentativeTab::Representative(id)) {
            self.tab = ActiveTab::Representative(RepresentativeTab::All);
        }
        Ok(())
    }

    pub fn add_list<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        input: &ListInput,
    ) -> CrmResult<ListId> {
        input.validate()?;
        let list = persistence.add_list(input)?;
        let id = list.id;
        self.store.insert_list(list);
        Ok(id)
    }

    pub fn update_list<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: ListId,
        input: &ListInput,
    ) -> CrmResult<()> {
        input.validate()?;
        let list = persistence.update_list(id, input)?;
        self.store.insert_list(list);
        Ok(())
    }

    /// Deleting a list with members needs `unassign_members`; the members
    /// then lose their list assignment. Returns how many were unassigned.
    pub fn delete_list<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        id: ListId,
        unassign_members: bool,
    ) -> CrmResult<usize> {
        let members = self.store.list_member_count(id);
        if members > 0 && !unassign_members {
            return Err(CrmError::integrity(format!(
                "list {} still holds {members} compan{} -- confirm to unassign them",
                self.store.list_name(Some(id)),
                if members == 1 { "y" } else { "ies" }
            )));
        }
        persistence.delete_list(id)?;
        let unassigned = self.store.remove_list(id);
        self.filters.forget(FilterValue::List(ListKey::List(id)));
        if self.tab == ActiveTab::List(ListTab::List(id)) {
            self.tab = ActiveTab::List(ListTab::All);
        }
        Ok(unassigned.len())
    }

    pub fn import_csv<P: Persistence + ?Sized>(
        &mut self,
        persistence: &mut P,
        text: &str,
    ) -> CrmResult<ImportReport> {
        import_companies(persistence, &mut self.store, text)
    }
}
