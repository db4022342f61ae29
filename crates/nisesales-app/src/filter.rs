// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{
    ActiveTab, Company, CompanyId, ListId, ListTab, NegotiationState, ProspectScore, RecordStore,
    RepresentativeId, RepresentativeTab, UNSET_LABEL,
};

const UNASSIGNED_VALUE: &str = "unassigned";
const UNSET_VALUE: &str = "unset";
const MET_VALUE: &str = "met";
const NOT_MET_VALUE: &str = "not-met";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterColumn {
    Representative,
    List,
    ProspectScore,
    Negotiation,
}

impl FilterColumn {
    pub const ALL: [Self; 4] = [
        Self::Representative,
        Self::List,
        Self::ProspectScore,
        Self::Negotiation,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Representative => "担当者",
            Self::List => "リスト",
            Self::ProspectScore => "見込み度",
            Self::Negotiation => "商談状況",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListKey {
    Unassigned,
    List(ListId),
}

impl ListKey {
    pub const fn of(list_id: Option<ListId>) -> Self {
        match list_id {
            Some(id) => Self::List(id),
            None => Self::Unassigned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScoreKey {
    Unset,
    Score(ProspectScore),
}

impl ScoreKey {
    pub const fn of(score: Option<ProspectScore>) -> Self {
        match score {
            Some(score) => Self::Score(score),
            None => Self::Unset,
        }
    }
}

/// One checkbox value in a column filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterValue {
    Representative(RepresentativeId),
    List(ListKey),
    Score(ScoreKey),
    Negotiation(NegotiationState),
}

impl FilterValue {
    pub const fn column(self) -> FilterColumn {
        match self {
            Self::Representative(_) => FilterColumn::Representative,
            Self::List(_) => FilterColumn::List,
            Self::Score(_) => FilterColumn::ProspectScore,
            Self::Negotiation(_) => FilterColumn::Negotiation,
        }
    }

    /// Raw string form. The sentinel strings only exist here.
    pub fn encode(self) -> String {
        match self {
            Self::Representative(id) => id.get().to_string(),
            Self::List(ListKey::Unassigned) => UNASSIGNED_VALUE.to_owned(),
            Self::List(ListKey::List(id)) => id.get().to_string(),
            Self::Score(ScoreKey::Unset) => UNSET_VALUE.to_owned(),
            Self::Score(ScoreKey::Score(score)) => score.as_str().to_owned(),
            Self::Negotiation(NegotiationState::Met) => MET_VALUE.to_owned(),
            Self::Negotiation(NegotiationState::NotMet) => NOT_MET_VALUE.to_owned(),
        }
    }

    pub fn decode(column: FilterColumn, raw: &str) -> Option<Self> {
        match column {
            FilterColumn::Representative => raw
                .parse::<i64>()
                .ok()
                .map(|id| Self::Representative(RepresentativeId::new(id))),
            FilterColumn::List if raw == UNASSIGNED_VALUE => Some(Self::List(ListKey::Unassigned)),
            FilterColumn::List => raw
                .parse::<i64>()
                .ok()
                .map(|id| Self::List(ListKey::List(ListId::new(id)))),
            FilterColumn::ProspectScore if raw == UNSET_VALUE => Some(Self::Score(ScoreKey::Unset)),
            FilterColumn::ProspectScore => {
                ProspectScore::parse(raw).map(|score| Self::Score(ScoreKey::Score(score)))
            }
            FilterColumn::Negotiation => match raw {
                MET_VALUE => Some(Self::Negotiation(NegotiationState::Met)),
                NOT_MET_VALUE => Some(Self::Negotiation(NegotiationState::NotMet)),
                _ => None,
            },
        }
    }
}

/// Allowed values per column. An empty set lets every value through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFilters {
    pub representatives: BTreeSet<RepresentativeId>,
    pub lists: BTreeSet<ListKey>,
    pub scores: BTreeSet<ScoreKey>,
    pub negotiation: BTreeSet<NegotiationState>,
}

impl ColumnFilters {
    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
            && self.lists.is_empty()
            && self.scores.is_empty()
            && self.negotiation.is_empty()
    }

    pub fn column_is_empty(&self, column: FilterColumn) -> bool {
        match column {
            FilterColumn::Representative => self.representatives.is_empty(),
            FilterColumn::List => self.lists.is_empty(),
            FilterColumn::ProspectScore => self.scores.is_empty(),
            FilterColumn::Negotiation => self.negotiation.is_empty(),
        }
    }

    pub fn contains(&self, value: FilterValue) -> bool {
        match value {
            FilterValue::Representative(id) => self.representatives.contains(&id),
            FilterValue::List(key) => self.lists.contains(&key),
            FilterValue::Score(key) => self.scores.contains(&key),
            FilterValue::Negotiation(state) => self.negotiation.contains(&state),
        }
    }

    /// Flips one value; returns whether it is now checked.
    pub fn toggle(&mut self, value: FilterValue) -> bool {
        fn flip<T: Ord>(set: &mut BTreeSet<T>, value: T) -> bool {
            if set.remove(&value) {
                false
            } else {
                set.insert(value);
                true
            }
        }
        match value {
            FilterValue::Representative(id) => flip(&mut self.representatives, id),
            FilterValue::List(key) => flip(&mut self.lists, key),
            FilterValue::Score(key) => flip(&mut self.scores, key),
            FilterValue::Negotiation(state) => flip(&mut self.negotiation, state),
        }
    }

    pub fn clear_column(&mut self, column: FilterColumn) {
        match column {
            FilterColumn::Representative => self.representatives.clear(),
            FilterColumn::List => self.lists.clear(),
            FilterColumn::ProspectScore => self.scores.clear(),
            FilterColumn::Negotiation => self.negotiation.clear(),
        }
    }

    pub fn copy_column_from(&mut self, other: &Self, column: FilterColumn) {
        match column {
            FilterColumn::Representative => {
                self.representatives.clone_from(&other.representatives);
            }
            FilterColumn::List => self.lists.clone_from(&other.lists),
            FilterColumn::ProspectScore => self.scores.clone_from(&other.scores),
            FilterColumn::Negotiation => self.negotiation.clone_from(&other.negotiation),
        }
    }

    /// Checked values of one column in their raw encoded form.
    pub fn encoded_column(&self, column: FilterColumn) -> Vec<String> {
        match column {
            FilterColumn::Representative => self
                .representatives
                .iter()
                .map(|id| FilterValue::Representative(*id).encode())
                .collect(),
            FilterColumn::List => self
                .lists
                .iter()
                .map(|key| FilterValue::List(*key).encode())
                .collect(),
            FilterColumn::ProspectScore => self
                .scores
                .iter()
                .map(|key| FilterValue::Score(*key).encode())
                .collect(),
            FilterColumn::Negotiation => self
                .negotiation
                .iter()
                .map(|state| FilterValue::Negotiation(*state).encode())
                .collect(),
        }
    }
}

/// Pending/committed pair behind the per-column filter editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterEditor {
    committed: ColumnFilters,
    pending: ColumnFilters,
    open: Option<FilterColumn>,
}

impl FilterEditor {
    pub fn committed(&self) -> &ColumnFilters {
        &self.committed
    }

    pub fn pending(&self) -> &ColumnFilters {
        &self.pending
    }

    pub fn open_column(&self) -> Option<FilterColumn> {
        self.open
    }

    pub fn open(&mut self, column: FilterColumn) {
        self.pending.copy_column_from(&self.committed, column);
        self.open = Some(column);
    }

    /// Only affects the pending set; a value from another column than the
    /// open one is ignored.
    pub fn toggle(&mut self, value: FilterValue) -> bool {
        if self.open != Some(value.column()) {
            return false;
        }
        self.pending.toggle(value);
        true
    }

    pub fn confirm(&mut self) {
        if let Some(column) = self.open.take() {
            self.committed.copy_column_from(&self.pending, column);
        }
    }

    pub fn cancel(&mut self) {
        if let Some(column) = self.open.take() {
            self.pending.copy_column_from(&self.committed, column);
        }
    }

    pub fn clear_column(&mut self, column: FilterColumn) {
        self.pending.clear_column(column);
        self.committed.clear_column(column);
    }

    pub fn clear_all(&mut self) {
        self.pending = ColumnFilters::default();
        self.committed = ColumnFilters::default();
    }

    /// Drops a value whose record no longer exists.
    pub fn forget(&mut self, value: FilterValue) {
        if self.pending.contains(value) {
            self.pending.toggle(value);
        }
        if self.committed.contains(value) {
            self.committed.toggle(value);
        }
    }
}

/// Inputs of one visible-list evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FilterQuery<'a> {
    pub search: &'a str,
    pub tab: ActiveTab,
    pub filters: &'a ColumnFilters,
}

pub fn matches_tab(company: &Company, tab: ActiveTab, state: NegotiationState) -> bool {
    match tab {
        ActiveTab::List(ListTab::All) => true,
        ActiveTab::List(ListTab::Unassigned) => company.list_id.is_none(),
        ActiveTab::List(ListTab::Met) => state == NegotiationState::Met,
        ActiveTab::List(ListTab::NotMet) => state == NegotiationState::NotMet,
        ActiveTab::List(ListTab::List(id)) => company.list_id == Some(id),
        ActiveTab::Representative(RepresentativeTab::All) => true,
        ActiveTab::Representative(RepresentativeTab::Representative(id)) => {
            company.representative_id == id
        }
    }
}

pub fn matches_search(company: &Company, search: &str) -> bool {
    if search.is_empty() {
        return true;
    }
    let needle = search.to_lowercase();
    [
        &company.name,
        &company.contact_person,
        &company.department,
        &company.position,
        &company.email,
    ]
    .into_iter()
    .any(|field| field.to_lowercase().contains(&needle))
        || company.phone_number.contains(search)
}

pub fn matches_columns(
    company: &Company,
    tab: ActiveTab,
    filters: &ColumnFilters,
    state: NegotiationState,
) -> bool {
    let representative_ok = matches!(tab, ActiveTab::Representative(_))
        || filters.representatives.is_empty()
        || filters.representatives.contains(&company.representative_id);
    let list_ok =
        filters.lists.is_empty() || filters.lists.contains(&ListKey::of(company.list_id));
    let score_ok = filters.scores.is_empty()
        || filters
            .scores
            .contains(&ScoreKey::of(company.prospect_score));
    let negotiation_ok = filters.negotiation.is_empty() || filters.negotiation.contains(&state);
    representative_ok && list_ok && score_ok && negotiation_ok
}

fn state_of(met: &BTreeSet<CompanyId>, id: CompanyId) -> NegotiationState {
    if met.contains(&id) {
        NegotiationState::Met
    } else {
        NegotiationState::NotMet
    }
}

/// Companies passing every predicate, in store order.
pub fn visible_companies<'s>(store: &'s RecordStore, query: FilterQuery<'_>) -> Vec<&'s Company> {
    let met = store.met_companies();
    store
        .companies()
        .iter()
        .filter(|company| {
            let state = state_of(&met, company.id);
            matches_tab(company, query.tab, state)
                && matches_search(company, query.search)
                && matches_columns(company, query.tab, query.filters, state)
        })
        .collect()
}

pub fn visible_ids(store: &RecordStore, query: FilterQuery<'_>) -> Vec<CompanyId> {
    visible_companies(store, query)
        .into_iter()
        .map(|company| company.id)
        .collect()
}

/// Companies passing the tab predicate alone.
pub fn tab_ids(store: &RecordStore, tab: ActiveTab) -> Vec<CompanyId> {
    let met = store.met_companies();
    store
        .companies()
        .iter()
        .filter(|company| matches_tab(company, tab, state_of(&met, company.id)))
        .map(|company| company.id)
        .collect()
}

/// A checkbox row for the filter editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub value: FilterValue,
    pub label: String,
    pub count: usize,
}

/// Every value a column can take, with how many companies carry it.
pub fn filter_options(store: &RecordStore, column: FilterColumn) -> Vec<FilterOption> {
    let companies = store.companies();
    match column {
        FilterColumn::Representative => store
            .representatives()
            .iter()
            .map(|rep| FilterOption {
                value: FilterValue::Representative(rep.id),
                label: rep.name.clone(),
                count: store.representative_assignment_count(rep.id),
            })
            .collect(),
        FilterColumn::List => {
            let mut options = vec![FilterOption {
                value: FilterValue::List(ListKey::Unassigned),
                label: UNSET_LABEL.to_owned(),
                count: companies.iter().filter(|c| c.list_id.is_none()).count(),
            }];
            options.extend(store.lists().iter().map(|list| FilterOption {
                value: FilterValue::List(ListKey::List(list.id)),
                label: list.name.clone(),
                count: store.list_member_count(list.id),
            }));
            options
        }
        FilterColumn::ProspectScore => {
            let mut options: Vec<FilterOption> = ProspectScore::ALL
                .into_iter()
                .map(|score| FilterOption {
                    value: FilterValue::Score(ScoreKey::Score(score)),
                    label: score.as_str().to_owned(),
                    count: companies
                        .iter()
                        .filter(|c| c.prospect_score == Some(score))
                        .count(),
                })
                .collect();
            options.push(FilterOption {
                value: FilterValue::Score(ScoreKey::Unset),
                label: UNSET_LABEL.to_owned(),
                count: companies
                    .iter()
                    .filter(|c| c.prospect_score.is_none())
                    .count(),
            });
            options
        }
        FilterColumn::Negotiation => {
            let met = store.met_companies();
            NegotiationState::ALL
                .into_iter()
                .map(|state| FilterOption {
                    value: FilterValue::Negotiation(state),
                    label: state.label().to_owned(),
                    count: companies
                        .iter()
                        .filter(|c| state_of(&met, c.id) == state)
                        .count(),
                })
                .collect()
        }
    }
}
