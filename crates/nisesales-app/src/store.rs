// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{
    Activity, ActivityId, ActivityKind, Company, CompanyId, CompanyList, CrmError, CrmResult,
    ListId, NegotiationState, Representative, RepresentativeId, Snapshot,
};

/// In-memory owner of every record collection.
///
/// Engines hold ids and derived views only; all mutation goes through the
/// methods below so a redraw never sees a half-applied change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    companies: Vec<Company>,
    activities: Vec<Activity>,
    representatives: Vec<Representative>,
    lists: Vec<CompanyList>,
}

impl RecordStore {
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            companies: snapshot.companies,
            activities: snapshot.activities,
            representatives: snapshot.representatives,
            lists: snapshot.lists,
        }
    }

    pub fn replace_all(&mut self, snapshot: Snapshot) {
        *self = Self::from_snapshot(snapshot);
    }

    pub fn companies(&self) -> &[Company] {
        &self.companies
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn representatives(&self) -> &[Representative] {
        &self.representatives
    }

    pub fn lists(&self) -> &[CompanyList] {
        &self.lists
    }

    pub fn company(&self, id: CompanyId) -> Option<&Company> {
        self.companies.iter().find(|company| company.id == id)
    }

    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    pub fn representative(&self, id: RepresentativeId) -> Option<&Representative> {
        self.representatives.iter().find(|rep| rep.id == id)
    }

    pub fn representative_by_name(&self, name: &str) -> Option<&Representative> {
        self.representatives.iter().find(|rep| rep.name == name)
    }

    pub fn list(&self, id: ListId) -> Option<&CompanyList> {
        self.lists.iter().find(|list| list.id == id)
    }

    pub fn representative_name(&self, id: RepresentativeId) -> &str {
        self.representative(id)
            .map_or(crate::UNSET_LABEL, |rep| rep.name.as_str())
    }

    pub fn list_name(&self, id: Option<ListId>) -> &str {
        id.and_then(|id| self.list(id))
            .map_or("", |list| list.name.as_str())
    }

    /// Activities for one company, newest first.
    pub fn activities_for(&self, company_id: CompanyId) -> Vec<&Activity> {
        let mut rows: Vec<&Activity> = self
            .activities
            .iter()
            .filter(|activity| activity.company_id == company_id)
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        rows
    }

    /// Companies with at least one negotiation activity.
    pub fn met_companies(&self) -> BTreeSet<CompanyId> {
        self.activities
            .iter()
            .filter(|activity| activity.kind == ActivityKind::Negotiation)
            .map(|activity| activity.company_id)
            .collect()
    }

    pub fn negotiation_state(&self, company_id: CompanyId) -> NegotiationState {
        let met = self.activities.iter().any(|activity| {
            activity.company_id == company_id && activity.kind == ActivityKind::Negotiation
        });
        if met {
            NegotiationState::Met
        } else {
            NegotiationState::NotMet
        }
    }

    pub fn representative_assignment_count(&self, id: RepresentativeId) -> usize {
        self.companies
            .iter()
            .filter(|company| company.representative_id == id)
            .count()
    }

    pub fn list_member_count(&self, id: ListId) -> usize {
        self.companies
            .iter()
            .filter(|company| company.list_id == Some(id))
            .count()
    }

    pub fn insert_company(&mut self, company: Company) {
        if let Some(slot) = self.companies.iter_mut().find(|row| row.id == company.id) {
            *slot = company;
        } else {
            self.companies.insert(0, company);
        }
    }

    /// Swaps in the canonical record for an existing company. Returns false
    /// when the id is unknown.
    pub fn replace_company(&mut self, company: Company) -> bool {
        match self.companies.iter_mut().find(|row| row.id == company.id) {
            Some(slot) => {
                *slot = company;
                true
            }
            None => false,
        }
    }

    /// Removes a company and every activity logged against it.
    pub fn remove_company(&mut self, id: CompanyId) -> Option<Company> {
        let index = self.companies.iter().position(|company| company.id == id)?;
        self.activities.retain(|activity| activity.company_id != id);
        Some(self.companies.remove(index))
    }

    pub fn insert_activity(&mut self, activity: Activity) {
        if let Some(slot) = self.activities.iter_mut().find(|row| row.id == activity.id) {
            *slot = activity;
        } else {
            self.activities.insert(0, activity);
        }
    }

    pub fn remove_activity(&mut self, id: ActivityId) -> Option<Activity> {
        let index = self.activities.iter().position(|activity| activity.id == id)?;
        Some(self.activities.remove(index))
    }

    pub fn insert_representative(&mut self, representative: Representative) {
        if let Some(slot) = self
            .representatives
            .iter_mut()
            .find(|row| row.id == representative.id)
        {
            *slot = representative;
        } else {
            self.representatives.push(representative);
            self.representatives.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    pub fn ensure_representative_deletable(&self, id: RepresentativeId) -> CrmResult<()> {
        let assigned = self.representative_assignment_count(id);
        if assigned > 0 {
            return Err(CrmError::integrity(format!(
                "representative {} is assigned to {assigned} compan{} -- reassign them first",
                self.representative_name(id),
                if assigned == 1 { "y" } else { "ies" }
            )));
        }
        Ok(())
    }

    pub fn remove_representative(&mut self, id: RepresentativeId) -> CrmResult<Representative> {
        self.ensure_representative_deletable(id)?;
        let index = self
            .representatives
            .iter()
            .position(|rep| rep.id == id)
            .ok_or_else(|| CrmError::validation(format!("representative {id} not found")))?;
        Ok(self.representatives.remove(index))
    }

    pub fn insert_list(&mut self, list: CompanyList) {
        if let Some(slot) = self.lists.iter_mut().find(|row| row.id == list.id) {
            *slot = list;
        } else {
            self.lists.push(list);
            self.lists.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    /// Removes a list and clears the assignment of every member company.
    /// Returns the ids of the companies that were unassigned.
    pub fn remove_list(&mut self, id: ListId) -> Vec<CompanyId> {
        self.lists.retain(|list| list.id != id);
        let mut unassigned = Vec::new();
        for company in &mut self.companies {
            if company.list_id == Some(id) {
                company.list_id = None;
                unassigned.push(company.id);
            }
        }
        unassigned
    }
}

#[cfg(test)]
mod tests {
    use super::RecordStore;
    use crate::{
        Activity, ActivityId, ActivityKind, Company, CompanyId, CompanyList, ListId,
        NegotiationState, Representative, RepresentativeId, Snapshot,
    };
    use time::{Date, Month, OffsetDateTime};

    fn company(id: i64, rep: i64, list: Option<i64>) -> Company {
        Company {
            id: CompanyId::new(id),
            name: format!("company {id}"),
            contact_person: String::new(),
            department: String::new(),
            position: String::new(),
            email: String::new(),
            phone_number: String::new(),
            representative_id: RepresentativeId::new(rep),
            list_id: list.map(ListId::new),
            prospect_score: None,
            memo: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn activity(id: i64, company_id: i64, kind: ActivityKind) -> Activity {
        Activity {
            id: ActivityId::new(id),
            company_id: CompanyId::new(company_id),
            date: Date::from_calendar_date(2026, Month::January, 10).expect("valid date"),
            kind,
            title: String::new(),
            content: "call".to_owned(),
            amount_yen: None,
            probability: None,
            outcome: None,
            next_action: None,
            next_action_date: None,
            appointment_secured: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn store() -> RecordStore {
        RecordStore::from_snapshot(Snapshot {
            companies: vec![company(1, 1, Some(7)), company(2, 2, None)],
            activities: vec![
                activity(10, 1, ActivityKind::Negotiation),
                activity(11, 1, ActivityKind::Phone),
                activity(12, 2, ActivityKind::Email),
            ],
            representatives: vec![
                Representative {
                    id: RepresentativeId::new(1),
                    name: "営業太郎".to_owned(),
                    email: "taro@company.co.jp".to_owned(),
                    created_at: OffsetDateTime::UNIX_EPOCH,
                    updated_at: OffsetDateTime::UNIX_EPOCH,
                },
                Representative {
                    id: RepresentativeId::new(3),
                    name: "営業次郎".to_owned(),
                    email: "jiro@company.co.jp".to_owned(),
                    created_at: OffsetDateTime::UNIX_EPOCH,
                    updated_at: OffsetDateTime::UNIX_EPOCH,
                },
            ],
            lists: vec![CompanyList {
                id: ListId::new(7),
                name: "展示会".to_owned(),
                description: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
                updated_at: OffsetDateTime::UNIX_EPOCH,
            }],
        })
    }

    #[test]
    fn negotiation_state_is_derived_from_activities() {
        let store = store();
        assert_eq!(
            store.negotiation_state(CompanyId::new(1)),
            NegotiationState::Met
        );
        assert_eq!(
            store.negotiation_state(CompanyId::new(2)),
            NegotiationState::NotMet
        );
        assert_eq!(
            store.met_companies().into_iter().collect::<Vec<_>>(),
            vec![CompanyId::new(1)]
        );
    }

    #[test]
    fn removing_company_cascades_activities() {
        let mut store = store();
        let removed = store.remove_company(CompanyId::new(1));
        assert!(removed.is_some());
        assert!(
            store
                .activities()
                .iter()
                .all(|activity| activity.company_id != CompanyId::new(1))
        );
        assert_eq!(store.activities().len(), 1);
    }

    #[test]
    fn removing_list_unassigns_members() {
        let mut store = store();
        let unassigned = store.remove_list(ListId::new(7));
        assert_eq!(unassigned, vec![CompanyId::new(1)]);
        assert!(store.lists().is_empty());
        assert_eq!(
            store.company(CompanyId::new(1)).and_then(|c| c.list_id),
            None
        );
    }

    #[test]
    fn assigned_representative_cannot_be_removed() {
        let mut store = store();
        let error = store
            .remove_representative(RepresentativeId::new(1))
            .expect_err("assigned representative must be kept");
        assert!(error.is_integrity());
        assert!(error.to_string().contains("営業太郎"));

        let removed = store.remove_representative(RepresentativeId::new(3));
        assert!(removed.is_ok());
        assert_eq!(store.representatives().len(), 1);
    }

    #[test]
    fn activities_for_company_are_newest_first() {
        let store = store();
        let ids: Vec<_> = store
            .activities_for(CompanyId::new(1))
            .into_iter()
            .map(|activity| activity.id.get())
            .collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn replace_company_ignores_unknown_ids() {
        let mut store = store();
        assert!(!store.replace_company(company(99, 1, None)));
        assert!(store.replace_company(company(2, 3, None)));
        assert_eq!(
            store.company(CompanyId::new(2)).map(|c| c.representative_id),
            Some(RepresentativeId::new(3))
        );
    }
}
