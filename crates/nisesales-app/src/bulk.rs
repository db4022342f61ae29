// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{info, warn};

use crate::{BulkReassignRequest, Company, CompanyId, CrmError, CrmResult, Persistence, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: CompanyId,
    pub message: String,
}

/// Per-record result of a best-effort batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub applied: Vec<CompanyId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<CompanyId> {
        self.failed.iter().map(|failure| failure.id).collect()
    }

    pub fn summary(&self, verb: &str) -> String {
        match (self.applied.len(), self.failed.len()) {
            (applied, 0) => format!("{verb} {applied} compan{}", plural(applied)),
            (applied, failed) => format!(
                "{verb} {applied} compan{}, {failed} failed: {}",
                plural(applied),
                self.failed
                    .first()
                    .map_or("", |failure| failure.message.as_str())
            ),
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "y" } else { "ies" }
}

/// Applies one reassignment to one company and swaps the stored record in.
pub fn reassign_one<P: Persistence + ?Sized>(
    persistence: &mut P,
    store: &mut RecordStore,
    id: CompanyId,
    request: &BulkReassignRequest,
) -> CrmResult<Company> {
    request.validate()?;
    let company = persistence.update_company(id, &request.to_patch())?;
    store.replace_company(company.clone());
    Ok(company)
}

/// Reassigns every id independently. A failure is logged and recorded; the
/// remaining ids are still attempted and nothing is rolled back.
pub fn apply_bulk_reassign<P: Persistence + ?Sized>(
    persistence: &mut P,
    store: &mut RecordStore,
    ids: &[CompanyId],
    request: &BulkReassignRequest,
) -> CrmResult<BulkOutcome> {
    request.validate()?;
    if ids.is_empty() {
        return Err(CrmError::validation("select at least one company first"));
    }
    let patch = request.to_patch();
    let mut outcome = BulkOutcome::default();
    for &id in ids {
        match persistence.update_company(id, &patch) {
            Ok(company) => {
                store.replace_company(company);
                outcome.applied.push(id);
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(company_id = %id, error = %message, "bulk reassignment failed");
                outcome.failed.push(BulkFailure { id, message });
            }
        }
    }
    info!(
        applied = outcome.applied.len(),
        failed = outcome.failed.len(),
        "bulk reassignment finished"
    );
    Ok(outcome)
}

/// Names every company about to be deleted so the user can confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionConfirmation {
    ids: Vec<CompanyId>,
    names: Vec<String>,
}

impl DeletionConfirmation {
    pub fn prepare(store: &RecordStore, ids: &[CompanyId]) -> CrmResult<Self> {
        let (ids, names): (Vec<_>, Vec<_>) = ids
            .iter()
            .filter_map(|id| store.company(*id))
            .map(|company| (company.id, company.name.clone()))
            .unzip();
        if ids.is_empty() {
            return Err(CrmError::validation("select at least one company first"));
        }
        Ok(Self { ids, names })
    }

    pub fn ids(&self) -> &[CompanyId] {
        &self.ids
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn prompt(&self) -> String {
        format!(
            "delete {} compan{} and their activities? {}",
            self.ids.len(),
            plural(self.ids.len()),
            self.names.join(", ")
        )
    }
}

/// Deletes each confirmed company. Activities go with it.
pub fn delete_companies<P: Persistence + ?Sized>(
    persistence: &mut P,
    store: &mut RecordStore,
    confirmation: &DeletionConfirmation,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    for &id in confirmation.ids() {
        match persistence.delete_company(id) {
            Ok(()) => {
                store.remove_company(id);
                outcome.applied.push(id);
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(company_id = %id, error = %message, "bulk deletion failed");
                outcome.failed.push(BulkFailure { id, message });
            }
        }
    }
    info!(
        deleted = outcome.applied.len(),
        failed = outcome.failed.len(),
        "bulk deletion finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::{DeletionConfirmation, apply_bulk_reassign, delete_companies, reassign_one};
    use crate::{
        Activity, ActivityId, ActivityInput, ActivityKind, BulkReassignRequest, Company,
        CompanyId, CompanyInput, CompanyList, CompanyPatch, ListChange, ListId, ListInput,
        Persistence, RecordStore, Representative, RepresentativeId, RepresentativeInput, Snapshot,
        load_snapshot,
    };
    use anyhow::{Result, anyhow, bail};
    use time::{Date, Month, OffsetDateTime};
    use tracing_test::traced_test;

    /// Company table that can be told to reject writes for some ids.
    #[derive(Default)]
    struct FlakyCompanies {
        companies: Vec<Company>,
        activities: Vec<Activity>,
        reject: Vec<CompanyId>,
        calls: Vec<CompanyId>,
    }

    fn unsupported<T>() -> Result<T> {
        bail!("not supported by this fake")
    }

    impl Persistence for FlakyCompanies {
        fn list_companies(&mut self) -> Result<Vec<Company>> {
            Ok(self.companies.clone())
        }

        fn add_company(&mut self, _input: &CompanyInput) -> Result<Company> {
            unsupported()
        }

        fn update_company(&mut self, id: CompanyId, patch: &CompanyPatch) -> Result<Company> {
            self.calls.push(id);
            if self.reject.contains(&id) {
                bail!("connection reset while updating company {id}");
            }
            let company = self
                .companies
                .iter_mut()
                .find(|company| company.id == id)
                .ok_or_else(|| anyhow!("company {id} not found"))?;
            if let Some(rep) = patch.representative_id {
                company.representative_id = rep;
            }
            if let Some(list_id) = patch.list_id {
                company.list_id = list_id;
            }
            company.updated_at = OffsetDateTime::UNIX_EPOCH + time::Duration::hours(1);
            Ok(company.clone())
        }

        fn delete_company(&mut self, id: CompanyId) -> Result<()> {
            self.calls.push(id);
            if self.reject.contains(&id) {
                bail!("timeout deleting company {id}");
            }
            self.companies.retain(|company| company.id != id);
            self.activities.retain(|activity| activity.company_id != id);
            Ok(())
        }

        fn list_activities(&mut self) -> Result<Vec<Activity>> {
            Ok(self.activities.clone())
        }

        fn add_activity(&mut self, _input: &ActivityInput) -> Result<Activity> {
            unsupported()
        }

        fn update_activity(&mut self, _id: ActivityId, _input: &ActivityInput) -> Result<Activity> {
            unsupported()
        }

        fn delete_activity(&mut self, _id: ActivityId) -> Result<()> {
            unsupported()
        }

        fn list_representatives(&mut self) -> Result<Vec<Representative>> {
            Ok(Vec::new())
        }

        fn add_representative(&mut self, _input: &RepresentativeInput) -> Result<Representative> {
            unsupported()
        }

        fn update_representative(
            &mut self,
            _id: RepresentativeId,
            _input: &RepresentativeInput,
        ) -> Result<Representative> {
            unsupported()
        }

        fn delete_representative(&mut self, _id: RepresentativeId) -> Result<()> {
            unsupported()
        }

        fn list_lists(&mut self) -> Result<Vec<CompanyList>> {
            Ok(Vec::new())
        }

        fn add_list(&mut self, _input: &ListInput) -> Result<CompanyList> {
            unsupported()
        }

        fn update_list(&mut self, _id: ListId, _input: &ListInput) -> Result<CompanyList> {
            unsupported()
        }

        fn delete_list(&mut self, _id: ListId) -> Result<()> {
            unsupported()
        }
    }

    fn company(id: i64, rep: i64, list: Option<i64>) -> Company {
        Company {
            id: CompanyId::new(id),
            name: format!("会社{id}"),
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

    fn fixture() -> Result<(FlakyCompanies, RecordStore)> {
        let mut backend = FlakyCompanies {
            companies: vec![
                company(1, 1, Some(1)),
                company(2, 2, None),
                company(3, 1, Some(2)),
            ],
            activities: vec![Activity {
                id: ActivityId::new(1),
                company_id: CompanyId::new(2),
                date: Date::from_calendar_date(2026, Month::April, 1)?,
                kind: ActivityKind::Phone,
                title: "電話記録".to_owned(),
                content: "不在".to_owned(),
                amount_yen: None,
                probability: None,
                outcome: None,
                next_action: None,
                next_action_date: None,
                appointment_secured: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
                updated_at: OffsetDateTime::UNIX_EPOCH,
            }],
            ..FlakyCompanies::default()
        };
        let store = RecordStore::from_snapshot(load_snapshot(&mut backend)?);
        Ok((backend, store))
    }

    #[test]
    fn representative_only_request_leaves_lists_untouched() -> Result<()> {
        let (mut backend, mut store) = fixture()?;
        let ids = [CompanyId::new(1), CompanyId::new(2)];
        let request = BulkReassignRequest::representative(RepresentativeId::new(9));

        let outcome = apply_bulk_reassign(&mut backend, &mut store, &ids, &request)?;

        assert!(outcome.is_complete());
        let first = store.company(CompanyId::new(1)).ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(first.representative_id, RepresentativeId::new(9));
        assert_eq!(first.list_id, Some(ListId::new(1)));
        assert!(first.updated_at > first.created_at);
        let second = store.company(CompanyId::new(2)).ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(second.list_id, None);
        Ok(())
    }

    #[test]
    fn unassign_clears_list_only() -> Result<()> {
        let (mut backend, mut store) = fixture()?;
        let request = BulkReassignRequest::list(ListChange::Unassign);
        apply_bulk_reassign(&mut backend, &mut store, &[CompanyId::new(3)], &request)?;
        let company = store.company(CompanyId::new(3)).ok_or_else(|| anyhow!("missing"))?;
        assert_eq!(company.list_id, None);
        assert_eq!(company.representative_id, RepresentativeId::new(1));
        Ok(())
    }

    #[test]
    fn empty_request_is_rejected_before_any_call() -> Result<()> {
        let (mut backend, mut store) = fixture()?;
        let error = apply_bulk_reassign(
            &mut backend,
            &mut store,
            &[CompanyId::new(1)],
            &BulkReassignRequest::default(),
        )
        .expect_err("no-op request");
        assert!(error.is_validation());
        assert!(backend.calls.is_empty());

        let error = apply_bulk_reassign(
            &mut backend,
            &mut store,
            &[],
            &BulkReassignRequest::list(ListChange::Unassign),
        )
        .expect_err("empty selection");
        assert!(error.is_validation());
        Ok(())
    }

    #[traced_test]
    #[test]
    fn failing_record_is_logged_and_the_rest_still_applied() -> Result<()> {
        let (mut backend, mut store) = fixture()?;
        backend.reject.push(CompanyId::new(2));
        let ids = [CompanyId::new(1), CompanyId::new(2), CompanyId::new(3)];
        let request = BulkReassignRequest::list(ListChange::SetTo(ListId::new(5)));

        let outcome = apply_bulk_reassign(&mut backend, &mut store, &ids, &request)?;

        assert_eq!(backend.calls, ids.to_vec());
        assert_eq!(outcome.applied, vec![CompanyId::new(1), CompanyId::new(3)]);
        assert_eq!(outcome.failed_ids(), vec![CompanyId::new(2)]);
        assert_eq!(
            store.company(CompanyId::new(2)).and_then(|c| c.list_id),
            None
        );
        assert_eq!(
            store.company(CompanyId::new(3)).and_then(|c| c.list_id),
            Some(ListId::new(5))
        );
        assert!(logs_contain("bulk reassignment failed"));
        assert!(outcome.summary("updated").contains("1 failed"));
        Ok(())
    }

    #[test]
    fn single_move_uses_the_same_primitive() -> Result<()> {
        let (mut backend, mut store) = fixture()?;
        let moved = reassign_one(
            &mut backend,
            &mut store,
            CompanyId::new(2),
            &BulkReassignRequest::list(ListChange::SetTo(ListId::new(1))),
        )?;
        assert_eq!(moved.list_id, Some(ListId::new(1)));
        assert_eq!(store.list_member_count(ListId::new(1)), 2);
        Ok(())
    }

    #[test]
    fn confirmation_enumerates_names_of_known_companies() -> Result<()> {
        let (_, store) = fixture()?;
        let confirmation = DeletionConfirmation::prepare(
            &store,
            &[CompanyId::new(1), CompanyId::new(42), CompanyId::new(3)],
        )?;
        assert_eq!(confirmation.names(), ["会社1", "会社3"]);
        assert!(confirmation.prompt().contains("delete 2 companies"));
        assert!(DeletionConfirmation::prepare(&store, &[CompanyId::new(42)]).is_err());
        Ok(())
    }

    #[test]
    fn deletion_cascades_activities_in_store_and_backend() -> Result<()> {
        let (mut backend, mut store) = fixture()?;
        let confirmation = DeletionConfirmation::prepare(&store, &[CompanyId::new(2)])?;
        let outcome = delete_companies(&mut backend, &mut store, &confirmation);
        assert!(outcome.is_complete());
        assert!(store.company(CompanyId::new(2)).is_none());
        assert!(store.activities().is_empty());
        assert!(backend.activities.is_empty());
        Ok(())
    }

    #[test]
    fn snapshot_loads_through_the_trait() -> Result<()> {
        let (mut backend, _) = fixture()?;
        let snapshot = load_snapshot(&mut backend)?;
        assert_eq!(
            snapshot,
            Snapshot {
                companies: backend.companies.clone(),
                activities: backend.activities.clone(),
                ..Snapshot::default()
            }
        );
        Ok(())
    }
}
