// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::{
    Activity, ActivityId, ActivityInput, Company, CompanyId, CompanyInput, CompanyList,
    CompanyPatch, ListId, ListInput, Representative, RepresentativeId, RepresentativeInput,
};

/// Backing store for the four record collections.
///
/// Every write returns the canonical stored record, including the
/// backend-assigned id and timestamps. Implementations enforce the
/// referential rules themselves: deleting a company removes its activities,
/// deleting a list unassigns its companies, and deleting a representative
/// that companies still reference fails.
pub trait Persistence {
    fn list_companies(&mut self) -> Result<Vec<Company>>;
    fn add_company(&mut self, input: &CompanyInput) -> Result<Company>;
    fn update_company(&mut self, id: CompanyId, patch: &CompanyPatch) -> Result<Company>;
    fn delete_company(&mut self, id: CompanyId) -> Result<()>;

    fn list_activities(&mut self) -> Result<Vec<Activity>>;
    fn add_activity(&mut self, input: &ActivityInput) -> Result<Activity>;
    fn update_activity(&mut self, id: ActivityId, input: &ActivityInput) -> Result<Activity>;
    fn delete_activity(&mut self, id: ActivityId) -> Result<()>;

    fn list_representatives(&mut self) -> Result<Vec<Representative>>;
    fn add_representative(&mut self, input: &RepresentativeInput) -> Result<Representative>;
    fn update_representative(
        &mut self,
        id: RepresentativeId,
        input: &RepresentativeInput,
    ) -> Result<Representative>;
    fn delete_representative(&mut self, id: RepresentativeId) -> Result<()>;

    fn list_lists(&mut self) -> Result<Vec<CompanyList>>;
    fn add_list(&mut self, input: &ListInput) -> Result<CompanyList>;
    fn update_list(&mut self, id: ListId, input: &ListInput) -> Result<CompanyList>;
    fn delete_list(&mut self, id: ListId) -> Result<()>;
}

/// Full snapshot of every collection, in backend order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub companies: Vec<Company>,
    pub activities: Vec<Activity>,
    pub representatives: Vec<Representative>,
    pub lists: Vec<CompanyList>,
}

pub fn load_snapshot<P: Persistence + ?Sized>(persistence: &mut P) -> Result<Snapshot> {
    Ok(Snapshot {
        companies: persistence.list_companies()?,
        activities: persistence.list_activities()?,
        representatives: persistence.list_representatives()?,
        lists: persistence.list_lists()?,
    })
}
