// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Date;

use crate::{
    ActivityKind, Company, CompanyId, CrmError, CrmResult, ListId, NegotiationOutcome, ProspectScore,
    RepresentativeId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInput {
    pub name: String,
    pub contact_person: String,
    pub department: String,
    pub position: String,
    pub email: String,
    pub phone_number: String,
    pub representative_id: RepresentativeId,
    pub list_id: Option<ListId>,
    pub prospect_score: Option<ProspectScore>,
    pub memo: Option<String>,
}

impl CompanyInput {
    pub fn validate(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation("company name is required"));
        }
        if self.representative_id.get() <= 0 {
            return Err(CrmError::validation(
                "representative is required -- pick an existing representative",
            ));
        }
        Ok(())
    }
}

/// Partial company update. `None` leaves the stored value untouched; the
/// nested options on `list_id`, `prospect_score` and `memo` distinguish
/// "clear" from "keep".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub representative_id: Option<RepresentativeId>,
    pub list_id: Option<Option<ListId>>,
    pub prospect_score: Option<Option<ProspectScore>>,
    pub memo: Option<Option<String>>,
}

impl CompanyPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn from_input(input: &CompanyInput) -> Self {
        Self {
            name: Some(input.name.clone()),
            contact_person: Some(input.contact_person.clone()),
            department: Some(input.department.clone()),
            position: Some(input.position.clone()),
            email: Some(input.email.clone()),
            phone_number: Some(input.phone_number.clone()),
            representative_id: Some(input.representative_id),
            list_id: Some(input.list_id),
            prospect_score: Some(input.prospect_score),
            memo: Some(input.memo.clone()),
        }
    }

    /// Writes the set fields onto `company`. Timestamps are left to the caller.
    pub fn apply_to(&self, company: &mut Company) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
        set(&mut company.name, &self.name);
        set(&mut company.contact_person, &self.contact_person);
        set(&mut company.department, &self.department);
        set(&mut company.position, &self.position);
        set(&mut company.email, &self.email);
        set(&mut company.phone_number, &self.phone_number);
        set(&mut company.representative_id, &self.representative_id);
        set(&mut company.list_id, &self.list_id);
        set(&mut company.prospect_score, &self.prospect_score);
        set(&mut company.memo, &self.memo);
    }

    pub fn validate(&self) -> CrmResult<()> {
        if self.is_empty() {
            return Err(CrmError::validation("nothing to update"));
        }
        if self
            .name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(CrmError::validation("company name is required"));
        }
        Ok(())
    }
}

/// List directive of a bulk reassignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListChange {
    #[default]
    NoChange,
    Unassign,
    SetTo(ListId),
}

impl ListChange {
    pub const fn as_patch(self) -> Option<Option<ListId>> {
        match self {
            Self::NoChange => None,
            Self::Unassign => Some(None),
            Self::SetTo(list_id) => Some(Some(list_id)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReassignRequest {
    pub representative_id: Option<RepresentativeId>,
    pub list_change: ListChange,
}

impl BulkReassignRequest {
    pub const fn representative(representative_id: RepresentativeId) -> Self {
        Self {
            representative_id: Some(representative_id),
            list_change: ListChange::NoChange,
        }
    }

    pub const fn list(list_change: ListChange) -> Self {
        Self {
            representative_id: None,
            list_change,
        }
    }

    pub fn validate(&self) -> CrmResult<()> {
        if self.representative_id.is_none() && self.list_change == ListChange::NoChange {
            return Err(CrmError::validation(
                "choose a representative or a list change before applying",
            ));
        }
        Ok(())
    }

    pub fn to_patch(&self) -> CompanyPatch {
        CompanyPatch {
            representative_id: self.representative_id,
            list_id: self.list_change.as_patch(),
            ..CompanyPatch::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInput {
    pub company_id: CompanyId,
    pub date: Date,
    pub kind: ActivityKind,
    pub title: String,
    pub content: String,
    pub amount_yen: Option<i64>,
    pub probability: Option<u8>,
    pub outcome: Option<NegotiationOutcome>,
    pub next_action: Option<String>,
    pub next_action_date: Option<Date>,
    pub appointment_secured: Option<bool>,
}

impl ActivityInput {
    pub fn validate(&self) -> CrmResult<()> {
        if self.content.trim().is_empty() {
            return Err(CrmError::validation("activity content is required"));
        }
        if self.probability.is_some_and(|value| value > 100) {
            return Err(CrmError::validation(
                "probability must be between 0 and 100",
            ));
        }
        if self.amount_yen.is_some_and(|value| value < 0) {
            return Err(CrmError::validation("amount must not be negative"));
        }
        Ok(())
    }

    /// Drops negotiation-only fields from non-negotiation activities, fills
    /// the default outcome and a title derived from the kind.
    pub fn normalized(mut self) -> Self {
        if self.kind == ActivityKind::Negotiation {
            self.outcome.get_or_insert(NegotiationOutcome::Consideration);
        } else {
            self.amount_yen = None;
            self.probability = None;
            self.outcome = None;
        }
        if self.title.trim().is_empty() {
            self.title = format!("{}記録", self.kind.label());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepresentativeInput {
    pub name: String,
    pub email: String,
}

impl RepresentativeInput {
    pub fn validate(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation("representative name is required"));
        }
        if self.email.trim().is_empty() {
            return Err(CrmError::validation("representative email is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListInput {
    pub name: String,
    pub description: Option<String>,
}

impl ListInput {
    pub fn validate(&self) -> CrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(CrmError::validation("list name is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ActivityInput, BulkReassignRequest, CompanyInput, CompanyPatch, ListChange,
        RepresentativeInput,
    };
    use crate::{ActivityKind, CompanyId, ListId, NegotiationOutcome, RepresentativeId};
    use time::{Date, Month};

    fn company_input(name: &str) -> CompanyInput {
        CompanyInput {
            name: name.to_owned(),
            contact_person: String::new(),
            department: String::new(),
            position: String::new(),
            email: String::new(),
            phone_number: String::new(),
            representative_id: RepresentativeId::new(1),
            list_id: None,
            prospect_score: None,
            memo: None,
        }
    }

    fn activity(kind: ActivityKind) -> ActivityInput {
        ActivityInput {
            company_id: CompanyId::new(1),
            date: Date::from_calendar_date(2026, Month::March, 2).expect("valid date"),
            kind,
            title: String::new(),
            content: "初回ヒアリング".to_owned(),
            amount_yen: Some(500_000),
            probability: Some(40),
            outcome: None,
            next_action: None,
            next_action_date: None,
            appointment_secured: None,
        }
    }

    #[test]
    fn company_validation_requires_name() {
        assert!(company_input("  ").validate().is_err());
        assert!(company_input("株式会社サンプル").validate().is_ok());
    }

    #[test]
    fn company_validation_requires_representative() {
        let mut input = company_input("Acme");
        input.representative_id = RepresentativeId::new(0);
        let error = input.validate().expect_err("missing representative");
        assert!(error.is_validation());
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert!(CompanyPatch::default().validate().is_err());
        let patch = CompanyPatch {
            name: Some(String::new()),
            ..CompanyPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut company = crate::Company {
            id: CompanyId::new(1),
            name: "旧社名".to_owned(),
            contact_person: "田中".to_owned(),
            department: String::new(),
            position: String::new(),
            email: String::new(),
            phone_number: String::new(),
            representative_id: RepresentativeId::new(1),
            list_id: Some(ListId::new(2)),
            prospect_score: None,
            memo: Some("memo".to_owned()),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            updated_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let patch = CompanyPatch {
            name: Some("新社名".to_owned()),
            list_id: Some(None),
            memo: Some(None),
            ..CompanyPatch::default()
        };
        patch.apply_to(&mut company);
        assert_eq!(company.name, "新社名");
        assert_eq!(company.contact_person, "田中");
        assert_eq!(company.list_id, None);
        assert_eq!(company.memo, None);
        assert_eq!(company.representative_id, RepresentativeId::new(1));
    }

    #[test]
    fn bulk_request_requires_some_change() {
        assert!(BulkReassignRequest::default().validate().is_err());
        assert!(
            BulkReassignRequest::list(ListChange::Unassign)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn bulk_request_patch_keeps_list_when_unchanged() {
        let patch = BulkReassignRequest::representative(RepresentativeId::new(2)).to_patch();
        assert_eq!(patch.representative_id, Some(RepresentativeId::new(2)));
        assert_eq!(patch.list_id, None);

        let patch = BulkReassignRequest::list(ListChange::SetTo(ListId::new(4))).to_patch();
        assert_eq!(patch.representative_id, None);
        assert_eq!(patch.list_id, Some(Some(ListId::new(4))));

        let patch = BulkReassignRequest::list(ListChange::Unassign).to_patch();
        assert_eq!(patch.list_id, Some(None));
    }

    #[test]
    fn negotiation_activity_defaults_outcome() {
        let normalized = activity(ActivityKind::Negotiation).normalized();
        assert_eq!(normalized.outcome, Some(NegotiationOutcome::Consideration));
        assert_eq!(normalized.amount_yen, Some(500_000));
        assert_eq!(normalized.title, "商談記録");
    }

    #[test]
    fn non_negotiation_activity_drops_deal_fields() {
        let normalized = activity(ActivityKind::Phone).normalized();
        assert_eq!(normalized.amount_yen, None);
        assert_eq!(normalized.probability, None);
        assert_eq!(normalized.outcome, None);
        assert_eq!(normalized.title, "電話記録");
    }

    #[test]
    fn activity_validation_bounds_probability() {
        let mut input = activity(ActivityKind::Negotiation);
        input.probability = Some(101);
        assert!(input.validate().is_err());
    }

    #[test]
    fn representative_requires_name_and_email() {
        let input = RepresentativeInput {
            name: "営業太郎".to_owned(),
            email: String::new(),
        };
        assert!(input.validate().is_err());
    }
}
