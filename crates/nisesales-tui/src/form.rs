// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use nisesales_app::{
    ActiveTab, Activity, ActivityId, ActivityInput, ActivityKind, Company, CompanyId,
    CompanyInput, CompanyPatch, CrmError, CrmResult, ListId, ListInput, ListTab,
    NegotiationOutcome, ProspectScore, RecordStore, RepresentativeId, RepresentativeInput,
    RepresentativeTab, format_iso_date, or_unset, parse_iso_date, parse_optional_iso_date,
    parse_optional_percent, parse_optional_yen,
};
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormKind {
    AddCompany,
    EditCompany(CompanyId),
    AddActivity(CompanyId),
    EditActivity(ActivityId),
    AddRepresentative,
    EditRepresentative(RepresentativeId),
    AddList,
    EditList(ListId),
}

impl FormKind {
    pub(crate) const fn title(self) -> &'static str {
        match self {
            Self::AddCompany => "new company",
            Self::EditCompany(_) => "edit company",
            Self::AddActivity(_) => "new activity",
            Self::EditActivity(_) => "edit activity",
            Self::AddRepresentative => "new representative",
            Self::EditRepresentative(_) => "edit representative",
            Self::AddList => "new list",
            Self::EditList(_) => "edit list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormChoiceKind {
    None,
    Representative,
    /// Choice 0 leaves the company unassigned.
    List,
    ProspectScore,
    ActivityKind,
    Outcome,
    Appointment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormFieldSpec {
    label: &'static str,
    choices: FormChoiceKind,
}

const fn text(label: &'static str) -> FormFieldSpec {
    FormFieldSpec {
        label,
        choices: FormChoiceKind::None,
    }
}

const fn choice(label: &'static str, choices: FormChoiceKind) -> FormFieldSpec {
    FormFieldSpec { label, choices }
}

const COMPANY_FIELDS: [FormFieldSpec; 10] = [
    text("company"),
    text("contact"),
    text("department"),
    text("position"),
    text("email"),
    text("phone"),
    choice("representative", FormChoiceKind::Representative),
    choice("list", FormChoiceKind::List),
    choice("score", FormChoiceKind::ProspectScore),
    text("memo"),
];

const ACTIVITY_FIELDS: [FormFieldSpec; 10] = [
    text("date"),
    choice("type", FormChoiceKind::ActivityKind),
    text("title"),
    text("content"),
    text("amount"),
    text("probability"),
    choice("status", FormChoiceKind::Outcome),
    text("next action"),
    text("next action date"),
    choice("appointment", FormChoiceKind::Appointment),
];

const REPRESENTATIVE_FIELDS: [FormFieldSpec; 2] = [text("name"), text("email")];

const LIST_FIELDS: [FormFieldSpec; 2] = [text("name"), text("description")];

const APPOINTMENT_LABELS: [&str; 3] = ["-", "no", "yes"];

fn form_field_specs(kind: FormKind) -> &'static [FormFieldSpec] {
    match kind {
        FormKind::AddCompany | FormKind::EditCompany(_) => &COMPANY_FIELDS,
        FormKind::AddActivity(_) | FormKind::EditActivity(_) => &ACTIVITY_FIELDS,
        FormKind::AddRepresentative | FormKind::EditRepresentative(_) => &REPRESENTATIVE_FIELDS,
        FormKind::AddList | FormKind::EditList(_) => &LIST_FIELDS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormValue {
    Text(String),
    Choice(usize),
}

/// A validated form, ready for the matching workspace operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FormSubmission {
    AddCompany(CompanyInput),
    EditCompany(CompanyId, CompanyPatch),
    AddActivity(ActivityInput),
    EditActivity(ActivityId, ActivityInput),
    AddRepresentative(RepresentativeInput),
    EditRepresentative(RepresentativeId, RepresentativeInput),
    AddList(ListInput),
    EditList(ListId, ListInput),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FormUiState {
    kind: FormKind,
    field_index: usize,
    values: Vec<FormValue>,
    /// Kind of an older activity that is no longer offered for new ones.
    legacy_kind: Option<ActivityKind>,
}

impl FormUiState {
    /// Builds the form, prefilled from the stored record when editing.
    pub(crate) fn open(kind: FormKind, store: &RecordStore, today: Date) -> CrmResult<Self> {
        let mut form = Self {
            kind,
            field_index: 0,
            values: form_field_specs(kind)
                .iter()
                .map(|spec| match spec.choices {
                    FormChoiceKind::None => FormValue::Text(String::new()),
                    _ => FormValue::Choice(0),
                })
                .collect(),
            legacy_kind: None,
        };
        match kind {
            FormKind::AddCompany => {
                if store.representatives().is_empty() {
                    return Err(CrmError::validation(
                        "add a representative before adding companies",
                    ));
                }
            }
            FormKind::EditCompany(id) => {
                let company = store
                    .company(id)
                    .ok_or_else(|| CrmError::validation(format!("company {id} does not exist")))?;
                form.fill_company(company, store);
            }
            FormKind::AddActivity(company_id) => {
                if store.company(company_id).is_none() {
                    return Err(CrmError::validation(format!(
                        "company {company_id} does not exist"
                    )));
                }
                form.set_text(0, format_iso_date(today));
            }
            FormKind::EditActivity(id) => {
                let activity = store
                    .activity(id)
                    .ok_or_else(|| CrmError::validation(format!("activity {id} does not exist")))?;
                form.fill_activity(activity);
            }
            FormKind::EditRepresentative(id) => {
                let rep = store.representative(id).ok_or_else(|| {
                    CrmError::validation(format!("representative {id} does not exist"))
                })?;
                form.set_text(0, rep.name.clone());
                form.set_text(1, rep.email.clone());
            }
            FormKind::EditList(id) => {
                let list = store
                    .list(id)
                    .ok_or_else(|| CrmError::validation(format!("list {id} does not exist")))?;
                form.set_text(0, list.name.clone());
                form.set_text(1, list.description.clone().unwrap_or_default());
            }
            FormKind::AddRepresentative | FormKind::AddList => {}
        }
        Ok(form)
    }

    pub(crate) const fn kind(&self) -> FormKind {
        self.kind
    }

    /// New companies start on the list or representative of the active tab.
    pub(crate) fn preselect_tab(&mut self, tab: ActiveTab, store: &RecordStore) {
        if self.kind != FormKind::AddCompany {
            return;
        }
        match tab {
            ActiveTab::List(ListTab::List(id)) => {
                if let Some(index) = store.lists().iter().position(|list| list.id == id) {
                    self.set_choice(7, index + 1);
                }
            }
            ActiveTab::Representative(RepresentativeTab::Representative(id)) => {
                if let Some(index) = store.representatives().iter().position(|rep| rep.id == id)
                {
                    self.set_choice(6, index);
                }
            }
            _ => {}
        }
    }

    fn fill_company(&mut self, company: &Company, store: &RecordStore) {
        self.set_text(0, company.name.clone());
        self.set_text(1, company.contact_person.clone());
        self.set_text(2, company.department.clone());
        self.set_text(3, company.position.clone());
        self.set_text(4, company.email.clone());
        self.set_text(5, company.phone_number.clone());
        let rep = store
            .representatives()
            .iter()
            .position(|rep| rep.id == company.representative_id)
            .unwrap_or(0);
        self.set_choice(6, rep);
        let list = company
            .list_id
            .and_then(|id| store.lists().iter().position(|list| list.id == id))
            .map_or(0, |index| index + 1);
        self.set_choice(7, list);
        let score = company
            .prospect_score
            .and_then(|score| ProspectScore::ALL.iter().position(|item| *item == score))
            .map_or(0, |index| index + 1);
        self.set_choice(8, score);
        self.set_text(9, company.memo.clone().unwrap_or_default());
    }

    fn fill_activity(&mut self, activity: &Activity) {
        self.set_text(0, format_iso_date(activity.date));
        let kind = match ActivityKind::CURRENT
            .iter()
            .position(|kind| *kind == activity.kind)
        {
            Some(index) => index,
            None => {
                self.legacy_kind = Some(activity.kind);
                ActivityKind::CURRENT.len()
            }
        };
        self.set_choice(1, kind);
        self.set_text(2, activity.title.clone());
        self.set_text(3, activity.content.clone());
        self.set_text(
            4,
            activity
                .amount_yen
                .map(|amount| amount.to_string())
                .unwrap_or_default(),
        );
        self.set_text(
            5,
            activity
                .probability
                .map(|value| value.to_string())
                .unwrap_or_default(),
        );
        let outcome = activity
            .outcome
            .and_then(|outcome| {
                NegotiationOutcome::ALL
                    .iter()
                    .position(|item| *item == outcome)
            })
            .map_or(0, |index| index + 1);
        self.set_choice(6, outcome);
        self.set_text(7, activity.next_action.clone().unwrap_or_default());
        self.set_text(
            8,
            activity
                .next_action_date
                .map(format_iso_date)
                .unwrap_or_default(),
        );
        let appointment = match activity.appointment_secured {
            None => 0,
            Some(false) => 1,
            Some(true) => 2,
        };
        self.set_choice(9, appointment);
    }

    fn set_text(&mut self, index: usize, value: String) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = FormValue::Text(value);
        }
    }

    fn set_choice(&mut self, index: usize, value: usize) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = FormValue::Choice(value);
        }
    }

    fn spec(&self) -> FormFieldSpec {
        form_field_specs(self.kind)[self.field_index]
    }

    fn text(&self, index: usize) -> &str {
        match self.values.get(index) {
            Some(FormValue::Text(value)) => value.trim(),
            _ => "",
        }
    }

    fn optional_text(&self, index: usize) -> Option<String> {
        let value = self.text(index);
        (!value.is_empty()).then(|| value.to_owned())
    }

    fn choice(&self, index: usize) -> usize {
        match self.values.get(index) {
            Some(FormValue::Choice(value)) => *value,
            _ => 0,
        }
    }

    pub(crate) fn move_field(&mut self, delta: isize) {
        let count = form_field_specs(self.kind).len();
        let next = (self.field_index as isize + delta).rem_euclid(count as isize);
        self.field_index = usize::try_from(next).unwrap_or(0);
    }

    pub(crate) fn is_choice_field(&self) -> bool {
        self.spec().choices != FormChoiceKind::None
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        if let Some(FormValue::Text(value)) = self.values.get_mut(self.field_index) {
            value.push(ch);
        }
    }

    pub(crate) fn pop_char(&mut self) {
        if let Some(FormValue::Text(value)) = self.values.get_mut(self.field_index) {
            value.pop();
        }
    }

    pub(crate) fn clear_field(&mut self) {
        if let Some(FormValue::Text(value)) = self.values.get_mut(self.field_index) {
            value.clear();
        }
    }

    pub(crate) fn choice_count(&self, store: &RecordStore) -> usize {
        match self.spec().choices {
            FormChoiceKind::None => 0,
            FormChoiceKind::Representative => store.representatives().len(),
            FormChoiceKind::List => store.lists().len() + 1,
            FormChoiceKind::ProspectScore => ProspectScore::ALL.len() + 1,
            FormChoiceKind::ActivityKind => {
                ActivityKind::CURRENT.len() + usize::from(self.legacy_kind.is_some())
            }
            FormChoiceKind::Outcome => NegotiationOutcome::ALL.len() + 1,
            FormChoiceKind::Appointment => APPOINTMENT_LABELS.len(),
        }
    }

    pub(crate) fn cycle_choice(&mut self, store: &RecordStore, delta: isize) {
        let count = self.choice_count(store);
        if count == 0 {
            return;
        }
        let current = self.choice(self.field_index) as isize;
        let next = (current + delta).rem_euclid(count as isize);
        self.set_choice(self.field_index, usize::try_from(next).unwrap_or(0));
    }

    pub(crate) fn pick_choice(&mut self, store: &RecordStore, index: usize) {
        if index < self.choice_count(store) {
            self.set_choice(self.field_index, index);
        }
    }

    pub(crate) fn field_status(&self) -> String {
        format!(
            "field {} ({}/{})",
            self.spec().label,
            self.field_index + 1,
            form_field_specs(self.kind).len()
        )
    }

    fn choice_label(&self, spec: FormFieldSpec, value: usize, store: &RecordStore) -> String {
        let unset = || "-".to_owned();
        match spec.choices {
            FormChoiceKind::None => String::new(),
            FormChoiceKind::Representative => store
                .representatives()
                .get(value)
                .map_or_else(unset, |rep| rep.name.clone()),
            FormChoiceKind::List => value
                .checked_sub(1)
                .and_then(|index| store.lists().get(index))
                .map_or_else(|| "unassigned".to_owned(), |list| list.name.clone()),
            FormChoiceKind::ProspectScore => value
                .checked_sub(1)
                .and_then(|index| ProspectScore::ALL.get(index))
                .map_or_else(unset, |score| score.as_str().to_owned()),
            FormChoiceKind::ActivityKind => self
                .activity_kind(value)
                .map_or_else(unset, |kind| kind.label().to_owned()),
            FormChoiceKind::Outcome => value
                .checked_sub(1)
                .and_then(|index| NegotiationOutcome::ALL.get(index))
                .map_or_else(unset, |outcome| outcome.label().to_owned()),
            FormChoiceKind::Appointment => APPOINTMENT_LABELS
                .get(value)
                .map_or_else(unset, |label| (*label).to_owned()),
        }
    }

    fn activity_kind(&self, value: usize) -> Option<ActivityKind> {
        ActivityKind::CURRENT
            .get(value)
            .copied()
            .or(self.legacy_kind.filter(|_| value == ActivityKind::CURRENT.len()))
    }

    pub(crate) fn render_lines(&self, store: &RecordStore) -> Vec<String> {
        form_field_specs(self.kind)
            .iter()
            .zip(&self.values)
            .enumerate()
            .map(|(index, (spec, value))| {
                let marker = if index == self.field_index { "> " } else { "  " };
                match value {
                    FormValue::Text(text) if index == self.field_index => {
                        format!("{marker}{}: {text}_", spec.label)
                    }
                    FormValue::Text(text) => format!("{marker}{}: {text}", spec.label),
                    FormValue::Choice(choice) => format!(
                        "{marker}{}: < {} >",
                        spec.label,
                        self.choice_label(*spec, *choice, store)
                    ),
                }
            })
            .collect()
    }

    /// Parses the buffers into the input the workspace expects.
    pub(crate) fn submission(&self, store: &RecordStore) -> CrmResult<FormSubmission> {
        Ok(match self.kind {
            FormKind::AddCompany => FormSubmission::AddCompany(self.company_input(store)?),
            FormKind::EditCompany(id) => FormSubmission::EditCompany(
                id,
                CompanyPatch::from_input(&self.company_input(store)?),
            ),
            FormKind::AddActivity(company_id) => {
                FormSubmission::AddActivity(self.activity_input(company_id)?)
            }
            FormKind::EditActivity(id) => {
                let company_id = store
                    .activity(id)
                    .map(|activity| activity.company_id)
                    .ok_or_else(|| CrmError::validation(format!("activity {id} does not exist")))?;
                FormSubmission::EditActivity(id, self.activity_input(company_id)?)
            }
            FormKind::AddRepresentative => {
                FormSubmission::AddRepresentative(self.representative_input())
            }
            FormKind::EditRepresentative(id) => {
                FormSubmission::EditRepresentative(id, self.representative_input())
            }
            FormKind::AddList => FormSubmission::AddList(self.list_input()),
            FormKind::EditList(id) => FormSubmission::EditList(id, self.list_input()),
        })
    }

    fn company_input(&self, store: &RecordStore) -> CrmResult<CompanyInput> {
        let representative_id = store
            .representatives()
            .get(self.choice(6))
            .map(|rep| rep.id)
            .ok_or_else(|| CrmError::validation("representative is required"))?;
        let list_id = self
            .choice(7)
            .checked_sub(1)
            .and_then(|index| store.lists().get(index))
            .map(|list| list.id);
        let prospect_score = self
            .choice(8)
            .checked_sub(1)
            .and_then(|index| ProspectScore::ALL.get(index))
            .copied();
        Ok(CompanyInput {
            name: self.text(0).to_owned(),
            contact_person: or_unset(self.text(1)).to_owned(),
            department: or_unset(self.text(2)).to_owned(),
            position: or_unset(self.text(3)).to_owned(),
            email: self.text(4).to_owned(),
            phone_number: self.text(5).to_owned(),
            representative_id,
            list_id,
            prospect_score,
            memo: self.optional_text(9),
        })
    }

    fn activity_input(&self, company_id: CompanyId) -> CrmResult<ActivityInput> {
        let field_error = |label: &str, error: nisesales_app::ValidationError| {
            CrmError::validation(format!("{label}: {error}"))
        };
        let date = parse_iso_date(self.text(0)).map_err(|error| field_error("date", error))?;
        let kind = self
            .activity_kind(self.choice(1))
            .unwrap_or(ActivityKind::Negotiation);
        let amount_yen =
            parse_optional_yen(self.text(4)).map_err(|error| field_error("amount", error))?;
        let probability = parse_optional_percent(self.text(5))
            .map_err(|error| field_error("probability", error))?;
        let outcome = self
            .choice(6)
            .checked_sub(1)
            .and_then(|index| NegotiationOutcome::ALL.get(index))
            .copied();
        let next_action_date = parse_optional_iso_date(Some(self.text(8)))
            .map_err(|error| field_error("next action date", error))?;
        let appointment_secured = match self.choice(9) {
            1 => Some(false),
            2 => Some(true),
            _ => None,
        };
        Ok(ActivityInput {
            company_id,
            date,
            kind,
            title: self.text(2).to_owned(),
            content: self.text(3).to_owned(),
            amount_yen,
            probability,
            outcome,
            next_action: self.optional_text(7),
            next_action_date,
            appointment_secured,
        })
    }

    fn representative_input(&self) -> RepresentativeInput {
        RepresentativeInput {
            name: self.text(0).to_owned(),
            email: self.text(1).to_owned(),
        }
    }

    fn list_input(&self) -> ListInput {
        ListInput {
            name: self.text(0).to_owned(),
            description: self.optional_text(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FormKind, FormSubmission, FormUiState};
    use anyhow::{Result, anyhow};
    use nisesales_app::{
        ActiveTab, ActivityKind, ListTab, NegotiationOutcome, ProspectScore, RecordStore,
        Workspace, WorkspaceOptions,
    };
    use nisesales_testkit::{MemoryPersistence, reference_date};

    fn store() -> Result<RecordStore> {
        let mut persistence = MemoryPersistence::new();
        let sato = persistence.seed_representative("佐藤")?;
        let expo = persistence.seed_list("展示会")?;
        let company = persistence.seed_company("A社", sato, Some(expo))?;
        persistence.seed_activity(company, ActivityKind::Negotiation)?;
        let workspace = Workspace::load(&mut persistence, WorkspaceOptions::default())?;
        Ok(workspace.store().clone())
    }

    fn type_text(form: &mut FormUiState, text: &str) {
        for ch in text.chars() {
            form.push_char(ch);
        }
    }

    #[test]
    fn company_form_normalizes_blank_contact_fields() -> Result<()> {
        let store = store()?;
        let mut form = FormUiState::open(FormKind::AddCompany, &store, reference_date())?;
        let expo = store.lists()[0].id;
        form.preselect_tab(ActiveTab::List(ListTab::List(expo)), &store);
        type_text(&mut form, "B社");
        form.move_field(8);
        form.pick_choice(&store, 2);
        assert_eq!(form.field_status(), "field score (9/10)");

        let FormSubmission::AddCompany(input) = form.submission(&store)? else {
            return Err(anyhow!("expected a new company"));
        };
        assert_eq!(input.name, "B社");
        assert_eq!(input.contact_person, "未設定");
        assert_eq!(input.list_id, Some(expo));
        assert_eq!(input.prospect_score, Some(ProspectScore::A));
        assert_eq!(input.representative_id, store.representatives()[0].id);
        Ok(())
    }

    #[test]
    fn field_cursor_wraps_both_ways() -> Result<()> {
        let store = store()?;
        let mut form = FormUiState::open(FormKind::AddList, &store, reference_date())?;
        form.move_field(-1);
        assert_eq!(form.field_status(), "field description (2/2)");
        form.move_field(1);
        assert_eq!(form.field_status(), "field name (1/2)");
        Ok(())
    }

    #[test]
    fn activity_form_prefills_and_parses_negotiation_fields() -> Result<()> {
        let store = store()?;
        let activity = store.activities()[0].clone();
        let mut form =
            FormUiState::open(FormKind::EditActivity(activity.id), &store, reference_date())?;
        form.move_field(4);
        type_text(&mut form, "1,200,000");
        form.move_field(1);
        type_text(&mut form, "60%");
        form.move_field(1);
        form.cycle_choice(&store, -1);
        form.move_field(3);
        form.pick_choice(&store, 2);

        let FormSubmission::EditActivity(id, input) = form.submission(&store)? else {
            return Err(anyhow!("expected an activity edit"));
        };
        assert_eq!(id, activity.id);
        assert_eq!(input.company_id, activity.company_id);
        assert_eq!(input.date, activity.date);
        assert_eq!(input.kind, ActivityKind::Negotiation);
        assert_eq!(input.amount_yen, Some(1_200_000));
        assert_eq!(input.probability, Some(60));
        assert_eq!(input.outcome, Some(NegotiationOutcome::NextProposal));
        assert_eq!(input.appointment_secured, Some(true));
        Ok(())
    }

    #[test]
    fn malformed_activity_fields_name_the_field() -> Result<()> {
        let store = store()?;
        let company = store.companies()[0].id;
        let mut form = FormUiState::open(FormKind::AddActivity(company), &store, reference_date())?;
        assert!(form.render_lines(&store)[0].contains("2026-01-05"));
        form.clear_field();
        type_text(&mut form, "2026/01/05");
        let error = form.submission(&store).expect_err("bad date");
        assert!(error.is_validation());
        assert!(error.to_string().starts_with("date:"));

        form.clear_field();
        type_text(&mut form, "2026-01-05");
        form.move_field(5);
        type_text(&mut form, "150");
        let error = form.submission(&store).expect_err("bad probability");
        assert!(error.to_string().starts_with("probability:"));
        Ok(())
    }

    #[test]
    fn company_form_needs_a_representative() {
        let store = RecordStore::default();
        let error = FormUiState::open(FormKind::AddCompany, &store, reference_date())
            .expect_err("no representatives");
        assert!(error.is_validation());
    }
}
