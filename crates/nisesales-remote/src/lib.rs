// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use nisesales_app::{
    Activity, ActivityId, ActivityInput, ActivityKind, Company, CompanyId, CompanyInput,
    CompanyList, CompanyPatch, ListId, ListInput, NegotiationOutcome, Persistence, ProspectScore,
    Representative, RepresentativeId, RepresentativeInput, format_iso_date, parse_iso_date,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tracing::debug;
use url::Url;

const COMPANIES: &str = "companies";
const ACTIVITIES: &str = "activities";
const REPRESENTATIVES: &str = "representatives";
const LISTS: &str = "lists";

/// PostgREST client for a Supabase-style `rest/v1` endpoint.
///
/// The server only stores rows; the cascades the local store gets from
/// foreign keys are issued here as separate requests before the delete.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            bail!("remote.url must not be empty");
        }
        let parsed = Url::parse(trimmed)
            .with_context(|| format!("remote.url {trimmed:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "remote.url must use http or https, got {}://",
                parsed.scheme()
            );
        }
        if parsed.cannot_be_a_base() {
            bail!("remote.url {trimmed:?} cannot be used as a base URL");
        }
        if api_key.trim().is_empty() {
            bail!("remote.api_key must not be empty -- copy the anon key from the project settings");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url: parsed,
            api_key: api_key.trim().to_owned(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cheap reachability and credential check.
    pub fn ping(&self) -> Result<()> {
        let _: Vec<Value> = self.fetch(
            REPRESENTATIVES,
            &[("select", "id".to_owned()), ("limit", "1".to_owned())],
        )?;
        Ok(())
    }

    fn endpoint(&self, table: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("remote.url {} cannot be used as a base URL", self.base_url))?
            .pop_if_empty()
            .push(table);
        Ok(url)
    }

    fn send(&self, method: &str, table: &str, request: RequestBuilder) -> Result<Response> {
        debug!(method, table, "remote request");
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .send()
            .map_err(|error| connection_error(self.base_url.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn fetch<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let request = self.http.get(self.endpoint(table)?).query(query);
        self.send("GET", table, request)?
            .json()
            .with_context(|| format!("decode {table} rows"))
    }

    fn insert<B: Serialize, T: DeserializeOwned>(&self, table: &str, body: &B) -> Result<T> {
        let request = self.http.post(self.endpoint(table)?).json(body);
        let rows: Vec<T> = self
            .send("POST", table, request)?
            .json()
            .with_context(|| format!("decode inserted {table} row"))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("insert into {table} returned no row -- check row level security policies"))
    }

    fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<Vec<T>> {
        let request = self
            .http
            .patch(self.endpoint(table)?)
            .query(query)
            .json(body);
        self.send("PATCH", table, request)?
            .json()
            .with_context(|| format!("decode updated {table} rows"))
    }

    fn patch_one<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        id: i64,
        body: &B,
    ) -> Result<T> {
        self.patch(table, &[("id", format!("eq.{id}"))], body)?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(table, id))
    }

    fn delete(&self, table: &str, query: &[(&str, String)]) -> Result<usize> {
        let request = self.http.delete(self.endpoint(table)?).query(query);
        let rows: Vec<Value> = self
            .send("DELETE", table, request)?
            .json()
            .with_context(|| format!("decode deleted {table} rows"))?;
        Ok(rows.len())
    }

    fn delete_one(&self, table: &str, id: i64) -> Result<()> {
        if self.delete(table, &[("id", format!("eq.{id}"))])? == 0 {
            return Err(not_found(table, id));
        }
        Ok(())
    }
}

impl Persistence for Client {
    fn list_companies(&mut self) -> Result<Vec<Company>> {
        let rows: Vec<CompanyRow> = self.fetch(
            COMPANIES,
            &[
                ("select", "*".to_owned()),
                ("order", "created_at.desc".to_owned()),
            ],
        )?;
        rows.into_iter().map(CompanyRow::into_company).collect()
    }

    fn add_company(&mut self, input: &CompanyInput) -> Result<Company> {
        let row: CompanyRow = self.insert(COMPANIES, &CompanyBody::from_input(input))?;
        row.into_company()
    }

    fn update_company(&mut self, id: CompanyId, patch: &CompanyPatch) -> Result<Company> {
        if patch.is_empty() {
            bail!("nothing to update for company {id}");
        }
        let body = company_patch_body(patch, &now_timestamp()?);
        let row: CompanyRow = self.patch_one(COMPANIES, id.get(), &body)?;
        row.into_company()
    }

    fn delete_company(&mut self, id: CompanyId) -> Result<()> {
        self.delete(ACTIVITIES, &[("company_id", format!("eq.{id}"))])
            .with_context(|| format!("delete activities of company {id}"))?;
        self.delete_one(COMPANIES, id.get())
    }

    fn list_activities(&mut self) -> Result<Vec<Activity>> {
        let rows: Vec<ActivityRow> = self.fetch(
            ACTIVITIES,
            &[
                ("select", "*".to_owned()),
                ("order", "date.desc".to_owned()),
            ],
        )?;
        rows.into_iter().map(ActivityRow::into_activity).collect()
    }

    fn add_activity(&mut self, input: &ActivityInput) -> Result<Activity> {
        let row: ActivityRow = self.insert(ACTIVITIES, &ActivityBody::from_input(input))?;
        row.into_activity()
    }

    fn update_activity(&mut self, id: ActivityId, input: &ActivityInput) -> Result<Activity> {
        let body = ActivityBody {
            updated_at: Some(now_timestamp()?),
            ..ActivityBody::from_input(input)
        };
        let row: ActivityRow = self.patch_one(ACTIVITIES, id.get(), &body)?;
        row.into_activity()
    }

    fn delete_activity(&mut self, id: ActivityId) -> Result<()> {
        self.delete_one(ACTIVITIES, id.get())
    }

    fn list_representatives(&mut self) -> Result<Vec<Representative>> {
        let rows: Vec<RepresentativeRow> = self.fetch(
            REPRESENTATIVES,
            &[("select", "*".to_owned()), ("order", "name".to_owned())],
        )?;
        rows.into_iter()
            .map(RepresentativeRow::into_representative)
            .collect()
    }

    fn add_representative(&mut self, input: &RepresentativeInput) -> Result<Representative> {
        let row: RepresentativeRow = self.insert(
            REPRESENTATIVES,
            &serde_json::json!({ "name": input.name, "email": input.email }),
        )?;
        row.into_representative()
    }

    fn update_representative(
        &mut self,
        id: RepresentativeId,
        input: &RepresentativeInput,
    ) -> Result<Representative> {
        let row: RepresentativeRow = self.patch_one(
            REPRESENTATIVES,
            id.get(),
            &serde_json::json!({
                "name": input.name,
                "email": input.email,
                "updated_at": now_timestamp()?,
            }),
        )?;
        row.into_representative()
    }

    fn delete_representative(&mut self, id: RepresentativeId) -> Result<()> {
        let assigned: Vec<Value> = self.fetch(
            COMPANIES,
            &[
                ("select", "id".to_owned()),
                ("representative_id", format!("eq.{id}")),
            ],
        )?;
        if !assigned.is_empty() {
            bail!(
                "representative {id} is assigned to {} compan{} -- reassign them first",
                assigned.len(),
                if assigned.len() == 1 { "y" } else { "ies" }
            );
        }
        self.delete_one(REPRESENTATIVES, id.get())
    }

    fn list_lists(&mut self) -> Result<Vec<CompanyList>> {
        let rows: Vec<ListRow> = self.fetch(
            LISTS,
            &[("select", "*".to_owned()), ("order", "name".to_owned())],
        )?;
        rows.into_iter().map(ListRow::into_list).collect()
    }

    fn add_list(&mut self, input: &ListInput) -> Result<CompanyList> {
        let row: ListRow = self.insert(
            LISTS,
            &serde_json::json!({ "name": input.name, "description": input.description }),
        )?;
        row.into_list()
    }

    fn update_list(&mut self, id: ListId, input: &ListInput) -> Result<CompanyList> {
        let row: ListRow = self.patch_one(
            LISTS,
            id.get(),
            &serde_json::json!({
                "name": input.name,
                "description": input.description,
                "updated_at": now_timestamp()?,
            }),
        )?;
        row.into_list()
    }

    fn delete_list(&mut self, id: ListId) -> Result<()> {
        let _: Vec<Value> = self
            .patch(
                COMPANIES,
                &[("list_id", format!("eq.{id}"))],
                &serde_json::json!({ "list_id": null, "updated_at": now_timestamp()? }),
            )
            .with_context(|| format!("unassign members of list {id}"))?;
        self.delete_one(LISTS, id.get())
    }
}

#[derive(Debug, Serialize)]
struct CompanyBody<'a> {
    name: &'a str,
    contact_person: &'a str,
    department: &'a str,
    position: &'a str,
    email: &'a str,
    phone_number: &'a str,
    representative_id: i64,
    list_id: Option<i64>,
    prospect_score: Option<&'static str>,
    memo: Option<&'a str>,
}

impl<'a> CompanyBody<'a> {
    fn from_input(input: &'a CompanyInput) -> Self {
        Self {
            name: &input.name,
            contact_person: &input.contact_person,
            department: &input.department,
            position: &input.position,
            email: &input.email,
            phone_number: &input.phone_number,
            representative_id: input.representative_id.get(),
            list_id: input.list_id.map(ListId::get),
            prospect_score: input.prospect_score.map(ProspectScore::as_str),
            memo: input.memo.as_deref(),
        }
    }
}

/// PATCH bodies carry their own `updated_at`; the tables have no update trigger.
fn now_timestamp() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format update timestamp")
}

/// Only the fields set on the patch are sent; `Some(None)` becomes `null`.
fn company_patch_body(patch: &CompanyPatch, updated_at: &str) -> Map<String, Value> {
    let mut body = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            body.insert(key.to_owned(), value);
        }
    };
    put("name", patch.name.clone().map(Value::from));
    put(
        "contact_person",
        patch.contact_person.clone().map(Value::from),
    );
    put("department", patch.department.clone().map(Value::from));
    put("position", patch.position.clone().map(Value::from));
    put("email", patch.email.clone().map(Value::from));
    put("phone_number", patch.phone_number.clone().map(Value::from));
    put(
        "representative_id",
        patch.representative_id.map(|id| Value::from(id.get())),
    );
    put(
        "list_id",
        patch.list_id.map(|list| Value::from(list.map(ListId::get))),
    );
    put(
        "prospect_score",
        patch
            .prospect_score
            .map(|score| Value::from(score.map(ProspectScore::as_str))),
    );
    put("memo", patch.memo.clone().map(Value::from));
    put("updated_at", Some(Value::from(updated_at)));
    body
}

#[derive(Debug, Serialize)]
struct ActivityBody<'a> {
    company_id: i64,
    date: String,
    #[serde(rename = "type")]
    kind: &'static str,
    title: &'a str,
    content: &'a str,
    amount: Option<i64>,
    probability: Option<u8>,
    status: Option<&'static str>,
    next_action: Option<&'a str>,
    next_action_date: Option<String>,
    appointment_secured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

impl<'a> ActivityBody<'a> {
    fn from_input(input: &'a ActivityInput) -> Self {
        Self {
            company_id: input.company_id.get(),
            date: format_iso_date(input.date),
            kind: input.kind.as_str(),
            title: &input.title,
            content: &input.content,
            amount: input.amount_yen,
            probability: input.probability,
            status: input.outcome.map(NegotiationOutcome::as_str),
            next_action: input.next_action.as_deref(),
            next_action_date: input.next_action_date.map(format_iso_date),
            appointment_secured: input.appointment_secured,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompanyRow {
    id: i64,
    name: String,
    contact_person: Option<String>,
    department: Option<String>,
    position: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    representative_id: i64,
    list_id: Option<i64>,
    prospect_score: Option<Value>,
    memo: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CompanyRow {
    fn into_company(self) -> Result<Company> {
        Ok(Company {
            id: CompanyId::new(self.id),
            name: self.name,
            contact_person: self.contact_person.unwrap_or_default(),
            department: self.department.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone_number: self.phone_number.unwrap_or_default(),
            representative_id: RepresentativeId::new(self.representative_id),
            list_id: self.list_id.map(ListId::new),
            prospect_score: parse_score(self.prospect_score.as_ref()),
            memo: self.memo,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    id: i64,
    company_id: i64,
    date: String,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    content: String,
    amount: Option<i64>,
    probability: Option<i64>,
    status: Option<String>,
    next_action: Option<String>,
    next_action_date: Option<String>,
    appointment_secured: Option<bool>,
    created_at: String,
    updated_at: String,
}

impl ActivityRow {
    fn into_activity(self) -> Result<Activity> {
        let kind = ActivityKind::parse(&self.kind)
            .ok_or_else(|| anyhow!("activity {} has unknown type {:?}", self.id, self.kind))?;
        let probability = self
            .probability
            .map(|value| {
                u8::try_from(value)
                    .ok()
                    .filter(|value| *value <= 100)
                    .ok_or_else(|| anyhow!("activity {} has probability {value}", self.id))
            })
            .transpose()?;
        Ok(Activity {
            id: ActivityId::new(self.id),
            company_id: CompanyId::new(self.company_id),
            date: parse_date(&self.date)?,
            kind,
            title: self.title.unwrap_or_default(),
            content: self.content,
            amount_yen: self.amount,
            probability,
            outcome: self.status.as_deref().and_then(NegotiationOutcome::parse),
            next_action: self.next_action,
            next_action_date: self
                .next_action_date
                .as_deref()
                .filter(|raw| !raw.is_empty())
                .map(parse_date)
                .transpose()?,
            appointment_secured: self.appointment_secured,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RepresentativeRow {
    id: i64,
    name: String,
    email: String,
    created_at: String,
    updated_at: String,
}

impl RepresentativeRow {
    fn into_representative(self) -> Result<Representative> {
        Ok(Representative {
            id: RepresentativeId::new(self.id),
            name: self.name,
            email: self.email,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListRow {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ListRow {
    fn into_list(self) -> Result<CompanyList> {
        Ok(CompanyList {
            id: ListId::new(self.id),
            name: self.name,
            description: self.description,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Older rows stored the score as a 1-5 number.
fn parse_score(value: Option<&Value>) -> Option<ProspectScore> {
    match value? {
        Value::String(raw) => ProspectScore::parse(raw),
        Value::Number(number) => number
            .as_u64()
            .and_then(|rank| u8::try_from(rank).ok())
            .and_then(ProspectScore::from_legacy_rank),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(raw, &Rfc3339).with_context(|| format!("parse timestamp {raw:?}"))
}

fn parse_date(raw: &str) -> Result<Date> {
    parse_iso_date(raw).with_context(|| format!("parse date {raw:?}"))
}

fn not_found(table: &str, id: i64) -> anyhow::Error {
    anyhow!("{table} row {id} not found -- reload and choose an existing record")
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [remote].url and your network ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<PostgrestError>(body)
        && let Some(message) = parsed.message.filter(|message| !message.is_empty())
    {
        let hint = match parsed.code.as_deref() {
            Some("23503") => " -- the record is still referenced",
            Some("42501") => " -- check row level security policies",
            _ => "",
        };
        return anyhow!("server error ({}): {message}{hint}", status.as_u16());
    }

    if status == StatusCode::UNAUTHORIZED {
        return anyhow!("server rejected the api key (401) -- check [remote].api_key");
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{CompanyBody, clean_error_response, company_patch_body, parse_date, parse_score};
    use nisesales_app::{
        CompanyInput, CompanyPatch, ListId, ProspectScore, RepresentativeId,
    };
    use reqwest::StatusCode;
    use serde_json::{Value, json};

    #[test]
    fn patch_body_only_carries_set_fields() {
        let stamp = "2026-03-01T09:00:00Z";
        let body = company_patch_body(
            &CompanyPatch {
                representative_id: Some(RepresentativeId::new(3)),
                list_id: Some(None),
                ..CompanyPatch::default()
            },
            stamp,
        );
        assert_eq!(
            Value::Object(body),
            json!({ "representative_id": 3, "list_id": null, "updated_at": stamp })
        );

        let body = company_patch_body(
            &CompanyPatch {
                list_id: Some(Some(ListId::new(7))),
                prospect_score: Some(Some(ProspectScore::A)),
                ..CompanyPatch::default()
            },
            stamp,
        );
        assert_eq!(
            Value::Object(body),
            json!({ "list_id": 7, "prospect_score": "A", "updated_at": stamp })
        );
    }

    #[test]
    fn insert_body_uses_snake_case_columns() -> anyhow::Result<()> {
        let input = CompanyInput {
            name: "A社".to_owned(),
            contact_person: "田中".to_owned(),
            department: "営業部".to_owned(),
            position: "部長".to_owned(),
            email: String::new(),
            phone_number: "03".to_owned(),
            representative_id: RepresentativeId::new(1),
            list_id: None,
            prospect_score: Some(ProspectScore::S),
            memo: None,
        };
        let body = serde_json::to_value(CompanyBody::from_input(&input))?;
        assert_eq!(body["contact_person"], "田中");
        assert_eq!(body["phone_number"], "03");
        assert_eq!(body["representative_id"], 1);
        assert_eq!(body["list_id"], Value::Null);
        assert_eq!(body["prospect_score"], "S");
        Ok(())
    }

    #[test]
    fn scores_accept_letters_and_legacy_numbers() {
        assert_eq!(parse_score(Some(&json!("b"))), Some(ProspectScore::B));
        assert_eq!(parse_score(Some(&json!(5))), Some(ProspectScore::S));
        assert_eq!(parse_score(Some(&json!(9))), None);
        assert_eq!(parse_score(Some(&Value::Null)), None);
        assert_eq!(parse_score(None), None);
    }

    #[test]
    fn dates_tolerate_timestamp_suffix() -> anyhow::Result<()> {
        assert_eq!(parse_date("2026-03-01")?, parse_date("2026-03-01T00:00:00+00:00")?);
        assert!(parse_date("03/01").is_err());
        Ok(())
    }

    #[test]
    fn error_bodies_are_cleaned() {
        let error = clean_error_response(
            StatusCode::CONFLICT,
            r#"{"code":"23503","message":"update or delete violates foreign key"}"#,
        );
        assert_eq!(
            error.to_string(),
            "server error (409): update or delete violates foreign key -- the record is still referenced"
        );

        let error = clean_error_response(StatusCode::UNAUTHORIZED, "");
        assert!(error.to_string().contains("[remote].api_key"));

        let error = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(error.to_string(), "server error (502): upstream down");
    }
}
