// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use nisesales_app::{
    Activity, ActivityId, ActivityInput, ActivityKind, Company, CompanyId, CompanyInput,
    CompanyList, CompanyPatch, ListId, ListInput, NegotiationOutcome, Persistence, ProspectScore,
    Representative, RepresentativeId, RepresentativeInput, format_iso_date, parse_iso_date,
    parse_optional_iso_date,
};
use nisesales_testkit::{DemoSummary, seed_demo_data};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

pub const APP_NAME: &str = "nisesales";
pub const DB_PATH_ENV: &str = "NISESALES_DB_PATH";

const DEMO_SEED: u64 = 20_260_105;

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "representatives",
        &["id", "name", "email", "created_at", "updated_at"],
    ),
    (
        "lists",
        &["id", "name", "description", "created_at", "updated_at"],
    ),
    (
        "companies",
        &[
            "id",
            "name",
            "contact_person",
            "department",
            "position",
            "email",
            "phone_number",
            "representative_id",
            "list_id",
            "prospect_score",
            "memo",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "activities",
        &[
            "id",
            "company_id",
            "date",
            "type",
            "title",
            "content",
            "amount",
            "probability",
            "status",
            "next_action",
            "next_action_date",
            "appointment_secured",
            "created_at",
            "updated_at",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_companies_representative_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_companies_representative_id ON companies (representative_id);",
    },
    RequiredIndex {
        name: "idx_companies_list_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_companies_list_id ON companies (list_id);",
    },
    RequiredIndex {
        name: "idx_companies_created_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_companies_created_at ON companies (created_at);",
    },
    RequiredIndex {
        name: "idx_activities_company_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_activities_company_id ON activities (company_id);",
    },
    RequiredIndex {
        name: "idx_activities_type",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_activities_type ON activities (type);",
    },
];

const COMPANY_COLUMNS: &str = "
  id, name, contact_person, department, position, email, phone_number,
  representative_id, list_id, prospect_score, memo, created_at, updated_at
";

const ACTIVITY_COLUMNS: &str = "
  id, company_id, date, type, title, content, amount, probability, status,
  next_action, next_action_date, appointment_secured, created_at, updated_at
";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            info!("created database schema");
        }

        ensure_required_indexes(&self.conn)
    }

    /// Seeds the demo data set into an empty database.
    pub fn seed_demo_data(&mut self) -> Result<DemoSummary> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |row| row.get(0))
            .context("count companies")?;
        if existing > 0 {
            bail!("demo data needs an empty database, found {existing} companies");
        }
        let summary = seed_demo_data(self, DEMO_SEED)?;
        info!(
            companies = summary.companies,
            activities = summary.activities,
            "seeded demo data"
        );
        Ok(summary)
    }

    pub fn get_company(&self, company_id: CompanyId) -> Result<Company> {
        self.conn
            .query_row(
                &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?"),
                params![company_id.get()],
                company_from_row,
            )
            .optional()
            .with_context(|| format!("load company {company_id}"))?
            .ok_or_else(|| {
                anyhow!("company {company_id} not found -- reload and choose an existing company")
            })
    }

    pub fn get_activity(&self, activity_id: ActivityId) -> Result<Activity> {
        self.conn
            .query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?"),
                params![activity_id.get()],
                activity_from_row,
            )
            .optional()
            .with_context(|| format!("load activity {activity_id}"))?
            .ok_or_else(|| anyhow!("activity {activity_id} not found"))
    }

    pub fn get_representative(&self, representative_id: RepresentativeId) -> Result<Representative> {
        self.conn
            .query_row(
                "SELECT id, name, email, created_at, updated_at FROM representatives WHERE id = ?",
                params![representative_id.get()],
                representative_from_row,
            )
            .optional()
            .with_context(|| format!("load representative {representative_id}"))?
            .ok_or_else(|| anyhow!("representative {representative_id} not found"))
    }

    pub fn get_list(&self, list_id: ListId) -> Result<CompanyList> {
        self.conn
            .query_row(
                "SELECT id, name, description, created_at, updated_at FROM lists WHERE id = ?",
                params![list_id.get()],
                list_from_row,
            )
            .optional()
            .with_context(|| format!("load list {list_id}"))?
            .ok_or_else(|| anyhow!("list {list_id} not found"))
    }

    pub fn count_companies_for_representative(
        &self,
        representative_id: RepresentativeId,
    ) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM companies WHERE representative_id = ?",
                params![representative_id.get()],
                |row| row.get(0),
            )
            .with_context(|| format!("count companies for representative {representative_id}"))
    }

    fn write_company(&self, company: &Company, now: &str) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE companies
                SET
                  name = ?,
                  contact_person = ?,
                  department = ?,
                  position = ?,
                  email = ?,
                  phone_number = ?,
                  representative_id = ?,
                  list_id = ?,
                  prospect_score = ?,
                  memo = ?,
                  updated_at = ?
                WHERE id = ?
                ",
                params![
                    company.name,
                    company.contact_person,
                    company.department,
                    company.position,
                    company.email,
                    company.phone_number,
                    company.representative_id.get(),
                    company.list_id.map(ListId::get),
                    company.prospect_score.map(ProspectScore::as_str),
                    company.memo,
                    now,
                    company.id.get(),
                ],
            )
            .with_context(|| format!("update company {}", company.id))?;
        if rows_affected == 0 {
            bail!(
                "company {} not found -- reload and choose an existing company",
                company.id
            );
        }
        Ok(())
    }
}

impl Persistence for Store {
    fn list_companies(&mut self) -> Result<Vec<Company>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY created_at DESC, id DESC"
            ))
            .context("prepare companies query")?;
        let rows = stmt
            .query_map([], company_from_row)
            .context("query companies")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect companies")
    }

    fn add_company(&mut self, input: &CompanyInput) -> Result<Company> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO companies (
                  name, contact_person, department, position, email, phone_number,
                  representative_id, list_id, prospect_score, memo,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    input.name,
                    input.contact_person,
                    input.department,
                    input.position,
                    input.email,
                    input.phone_number,
                    input.representative_id.get(),
                    input.list_id.map(ListId::get),
                    input.prospect_score.map(ProspectScore::as_str),
                    input.memo,
                    now,
                    now,
                ],
            )
            .context("insert company")?;
        let id = CompanyId::new(self.conn.last_insert_rowid());
        debug!(company_id = %id, "inserted company");
        self.get_company(id)
    }

    fn update_company(&mut self, id: CompanyId, patch: &CompanyPatch) -> Result<Company> {
        let mut company = self.get_company(id)?;
        patch.apply_to(&mut company);
        let now = now_rfc3339()?;
        self.write_company(&company, &now)?;
        self.get_company(id)
    }

    fn delete_company(&mut self, id: CompanyId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM companies WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete company {id}"))?;
        if rows_affected == 0 {
            bail!("company {id} not found -- reload and choose an existing company");
        }
        Ok(())
    }

    fn list_activities(&mut self) -> Result<Vec<Activity>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY date DESC, id DESC"
            ))
            .context("prepare activities query")?;
        let rows = stmt
            .query_map([], activity_from_row)
            .context("query activities")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect activities")
    }

    fn add_activity(&mut self, input: &ActivityInput) -> Result<Activity> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO activities (
                  company_id, date, type, title, content, amount, probability,
                  status, next_action, next_action_date, appointment_secured,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    input.company_id.get(),
                    format_iso_date(input.date),
                    input.kind.as_str(),
                    input.title,
                    input.content,
                    input.amount_yen,
                    input.probability,
                    input.outcome.map(NegotiationOutcome::as_str),
                    input.next_action,
                    input.next_action_date.map(format_iso_date),
                    input.appointment_secured,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("insert activity for company {}", input.company_id))?;
        self.get_activity(ActivityId::new(self.conn.last_insert_rowid()))
    }

    fn update_activity(&mut self, id: ActivityId, input: &ActivityInput) -> Result<Activity> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE activities
                SET
                  company_id = ?,
                  date = ?,
                  type = ?,
                  title = ?,
                  content = ?,
                  amount = ?,
                  probability = ?,
                  status = ?,
                  next_action = ?,
                  next_action_date = ?,
                  appointment_secured = ?,
                  updated_at = ?
                WHERE id = ?
                ",
                params![
                    input.company_id.get(),
                    format_iso_date(input.date),
                    input.kind.as_str(),
                    input.title,
                    input.content,
                    input.amount_yen,
                    input.probability,
                    input.outcome.map(NegotiationOutcome::as_str),
                    input.next_action,
                    input.next_action_date.map(format_iso_date),
                    input.appointment_secured,
                    now,
                    id.get(),
                ],
            )
            .with_context(|| format!("update activity {id}"))?;
        if rows_affected == 0 {
            bail!("activity {id} not found -- reload and choose an existing activity");
        }
        self.get_activity(id)
    }

    fn delete_activity(&mut self, id: ActivityId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete activity {id}"))?;
        if rows_affected == 0 {
            bail!("activity {id} not found -- reload and choose an existing activity");
        }
        Ok(())
    }

    fn list_representatives(&mut self) -> Result<Vec<Representative>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, email, created_at, updated_at
                FROM representatives
                ORDER BY name ASC, id ASC
                ",
            )
            .context("prepare representatives query")?;
        let rows = stmt
            .query_map([], representative_from_row)
            .context("query representatives")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect representatives")
    }

    fn add_representative(&mut self, input: &RepresentativeInput) -> Result<Representative> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO representatives (name, email, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ",
                params![input.name, input.email, now, now],
            )
            .context("insert representative")?;
        self.get_representative(RepresentativeId::new(self.conn.last_insert_rowid()))
    }

    fn update_representative(
        &mut self,
        id: RepresentativeId,
        input: &RepresentativeInput,
    ) -> Result<Representative> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE representatives SET name = ?, email = ?, updated_at = ? WHERE id = ?",
                params![input.name, input.email, now, id.get()],
            )
            .with_context(|| format!("update representative {id}"))?;
        if rows_affected == 0 {
            bail!("representative {id} not found -- choose an existing representative and retry");
        }
        self.get_representative(id)
    }

    fn delete_representative(&mut self, id: RepresentativeId) -> Result<()> {
        let assigned = self.count_companies_for_representative(id)?;
        if assigned > 0 {
            bail!(
                "representative {id} is assigned to {assigned} compan{} -- reassign them first",
                if assigned == 1 { "y" } else { "ies" }
            );
        }
        let rows_affected = self
            .conn
            .execute("DELETE FROM representatives WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete representative {id}"))?;
        if rows_affected == 0 {
            bail!("representative {id} not found -- choose an existing representative and retry");
        }
        Ok(())
    }

    fn list_lists(&mut self) -> Result<Vec<CompanyList>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, description, created_at, updated_at
                FROM lists
                ORDER BY name ASC, id ASC
                ",
            )
            .context("prepare lists query")?;
        let rows = stmt.query_map([], list_from_row).context("query lists")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect lists")
    }

    fn add_list(&mut self, input: &ListInput) -> Result<CompanyList> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO lists (name, description, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ",
                params![input.name, input.description, now, now],
            )
            .context("insert list")?;
        self.get_list(ListId::new(self.conn.last_insert_rowid()))
    }

    fn update_list(&mut self, id: ListId, input: &ListInput) -> Result<CompanyList> {
        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE lists SET name = ?, description = ?, updated_at = ? WHERE id = ?",
                params![input.name, input.description, now, id.get()],
            )
            .with_context(|| format!("update list {id}"))?;
        if rows_affected == 0 {
            bail!("list {id} not found -- choose an existing list and retry");
        }
        self.get_list(id)
    }

    /// Members are unassigned in the same transaction so their `updated_at`
    /// moves with the change.
    fn delete_list(&mut self, id: ListId) -> Result<()> {
        let now = now_rfc3339()?;
        let tx = self.conn.transaction().context("begin list delete")?;
        let unassigned = tx
            .execute(
                "UPDATE companies SET list_id = NULL, updated_at = ? WHERE list_id = ?",
                params![now, id.get()],
            )
            .with_context(|| format!("unassign members of list {id}"))?;
        let rows_affected = tx
            .execute("DELETE FROM lists WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete list {id}"))?;
        if rows_affected == 0 {
            bail!("list {id} not found -- choose an existing list and retry");
        }
        tx.commit().context("commit list delete")?;
        debug!(list_id = %id, unassigned, "deleted list");
        Ok(())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os(DB_PATH_ENV) {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set {DB_PATH_ENV} to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("nisesales.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); set [storage].backend = \"remote\" for HTTP backends or pass a filesystem path"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    let score_raw: Option<String> = row.get(9)?;
    let prospect_score = match score_raw.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            ProspectScore::parse(raw)
                .ok_or_else(|| invalid_column(9, format!("unknown prospect score {raw}")))?,
        ),
    };
    let created_at_raw: String = row.get(11)?;
    let updated_at_raw: String = row.get(12)?;

    Ok(Company {
        id: CompanyId::new(row.get(0)?),
        name: row.get(1)?,
        contact_person: row.get(2)?,
        department: row.get(3)?,
        position: row.get(4)?,
        email: row.get(5)?,
        phone_number: row.get(6)?,
        representative_id: RepresentativeId::new(row.get(7)?),
        list_id: row.get::<_, Option<i64>>(8)?.map(ListId::new),
        prospect_score,
        memo: row.get(10)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let kind_raw: String = row.get(3)?;
    let kind = ActivityKind::parse(&kind_raw)
        .ok_or_else(|| invalid_column(3, format!("unknown activity type {kind_raw}")))?;
    let outcome_raw: Option<String> = row.get(8)?;
    let outcome = match outcome_raw.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            NegotiationOutcome::parse(raw)
                .ok_or_else(|| invalid_column(8, format!("unknown negotiation status {raw}")))?,
        ),
    };
    let date_raw: String = row.get(2)?;
    let next_action_date_raw: Option<String> = row.get(10)?;
    let created_at_raw: String = row.get(12)?;
    let updated_at_raw: String = row.get(13)?;

    Ok(Activity {
        id: ActivityId::new(row.get(0)?),
        company_id: CompanyId::new(row.get(1)?),
        date: parse_date(&date_raw).map_err(to_sql_error)?,
        kind,
        title: row.get(4)?,
        content: row.get(5)?,
        amount_yen: row.get(6)?,
        probability: row.get(7)?,
        outcome,
        next_action: row.get(9)?,
        next_action_date: parse_opt_date(next_action_date_raw).map_err(to_sql_error)?,
        appointment_secured: row.get(11)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn representative_from_row(row: &Row<'_>) -> rusqlite::Result<Representative> {
    let created_at_raw: String = row.get(3)?;
    let updated_at_raw: String = row.get(4)?;
    Ok(Representative {
        id: RepresentativeId::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<CompanyList> {
    let created_at_raw: String = row.get(3)?;
    let updated_at_raw: String = row.get(4)?;
    Ok(CompanyList {
        id: ListId::new(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a nisesales database or point {DB_PATH_ENV} at a new file"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; migrate the database before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; migrate the database before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    // Postgres exports use a space separator and a short offset.
    if let Ok(value) = OffsetDateTime::parse(
        raw,
        &format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]"
        ),
    ) {
        return Ok(value);
    }

    if let Ok(value) = OffsetDateTime::parse(
        raw,
        &format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    parse_iso_date(raw).with_context(|| format!("parse date {raw:?}"))
}

fn parse_opt_date(raw: Option<String>) -> Result<Option<Date>> {
    parse_optional_iso_date(raw.as_deref()).with_context(|| format!("parse date {raw:?}"))
}

fn invalid_column(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    invalid_column(0, error.to_string())
}
