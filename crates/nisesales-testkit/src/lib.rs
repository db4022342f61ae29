// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use nisesales_app::{
    Activity, ActivityId, ActivityInput, ActivityKind, Company, CompanyId, CompanyInput,
    CompanyList, CompanyPatch, ListId, ListInput, NegotiationOutcome, Persistence, ProspectScore,
    Representative, RepresentativeId, RepresentativeInput,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use time::{Date, Duration, Month, OffsetDateTime};

const COMPANY_PREFIXES: [&str; 4] = ["株式会社", "有限会社", "合同会社", ""];
const COMPANY_STEMS: [&str; 16] = [
    "サンプル",
    "テスト商事",
    "エクセル製造",
    "みらい物流",
    "青葉システム",
    "北斗電機",
    "さくら食品",
    "光陽建設",
    "東都ソフト",
    "日の出印刷",
    "大和精工",
    "港南商会",
    "富士テック",
    "緑川化学",
    "白鷺ホールディングス",
    "銀河通信",
];
const LAST_NAMES: [&str; 12] = [
    "田中", "佐藤", "山田", "鈴木", "高橋", "伊藤", "渡辺", "中村", "小林", "加藤", "吉田", "山本",
];
const FIRST_NAMES: [&str; 10] = [
    "太郎", "花子", "次郎", "健一", "美咲", "大輔", "直美", "翔太", "陽子", "誠",
];
const DEPARTMENTS: [&str; 8] = [
    "情報システム部",
    "開発本部",
    "経営企画室",
    "総務部",
    "営業部",
    "購買部",
    "人事部",
    "製造部",
];
const POSITIONS: [&str; 6] = ["部長", "課長", "係長", "室長", "CTO", "主任"];
const EMAIL_DOMAINS: [&str; 5] = [
    "sample.co.jp",
    "test.co.jp",
    "example.jp",
    "corp.example.com",
    "mail.example.net",
];
const REPRESENTATIVE_NAMES: [&str; 5] = ["営業太郎", "販売花子", "営業次郎", "企画三郎", "開拓四郎"];
const LIST_NAMES: [&str; 4] = ["展示会2026", "紹介案件", "既存顧客", "Webリード"];
const ACTIVITY_NOTES: [&str; 8] = [
    "初回ヒアリングを実施",
    "資料を送付",
    "不在のため折り返し依頼",
    "デモを実施し好感触",
    "見積もりを提示",
    "決裁者との面談を調整",
    "導入時期について確認",
    "競合比較の状況を確認",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Reproducible CRM records for tests and demos.
#[derive(Debug, Clone)]
pub struct SalesFaker {
    rng: DeterministicRng,
    serial: usize,
}

impl SalesFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            serial: 0,
        }
    }

    fn pick<'a>(&mut self, values: &'a [&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }

    pub fn representative_names() -> &'static [&'static str] {
        &REPRESENTATIVE_NAMES
    }

    pub fn list_names() -> &'static [&'static str] {
        &LIST_NAMES
    }

    pub fn representative_input(&mut self, index: usize) -> RepresentativeInput {
        let name = REPRESENTATIVE_NAMES[index % REPRESENTATIVE_NAMES.len()];
        RepresentativeInput {
            name: name.to_owned(),
            email: format!("rep{}@company.co.jp", index + 1),
        }
    }

    pub fn list_input(&mut self, index: usize) -> ListInput {
        ListInput {
            name: LIST_NAMES[index % LIST_NAMES.len()].to_owned(),
            description: self.rng.bool().then(|| "デモ用リスト".to_owned()),
        }
    }

    /// Company names are unique per faker: a serial is appended.
    pub fn company_input(
        &mut self,
        representative_id: RepresentativeId,
        list_id: Option<ListId>,
    ) -> CompanyInput {
        self.serial += 1;
        let prefix = self.pick(&COMPANY_PREFIXES);
        let stem = self.pick(&COMPANY_STEMS);
        let last = self.pick(&LAST_NAMES);
        let first = self.pick(&FIRST_NAMES);
        let domain = self.pick(&EMAIL_DOMAINS);
        let score = if self.rng.int_n(4) == 0 {
            None
        } else {
            Some(ProspectScore::ALL[self.rng.int_n(ProspectScore::ALL.len())])
        };
        CompanyInput {
            name: format!("{prefix}{stem}{}", self.serial),
            contact_person: format!("{last}{first}"),
            department: self.pick(&DEPARTMENTS).to_owned(),
            position: self.pick(&POSITIONS).to_owned(),
            email: format!("contact{}@{domain}", self.serial),
            phone_number: format!(
                "0{}-{:04}-{:04}",
                self.rng.int_n(9) + 1,
                self.rng.int_n(10_000),
                self.rng.int_n(10_000)
            ),
            representative_id,
            list_id,
            prospect_score: score,
            memo: self.rng.bool().then(|| "紹介経由".to_owned()),
        }
    }

    pub fn activity_input(&mut self, company_id: CompanyId, kind: ActivityKind) -> ActivityInput {
        let date = reference_date() + Duration::days(self.rng.int_n(90) as i64);
        let negotiation = kind == ActivityKind::Negotiation;
        ActivityInput {
            company_id,
            date,
            kind,
            title: String::new(),
            content: self.pick(&ACTIVITY_NOTES).to_owned(),
            amount_yen: negotiation.then(|| (self.rng.int_n(50) as i64 + 1) * 100_000),
            probability: negotiation.then(|| (self.rng.int_n(10) * 10) as u8),
            outcome: negotiation
                .then(|| NegotiationOutcome::ALL[self.rng.int_n(NegotiationOutcome::ALL.len())]),
            next_action: self.rng.bool().then(|| "次回訪問".to_owned()),
            next_action_date: None,
            appointment_secured: (kind == ActivityKind::Phone).then(|| self.rng.bool()),
        }
    }
}

pub const DEMO_COMPANY_COUNT: usize = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoSummary {
    pub representatives: usize,
    pub lists: usize,
    pub companies: usize,
    pub activities: usize,
}

/// Fills an empty backend with a reproducible demo data set. Roughly a third
/// of the companies get a negotiation so both virtual tabs have rows.
pub fn seed_demo_data<P: Persistence + ?Sized>(persistence: &mut P, seed: u64) -> Result<DemoSummary> {
    let mut faker = SalesFaker::new(seed);
    let mut summary = DemoSummary::default();

    let mut representatives = Vec::with_capacity(REPRESENTATIVE_NAMES.len());
    for index in 0..REPRESENTATIVE_NAMES.len() {
        let rep = persistence
            .add_representative(&faker.representative_input(index))
            .context("seed demo representative")?;
        representatives.push(rep.id);
    }
    summary.representatives = representatives.len();

    let mut lists = Vec::with_capacity(LIST_NAMES.len());
    for index in 0..LIST_NAMES.len() {
        let list = persistence
            .add_list(&faker.list_input(index))
            .context("seed demo list")?;
        lists.push(list.id);
    }
    summary.lists = lists.len();

    for index in 0..DEMO_COMPANY_COUNT {
        let representative_id = representatives[faker.rng.int_n(representatives.len())];
        let list_id = match faker.rng.int_n(lists.len() + 1) {
            0 => None,
            slot => Some(lists[slot - 1]),
        };
        let company = persistence
            .add_company(&faker.company_input(representative_id, list_id))
            .context("seed demo company")?;
        summary.companies += 1;

        let mut kinds = vec![ActivityKind::Phone];
        if index % 3 == 0 {
            kinds.push(ActivityKind::Negotiation);
        }
        if faker.rng.bool() {
            kinds.push(ActivityKind::Email);
        }
        for kind in kinds {
            let input = faker.activity_input(company.id, kind).normalized();
            persistence
                .add_activity(&input)
                .context("seed demo activity")?;
            summary.activities += 1;
        }
    }
    Ok(summary)
}

/// In-memory backend with the same referential rules as the real ones.
/// Timestamps come from a fixed clock that advances one second per write,
/// and writes can be made to fail on demand.
#[derive(Debug, Clone)]
pub struct MemoryPersistence {
    companies: Vec<Company>,
    activities: Vec<Activity>,
    representatives: Vec<Representative>,
    lists: Vec<CompanyList>,
    next_id: i64,
    clock: OffsetDateTime,
    failing_companies: BTreeSet<CompanyId>,
    failing_writes: Option<String>,
    writes: Vec<String>,
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self {
            companies: Vec::new(),
            activities: Vec::new(),
            representatives: Vec::new(),
            lists: Vec::new(),
            next_id: 1,
            clock: reference_datetime(),
            failing_companies: BTreeSet::new(),
            failing_writes: None,
            writes: Vec::new(),
        }
    }

    /// Company updates and deletes for `id` fail until cleared.
    pub fn fail_company(&mut self, id: CompanyId) {
        self.failing_companies.insert(id);
    }

    /// Every write fails with `message` until cleared.
    pub fn fail_writes(&mut self, message: impl Into<String>) {
        self.failing_writes = Some(message.into());
    }

    pub fn clear_failures(&mut self) {
        self.failing_companies.clear();
        self.failing_writes = None;
    }

    /// Log of successful writes, e.g. `update company 3`.
    pub fn writes(&self) -> &[String] {
        &self.writes
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

    pub fn company(&self, id: CompanyId) -> Result<&Company> {
        self.companies
            .iter()
            .find(|company| company.id == id)
            .ok_or_else(|| anyhow!("company {id} not found"))
    }

    pub fn seed_representative(&mut self, name: &str) -> Result<RepresentativeId> {
        let rep = self.add_representative(&RepresentativeInput {
            name: name.to_owned(),
            email: format!("{}@company.co.jp", name.to_lowercase()),
        })?;
        Ok(rep.id)
    }

    pub fn seed_list(&mut self, name: &str) -> Result<ListId> {
        let list = self.add_list(&ListInput {
            name: name.to_owned(),
            description: None,
        })?;
        Ok(list.id)
    }

    pub fn seed_company(
        &mut self,
        name: &str,
        representative_id: RepresentativeId,
        list_id: Option<ListId>,
    ) -> Result<CompanyId> {
        let company = self.add_company(&company_input(name, representative_id, list_id))?;
        Ok(company.id)
    }

    pub fn seed_activity(&mut self, company_id: CompanyId, kind: ActivityKind) -> Result<ActivityId> {
        let activity = self.add_activity(&activity_input(company_id, kind).normalized())?;
        Ok(activity.id)
    }

    fn check_writable(&self) -> Result<()> {
        if let Some(message) = &self.failing_writes {
            bail!("{message}");
        }
        Ok(())
    }

    fn check_company_writable(&self, id: CompanyId) -> Result<()> {
        self.check_writable()?;
        if self.failing_companies.contains(&id) {
            bail!("simulated failure writing company {id}");
        }
        Ok(())
    }

    fn allocate(&mut self) -> (i64, OffsetDateTime) {
        let id = self.next_id;
        self.next_id += 1;
        (id, self.tick())
    }

    fn tick(&mut self) -> OffsetDateTime {
        self.clock += Duration::seconds(1);
        self.clock
    }

    fn record(&mut self, write: String) {
        self.writes.push(write);
    }
}

impl Persistence for MemoryPersistence {
    fn list_companies(&mut self) -> Result<Vec<Company>> {
        Ok(self.companies.clone())
    }

    fn add_company(&mut self, input: &CompanyInput) -> Result<Company> {
        self.check_writable()?;
        let (id, now) = self.allocate();
        let company = Company {
            id: CompanyId::new(id),
            name: input.name.clone(),
            contact_person: input.contact_person.clone(),
            department: input.department.clone(),
            position: input.position.clone(),
            email: input.email.clone(),
            phone_number: input.phone_number.clone(),
            representative_id: input.representative_id,
            list_id: input.list_id,
            prospect_score: input.prospect_score,
            memo: input.memo.clone(),
            created_at: now,
            updated_at: now,
        };
        self.companies.insert(0, company.clone());
        self.record(format!("add company {id}"));
        Ok(company)
    }

    fn update_company(&mut self, id: CompanyId, patch: &CompanyPatch) -> Result<Company> {
        self.check_company_writable(id)?;
        let now = self.tick();
        let company = self
            .companies
            .iter_mut()
            .find(|company| company.id == id)
            .ok_or_else(|| anyhow!("company {id} not found"))?;
        patch.apply_to(company);
        company.updated_at = now;
        let updated = company.clone();
        self.record(format!("update company {id}"));
        Ok(updated)
    }

    fn delete_company(&mut self, id: CompanyId) -> Result<()> {
        self.check_company_writable(id)?;
        let before = self.companies.len();
        self.companies.retain(|company| company.id != id);
        if self.companies.len() == before {
            bail!("company {id} not found");
        }
        self.activities.retain(|activity| activity.company_id != id);
        self.record(format!("delete company {id}"));
        Ok(())
    }

    fn list_activities(&mut self) -> Result<Vec<Activity>> {
        Ok(self.activities.clone())
    }

    fn add_activity(&mut self, input: &ActivityInput) -> Result<Activity> {
        self.check_writable()?;
        self.company(input.company_id)
            .context("activities need an existing company")?;
        let (id, now) = self.allocate();
        let activity = activity_from_input(ActivityId::new(id), input, now, now);
        self.activities.insert(0, activity.clone());
        self.record(format!("add activity {id}"));
        Ok(activity)
    }

    fn update_activity(&mut self, id: ActivityId, input: &ActivityInput) -> Result<Activity> {
        self.check_writable()?;
        let now = self.tick();
        let slot = self
            .activities
            .iter_mut()
            .find(|activity| activity.id == id)
            .ok_or_else(|| anyhow!("activity {id} not found"))?;
        *slot = activity_from_input(id, input, slot.created_at, now);
        let updated = slot.clone();
        self.record(format!("update activity {id}"));
        Ok(updated)
    }

    fn delete_activity(&mut self, id: ActivityId) -> Result<()> {
        self.check_writable()?;
        self.activities.retain(|activity| activity.id != id);
        self.record(format!("delete activity {id}"));
        Ok(())
    }

    fn list_representatives(&mut self) -> Result<Vec<Representative>> {
        let mut reps = self.representatives.clone();
        reps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(reps)
    }

    fn add_representative(&mut self, input: &RepresentativeInput) -> Result<Representative> {
        self.check_writable()?;
        let (id, now) = self.allocate();
        let rep = Representative {
            id: RepresentativeId::new(id),
            name: input.name.clone(),
            email: input.email.clone(),
            created_at: now,
            updated_at: now,
        };
        self.representatives.push(rep.clone());
        self.record(format!("add representative {id}"));
        Ok(rep)
    }

    fn update_representative(
        &mut self,
        id: RepresentativeId,
        input: &RepresentativeInput,
    ) -> Result<Representative> {
        self.check_writable()?;
        let now = self.tick();
        let rep = self
            .representatives
            .iter_mut()
            .find(|rep| rep.id == id)
            .ok_or_else(|| anyhow!("representative {id} not found"))?;
        rep.name.clone_from(&input.name);
        rep.email.clone_from(&input.email);
        rep.updated_at = now;
        let updated = rep.clone();
        self.record(format!("update representative {id}"));
        Ok(updated)
    }

    fn delete_representative(&mut self, id: RepresentativeId) -> Result<()> {
        self.check_writable()?;
        let assigned = self
            .companies
            .iter()
            .filter(|company| company.representative_id == id)
            .count();
        if assigned > 0 {
            bail!("representative {id} is still assigned to {assigned} companies");
        }
        self.representatives.retain(|rep| rep.id != id);
        self.record(format!("delete representative {id}"));
        Ok(())
    }

    fn list_lists(&mut self) -> Result<Vec<CompanyList>> {
        let mut lists = self.lists.clone();
        lists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lists)
    }

    fn add_list(&mut self, input: &ListInput) -> Result<CompanyList> {
        self.check_writable()?;
        let (id, now) = self.allocate();
        let list = CompanyList {
            id: ListId::new(id),
            name: input.name.clone(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.lists.push(list.clone());
        self.record(format!("add list {id}"));
        Ok(list)
    }

    fn update_list(&mut self, id: ListId, input: &ListInput) -> Result<CompanyList> {
        self.check_writable()?;
        let now = self.tick();
        let list = self
            .lists
            .iter_mut()
            .find(|list| list.id == id)
            .ok_or_else(|| anyhow!("list {id} not found"))?;
        list.name.clone_from(&input.name);
        list.description.clone_from(&input.description);
        list.updated_at = now;
        let updated = list.clone();
        self.record(format!("update list {id}"));
        Ok(updated)
    }

    fn delete_list(&mut self, id: ListId) -> Result<()> {
        self.check_writable()?;
        let now = self.tick();
        for company in &mut self.companies {
            if company.list_id == Some(id) {
                company.list_id = None;
                company.updated_at = now;
            }
        }
        self.lists.retain(|list| list.id != id);
        self.record(format!("delete list {id}"));
        Ok(())
    }
}

fn activity_from_input(
    id: ActivityId,
    input: &ActivityInput,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
) -> Activity {
    Activity {
        id,
        company_id: input.company_id,
        date: input.date,
        kind: input.kind,
        title: input.title.clone(),
        content: input.content.clone(),
        amount_yen: input.amount_yen,
        probability: input.probability,
        outcome: input.outcome,
        next_action: input.next_action.clone(),
        next_action_date: input.next_action_date,
        appointment_secured: input.appointment_secured,
        created_at,
        updated_at,
    }
}

pub fn company_input(
    name: &str,
    representative_id: RepresentativeId,
    list_id: Option<ListId>,
) -> CompanyInput {
    CompanyInput {
        name: name.to_owned(),
        contact_person: "担当者".to_owned(),
        department: "営業部".to_owned(),
        position: "部長".to_owned(),
        email: "contact@example.co.jp".to_owned(),
        phone_number: "03-1234-5678".to_owned(),
        representative_id,
        list_id,
        prospect_score: None,
        memo: None,
    }
}

pub fn activity_input(company_id: CompanyId, kind: ActivityKind) -> ActivityInput {
    ActivityInput {
        company_id,
        date: reference_date(),
        kind,
        title: String::new(),
        content: "打ち合わせ".to_owned(),
        amount_yen: None,
        probability: None,
        outcome: None,
        next_action: None,
        next_action_date: None,
        appointment_secured: None,
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("nisesales.db");
    Ok((dir, db_path))
}

pub fn reference_date() -> Date {
    Date::from_calendar_date(2026, Month::January, 5).unwrap_or(Date::MIN)
}

fn reference_datetime() -> OffsetDateTime {
    reference_date().midnight().assume_utc()
}
