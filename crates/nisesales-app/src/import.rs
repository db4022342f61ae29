// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{info, warn};

use crate::{
    CompanyInput, CrmError, CrmResult, Persistence, ProspectScore, RecordStore, RepresentativeId,
    RepresentativeInput, UNSET_LABEL,
};

pub const CSV_HEADER: [&str; 9] = [
    "会社名",
    "名前",
    "部署",
    "役職",
    "電子メール",
    "電話番号",
    "担当者",
    "見込み度",
    "メモ",
];

const SAMPLE_ROWS: [[&str; 9]; 3] = [
    [
        "株式会社サンプル",
        "田中太郎",
        "情報システム部",
        "部長",
        "tanaka@sample.co.jp",
        "03-1234-5678",
        "営業太郎",
        "A",
        "IT関連のソリューション提供",
    ],
    [
        "テスト商事",
        "佐藤花子",
        "開発本部",
        "CTO",
        "sato@test.co.jp",
        "06-9876-5432",
        "販売花子",
        "B",
        "システム導入検討中",
    ],
    [
        "エクセル製造",
        "山田次郎",
        "経営企画室",
        "室長",
        "yamada@excel.co.jp",
        "052-1111-2222",
        "営業次郎",
        "3",
        "製造業DX化案件",
    ],
];

/// Example import file with every field quoted.
pub fn sample_csv() -> String {
    std::iter::once(CSV_HEADER)
        .chain(SAMPLE_ROWS)
        .map(|row| {
            row.iter()
                .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One data line of an import file. `row` counts from the header as 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub row: usize,
    pub name: String,
    pub contact_person: String,
    pub department: String,
    pub position: String,
    pub email: String,
    pub phone_number: String,
    pub representative_name: String,
    pub prospect_score: Option<ProspectScore>,
    pub memo: Option<String>,
}

/// Splits the file into data rows. Quotes are stripped rather than honored,
/// so a field cannot contain a comma.
pub fn parse_csv(text: &str) -> CrmResult<Vec<ImportRow>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(CrmError::validation(
            "the CSV file contains no data rows -- add rows below the header",
        ));
    }
    Ok(lines
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, line)| parse_line(index + 1, line))
        .collect())
}

fn parse_line(row: usize, line: &str) -> ImportRow {
    let fields: Vec<String> = line
        .split(',')
        .map(|field| field.replace('"', "").trim().to_owned())
        .collect();
    let field = |index: usize| fields.get(index).cloned().unwrap_or_default();
    let contact_field =
        |index: usize| or_unset(fields.get(index).map_or("", String::as_str)).to_owned();
    let memo = field(8);
    ImportRow {
        row,
        name: field(0),
        contact_person: contact_field(1),
        department: contact_field(2),
        position: contact_field(3),
        email: field(4),
        phone_number: field(5),
        representative_name: field(6),
        prospect_score: parse_score(&field(7)),
        memo: (!memo.is_empty()).then_some(memo),
    }
}

/// Blank contact fields are stored as the unset label.
pub fn or_unset(value: &str) -> &str {
    if value.is_empty() { UNSET_LABEL } else { value }
}

/// Letter grades, or the legacy 1-5 ranking.
pub fn parse_score(raw: &str) -> Option<ProspectScore> {
    let raw = raw.trim();
    ProspectScore::parse(raw).or_else(|| {
        raw.parse::<u8>()
            .ok()
            .and_then(ProspectScore::from_legacy_rank)
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub messages: Vec<String>,
    pub created_representatives: Vec<String>,
}

impl ImportReport {
    fn fail(&mut self, message: String) {
        self.failed += 1;
        self.messages.push(message);
    }

    pub fn summary(&self) -> String {
        format!("imported {}, failed {}", self.imported, self.failed)
    }
}

/// Creates one company per valid row. Rows are independent: a bad row is
/// reported and the rest still go through.
pub fn import_companies<P: Persistence + ?Sized>(
    persistence: &mut P,
    store: &mut RecordStore,
    text: &str,
) -> CrmResult<ImportReport> {
    let rows = parse_csv(text)?;
    let mut report = ImportReport::default();
    for row in rows {
        if let Err(error) = import_row(persistence, store, &row, &mut report) {
            warn!(row = row.row, error = %error, "import row failed");
            report.fail(format!("row {}: {error}", row.row));
        }
    }
    info!(
        imported = report.imported,
        failed = report.failed,
        "csv import finished"
    );
    Ok(report)
}

fn import_row<P: Persistence + ?Sized>(
    persistence: &mut P,
    store: &mut RecordStore,
    row: &ImportRow,
    report: &mut ImportReport,
) -> CrmResult<()> {
    if row.name.is_empty() {
        return Err(CrmError::validation("company name is required"));
    }
    let duplicate = store
        .companies()
        .iter()
        .any(|company| {
            company.name == row.name && or_unset(&company.contact_person) == row.contact_person
        });
    if duplicate {
        return Err(CrmError::validation(format!(
            "{} ({}) is already registered",
            row.name, row.contact_person
        )));
    }
    let representative_id = resolve_representative(persistence, store, row, report)?;
    let input = CompanyInput {
        name: row.name.clone(),
        contact_person: row.contact_person.clone(),
        department: row.department.clone(),
        position: row.position.clone(),
        email: row.email.clone(),
        phone_number: row.phone_number.clone(),
        representative_id,
        list_id: None,
        prospect_score: row.prospect_score,
        memo: row.memo.clone(),
    };
    input.validate()?;
    let company = persistence.add_company(&input)?;
    store.insert_company(company);
    report.imported += 1;
    Ok(())
}

fn resolve_representative<P: Persistence + ?Sized>(
    persistence: &mut P,
    store: &mut RecordStore,
    row: &ImportRow,
    report: &mut ImportReport,
) -> CrmResult<RepresentativeId> {
    let name = row.representative_name.as_str();
    if name.is_empty() {
        return store
            .representatives()
            .first()
            .map(|rep| rep.id)
            .ok_or_else(|| {
                CrmError::validation("no representative available -- add a representative first")
            });
    }
    if let Some(rep) = store.representative_by_name(name) {
        return Ok(rep.id);
    }
    let created = persistence.add_representative(&RepresentativeInput {
        name: name.to_owned(),
        email: format!("{}@company.co.jp", name.to_lowercase()),
    })?;
    let id = created.id;
    report.created_representatives.push(created.name.clone());
    store.insert_representative(created);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::{parse_csv, parse_score, sample_csv};
    use crate::{ProspectScore, UNSET_LABEL};

    #[test]
    fn name_only_row_gets_defaults() -> anyhow::Result<()> {
        let rows = parse_csv("header\n株式会社ミニマム\n")?;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.row, 2);
        assert_eq!(row.contact_person, UNSET_LABEL);
        assert_eq!(row.department, UNSET_LABEL);
        assert_eq!(row.position, UNSET_LABEL);
        assert_eq!(row.email, "");
        assert_eq!(row.phone_number, "");
        assert_eq!(row.representative_name, "");
        assert_eq!(row.prospect_score, None);
        assert_eq!(row.memo, None);
        Ok(())
    }

    #[test]
    fn quotes_are_stripped_and_blank_lines_skipped() -> anyhow::Result<()> {
        let text = "\u{feff}h1,h2\n\n\"テスト商事\", \"佐藤\" ,開発,CTO,s@t.jp,06,販売花子,b,\"メモ\"\r\n   \n";
        let rows = parse_csv(text)?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "テスト商事");
        assert_eq!(rows[0].contact_person, "佐藤");
        assert_eq!(rows[0].prospect_score, Some(ProspectScore::B));
        assert_eq!(rows[0].memo.as_deref(), Some("メモ"));
        Ok(())
    }

    #[test]
    fn header_only_file_is_rejected() {
        let error = parse_csv("会社名,名前\n\n").expect_err("no data rows");
        assert!(error.is_validation());
    }

    #[test]
    fn legacy_numeric_scores_map_to_letters() {
        assert_eq!(parse_score("1"), Some(ProspectScore::E));
        assert_eq!(parse_score("2"), Some(ProspectScore::D));
        assert_eq!(parse_score("3"), Some(ProspectScore::C));
        assert_eq!(parse_score("4"), Some(ProspectScore::A));
        assert_eq!(parse_score("5"), Some(ProspectScore::S));
        assert_eq!(parse_score("z"), Some(ProspectScore::Z));
        assert_eq!(parse_score("6"), None);
        assert_eq!(parse_score("hot"), None);
    }

    #[test]
    fn sample_parses_back_into_rows() -> anyhow::Result<()> {
        let sample = sample_csv();
        assert!(sample.starts_with("\"会社名\""));
        let rows = parse_csv(&sample)?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].prospect_score, Some(ProspectScore::C));
        assert_eq!(rows[1].representative_name, "販売花子");
        Ok(())
    }
}
