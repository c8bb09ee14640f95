// 🏗️ Catalog Parser - delimited school dataset → School records
//
// The dataset is a hand-maintained spreadsheet export. Quotes only toggle an
// "inside quotes" mode (no escaped quotes), so a delimiter between quotes is
// data. Rows that do not line up with the header are skipped, never fatal.

use crate::school::{EnrollmentStatus, School, TriState, CONTACT_FOR_FEES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// COLUMNS
// ============================================================================

/// Known header columns. Anything else in the header is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    SchoolName,
    Address,
    Phone,
    Email,
    Website,
    Distance,
    FeeAnnual,
    FeeMonthly,
    FeeLink,
    DocumentDownloaded,
    GradeRange,
    SpecialNeedsPrograms,
    AdhdSupport,
    AutismSupport,
    OnSiteTherapists,
    Iep,
    SensoryFacilities,
    EducationalApproach,
    BriefDescription,
    EnrollmentStatus,
}

impl Column {
    pub const ALL: [Column; 20] = [
        Column::SchoolName,
        Column::Address,
        Column::Phone,
        Column::Email,
        Column::Website,
        Column::Distance,
        Column::FeeAnnual,
        Column::FeeMonthly,
        Column::FeeLink,
        Column::DocumentDownloaded,
        Column::GradeRange,
        Column::SpecialNeedsPrograms,
        Column::AdhdSupport,
        Column::AutismSupport,
        Column::OnSiteTherapists,
        Column::Iep,
        Column::SensoryFacilities,
        Column::EducationalApproach,
        Column::BriefDescription,
        Column::EnrollmentStatus,
    ];

    /// Header text as it appears in the dataset
    pub fn header(&self) -> &'static str {
        match self {
            Column::SchoolName => "School Name",
            Column::Address => "Address",
            Column::Phone => "Phone",
            Column::Email => "Email",
            Column::Website => "Website",
            Column::Distance => "Distance from Parklands (km)",
            Column::FeeAnnual => "Grade 3 Fee Annual",
            Column::FeeMonthly => "Grade 3 Fee Monthly",
            Column::FeeLink => "Tuition Fee Link",
            Column::DocumentDownloaded => "PDF Downloaded",
            Column::GradeRange => "Grade Range",
            Column::SpecialNeedsPrograms => "Special Needs Programs",
            Column::AdhdSupport => "ADHD Support",
            Column::AutismSupport => "Autism Support",
            Column::OnSiteTherapists => "On-Site Therapists",
            Column::Iep => "IEP/ISP Offered",
            Column::SensoryFacilities => "Sensory Facilities",
            Column::EducationalApproach => "Educational Approach",
            Column::BriefDescription => "Brief Description",
            Column::EnrollmentStatus => "Enrollment Status",
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim();
        Column::ALL.into_iter().find(|c| c.header() == header)
    }
}

// ============================================================================
// FEE DOCUMENTS
// ============================================================================

/// Static mapping from name fragments to downloaded fee documents.
/// A rule applies when the lower-cased name contains every `all_of` fragment
/// and none of the `none_of` fragments. First matching rule wins.
struct FeeDocument {
    all_of: &'static [&'static str],
    none_of: &'static [&'static str],
    path: &'static str,
}

const FEE_DOCUMENTS: &[FeeDocument] = &[
    FeeDocument { all_of: &["shelanti"], none_of: &[], path: "/fee-pdfs/Shelanti_2025_Fee_Structure.pdf" },
    FeeDocument { all_of: &["blouberg international"], none_of: &[], path: "/fee-pdfs/Blouberg_International_2023_Fees.pdf" },
    FeeDocument { all_of: &["kay-dee"], none_of: &[], path: "/fee-pdfs/KayDee_Special_Needs_2025_Fees.pdf" },
    FeeDocument { all_of: &["kaydee"], none_of: &[], path: "/fee-pdfs/KayDee_Special_Needs_2025_Fees.pdf" },
    FeeDocument { all_of: &["crossroads"], none_of: &[], path: "/fee-pdfs/Crossroads_School_2025_Fees.pdf" },
    FeeDocument { all_of: &["orion", "primary"], none_of: &[], path: "/fee-pdfs/Orion_College_Primary_2025_Fees.pdf" },
    FeeDocument { all_of: &["orion", "high"], none_of: &[], path: "/fee-pdfs/Orion_College_High_School_2025_Fees.pdf" },
    FeeDocument { all_of: &["orion"], none_of: &["primary", "high"], path: "/fee-pdfs/Orion_College_2025_Fees.txt" },
    FeeDocument { all_of: &["remedial school"], none_of: &[], path: "/fee-pdfs/Remedial_School_2025_Fees.pdf" },
    FeeDocument { all_of: &["tafelberg"], none_of: &[], path: "/fee-pdfs/Remedial_School_2025_Fees.pdf" },
    FeeDocument { all_of: &["browns"], none_of: &[], path: "/fee-pdfs/Browns_School_2025_Fees.txt" },
    FeeDocument { all_of: &["brown's"], none_of: &[], path: "/fee-pdfs/Browns_School_2025_Fees.txt" },
    FeeDocument { all_of: &["la vigne"], none_of: &[], path: "/fee-pdfs/La_Vigne_2025_Fees.txt" },
    FeeDocument { all_of: &["lavigne"], none_of: &[], path: "/fee-pdfs/La_Vigne_2025_Fees.txt" },
    FeeDocument { all_of: &["excelsior"], none_of: &[], path: "/fee-pdfs/Excelsior_Private_School_2025_Fees.txt" },
    FeeDocument { all_of: &["via nova"], none_of: &[], path: "/fee-pdfs/Via_Nova_School_2025_Fees.txt" },
    FeeDocument { all_of: &["oakley"], none_of: &[], path: "/fee-pdfs/Oakley_House_Prep_2025_Fees.pdf" },
];

/// Known fee document for a school name, if any
pub fn fee_document_for(name: &str) -> Option<&'static str> {
    let name = name.to_lowercase();
    FEE_DOCUMENTS
        .iter()
        .find(|doc| {
            doc.all_of.iter().all(|f| name.contains(f))
                && !doc.none_of.iter().any(|f| name.contains(f))
        })
        .map(|doc| doc.path)
}

// ============================================================================
// PARSE RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Split field count differs from the header's
    FieldCount { expected: usize, found: usize },
    /// Required name cell is blank
    MissingName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-indexed line in the source text
    pub line_number: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub schools: Vec<School>,
    pub skipped: Vec<SkippedRow>,
}

// ============================================================================
// PARSER
// ============================================================================

pub struct CatalogParser {
    delimiter: char,
    list_delimiter: char,
}

impl Default for CatalogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogParser {
    pub fn new() -> Self {
        CatalogParser {
            delimiter: ',',
            list_delimiter: ',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read and parse a dataset file. Only I/O failures are errors.
    pub fn parse_file(&self, path: &Path) -> Result<ParseOutcome> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        Ok(self.parse_str(&text))
    }

    /// Parse dataset text. Never fails: no header or no valid rows → empty outcome.
    pub fn parse_str(&self, text: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        // Spreadsheet "CSV UTF-8" exports start with a byte order mark
        let mut lines = text.trim_start_matches('\u{feff}').lines().enumerate();

        let header = match lines.by_ref().find(|(_, line)| !line.trim().is_empty()) {
            Some((_, line)) => self.split_line(line),
            None => return outcome,
        };
        let positions: HashMap<Column, usize> = header
            .iter()
            .enumerate()
            .filter_map(|(i, h)| Column::from_header(h).map(|c| (c, i)))
            .collect();

        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index + 1;
            let fields = self.split_line(line);

            if fields.len() != header.len() {
                debug!(
                    line_number,
                    expected = header.len(),
                    found = fields.len(),
                    "Skipping catalog row with mismatched field count"
                );
                outcome.skipped.push(SkippedRow {
                    line_number,
                    reason: SkipReason::FieldCount {
                        expected: header.len(),
                        found: fields.len(),
                    },
                });
                continue;
            }

            let row = Row {
                fields: &fields,
                positions: &positions,
            };
            match self.build_school(&row) {
                Some(school) => outcome.schools.push(school),
                None => {
                    debug!(line_number, "Skipping catalog row without a school name");
                    outcome.skipped.push(SkippedRow {
                        line_number,
                        reason: SkipReason::MissingName,
                    });
                }
            }
        }

        info!(
            parsed = outcome.schools.len(),
            skipped = outcome.skipped.len(),
            "Parsed school catalog"
        );
        outcome
    }

    /// Split one line on the delimiter, honouring quoted segments.
    /// Quote characters are dropped and each field is trimmed.
    pub fn split_line(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut inside_quotes = false;

        for c in line.chars() {
            if c == '"' {
                inside_quotes = !inside_quotes;
            } else if c == self.delimiter && !inside_quotes {
                fields.push(current.trim().to_string());
                current.clear();
            } else {
                current.push(c);
            }
        }
        fields.push(current.trim().to_string());

        fields
    }

    fn build_school(&self, row: &Row) -> Option<School> {
        let name = row.get(Column::SchoolName);
        if name.is_empty() {
            return None;
        }

        let fee_document_url = if parse_flag(row.get(Column::DocumentDownloaded)) {
            fee_document_for(name).map(str::to_string)
        } else {
            None
        };

        let mut school = School::new(name);
        school.address = non_empty(row.get(Column::Address));
        school.website = non_empty(row.get(Column::Website));
        school.phone_number = non_empty(row.get(Column::Phone));
        school.email = non_empty(row.get(Column::Email));
        school.distance_km = Some(parse_distance(row.get(Column::Distance)));
        school.tuition_range =
            format_tuition(row.get(Column::FeeAnnual), row.get(Column::FeeMonthly));
        school.fee_document_url = fee_document_url;
        school.special_needs_programs =
            split_list(row.get(Column::SpecialNeedsPrograms), self.list_delimiter);
        school.adhd_support = parse_flag(row.get(Column::AdhdSupport));
        school.autism_support = parse_tristate(row.get(Column::AutismSupport));
        school.has_on_site_therapists = parse_flag(row.get(Column::OnSiteTherapists));
        school.offers_iep = parse_flag(row.get(Column::Iep));
        school.has_sensory_friendly_facilities = parse_flag(row.get(Column::SensoryFacilities));
        school.educational_approach = row.get(Column::EducationalApproach).to_string();
        school.brief_description = row.get(Column::BriefDescription).to_string();
        school.enrollment_status = EnrollmentStatus::parse(row.get(Column::EnrollmentStatus));

        Some(school)
    }
}

/// One split data row viewed through the header's column positions
struct Row<'a> {
    fields: &'a [String],
    positions: &'a HashMap<Column, usize>,
}

impl Row<'_> {
    /// Cell text, empty when the column is not in the header
    fn get(&self, column: Column) -> &str {
        self.positions
            .get(&column)
            .and_then(|&i| self.fields.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}

// ============================================================================
// FIELD DERIVATIONS
// ============================================================================

/// "yes" / "true", case-insensitive
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value == "yes" || value == "true"
}

/// Blank cell → Unknown, affirmative → Yes, anything else → No
fn parse_tristate(value: &str) -> TriState {
    if value.trim().is_empty() {
        TriState::Unknown
    } else {
        TriState::from(parse_flag(value))
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn split_list(value: &str, delimiter: char) -> Vec<String> {
    value
        .split(delimiter)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Leading numeric prefix ("4.5 km" → 4.5); unparseable → 0
fn parse_distance(value: &str) -> f64 {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(value.len());

    value[..end]
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
        .map(|d| d.max(0.0))
        .unwrap_or(0.0)
}

fn is_fee_sentinel(value: &str) -> bool {
    value.is_empty() || value.to_lowercase().contains("contact")
}

/// "ANNUAL (MONTHLY per month)", "ANNUAL", or the contact sentinel
pub fn format_tuition(annual: &str, monthly: &str) -> String {
    if is_fee_sentinel(annual) {
        return CONTACT_FOR_FEES.to_string();
    }
    if is_fee_sentinel(monthly) {
        annual.to_string()
    } else {
        format!("{} ({} per month)", annual, monthly)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "School Name,Address,Phone,Email,Website,Distance from Parklands (km),Grade 3 Fee Annual,Grade 3 Fee Monthly,Tuition Fee Link,PDF Downloaded,Grade Range,Special Needs Programs,ADHD Support,Autism Support,On-Site Therapists,IEP/ISP Offered,Sensory Facilities,Educational Approach,Brief Description,Enrollment Status";

    fn sample() -> String {
        [
            HEADER,
            r#"Browns School,"12 Main Rd, Parklands",021 555 0101,info@browns.co.za,https://browns.co.za,3.2,"R98,400","R9,840",https://browns.co.za/fees,Yes,Gr R-12,"Remedial, OT, Speech",Yes,Yes,Yes,Yes,No,Remedial,Small remedial school,Waitlist"#,
            r#"Shelanti Primary,"4 Sea Rd, Blouberg",,,,not known,Contact for fees,,,No,Gr 1-7,,no,,No,TRUE,yes,Mainstream Inclusion,Inclusive primary,"#,
            "Broken Row,only,three",
            "",
            r#","no name",,,,1,,,,,,,,,,,,,,"#,
        ]
        .join("\n")
    }

    #[test]
    fn test_column_lookup() {
        assert_eq!(Column::from_header(" School Name "), Some(Column::SchoolName));
        assert_eq!(Column::from_header("IEP/ISP Offered"), Some(Column::Iep));
        assert_eq!(Column::from_header("Unknown Column"), None);
    }

    #[test]
    fn test_split_line_honours_quotes() {
        let parser = CatalogParser::new();
        let fields = parser.split_line(r#"a,"b, c",d"#);
        assert_eq!(fields, vec!["a", "b, c", "d"]);
    }

    #[test]
    fn test_split_line_trims_and_keeps_empty() {
        let parser = CatalogParser::new();
        assert_eq!(parser.split_line(" a ,, b "), vec!["a", "", "b"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let parser = CatalogParser::new().with_delimiter(';');
        assert_eq!(parser.split_line(r#"a;"b;c""#), vec!["a", "b;c"]);
    }

    #[test]
    fn test_parse_full_row() {
        let outcome = CatalogParser::new().parse_str(&sample());
        assert_eq!(outcome.schools.len(), 2);

        let browns = &outcome.schools[0];
        assert_eq!(browns.id, "browns-school");
        assert_eq!(browns.address.as_deref(), Some("12 Main Rd, Parklands"));
        assert_eq!(browns.distance_km, Some(3.2));
        assert_eq!(browns.tuition_range, "R98,400 (R9,840 per month)");
        assert_eq!(
            browns.fee_document_url.as_deref(),
            Some("/fee-pdfs/Browns_School_2025_Fees.txt")
        );
        assert_eq!(browns.special_needs_programs, vec!["Remedial", "OT", "Speech"]);
        assert!(browns.adhd_support);
        assert_eq!(browns.autism_support, TriState::Yes);
        assert!(browns.offers_iep);
        assert!(!browns.has_sensory_friendly_facilities);
        assert_eq!(browns.enrollment_status, EnrollmentStatus::Waitlist);
        assert!(browns.parent_testimonials.is_empty());
        assert_eq!((browns.lat, browns.lng), (0.0, 0.0));
    }

    #[test]
    fn test_parse_defaults_and_sentinels() {
        let outcome = CatalogParser::new().parse_str(&sample());
        let shelanti = &outcome.schools[1];

        assert_eq!(shelanti.tuition_range, CONTACT_FOR_FEES);
        assert_eq!(shelanti.distance_km, Some(0.0));
        // Flag not affirmative: no document even though the name is known
        assert!(shelanti.fee_document_url.is_none());
        assert!(shelanti.phone_number.is_none());
        assert!(shelanti.special_needs_programs.is_empty());
        assert!(!shelanti.adhd_support);
        assert_eq!(shelanti.autism_support, TriState::Unknown);
        assert!(shelanti.offers_iep);
        assert!(shelanti.has_sensory_friendly_facilities);
        assert_eq!(shelanti.enrollment_status, EnrollmentStatus::Open);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let outcome = CatalogParser::new().parse_str(&sample());
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(
            outcome.skipped[0],
            SkippedRow {
                line_number: 4,
                reason: SkipReason::FieldCount { expected: 20, found: 3 },
            }
        );
        assert_eq!(outcome.skipped[1].reason, SkipReason::MissingName);
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let text = "\u{feff}School Name,Address\nBrowns School,Parklands";
        let outcome = CatalogParser::new().parse_str(text);

        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.schools.len(), 1);
        assert_eq!(outcome.schools[0].name, "Browns School");
        assert_eq!(outcome.schools[0].address.as_deref(), Some("Parklands"));
    }

    #[test]
    fn test_leading_blank_lines_keep_line_numbers() {
        let text = "\n\nSchool Name,Address\nBrowns School,Parklands\nbroken";
        let outcome = CatalogParser::new().parse_str(text);

        assert_eq!(outcome.schools.len(), 1);
        assert_eq!(
            outcome.skipped,
            vec![SkippedRow {
                line_number: 5,
                reason: SkipReason::FieldCount { expected: 2, found: 1 },
            }]
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = CatalogParser::new();
        let first = parser.parse_str(&sample());
        let second = parser.parse_str(&sample());
        assert_eq!(first.schools, second.schools);
    }

    #[test]
    fn test_empty_inputs() {
        let parser = CatalogParser::new();
        assert!(parser.parse_str("").schools.is_empty());
        assert!(parser.parse_str(HEADER).schools.is_empty());
    }

    #[test]
    fn test_missing_columns_use_defaults() {
        let text = "School Name,Colour\nLa Vigne,Blue";
        let outcome = CatalogParser::new().parse_str(text);
        let school = &outcome.schools[0];

        assert_eq!(school.name, "La Vigne");
        assert_eq!(school.tuition_range, CONTACT_FOR_FEES);
        assert!(school.address.is_none());
        assert_eq!(school.autism_support, TriState::Unknown);
    }

    #[test]
    fn test_format_tuition() {
        assert_eq!(format_tuition("R85,000", "R8,500"), "R85,000 (R8,500 per month)");
        assert_eq!(format_tuition("R85,000", "Contact for fees"), "R85,000");
        assert_eq!(format_tuition("", "R8,500"), CONTACT_FOR_FEES);
        assert_eq!(format_tuition("Contact school", ""), CONTACT_FOR_FEES);
    }

    #[test]
    fn test_fee_document_lookup() {
        assert_eq!(
            fee_document_for("Orion College Primary"),
            Some("/fee-pdfs/Orion_College_Primary_2025_Fees.pdf")
        );
        assert_eq!(
            fee_document_for("Orion College"),
            Some("/fee-pdfs/Orion_College_2025_Fees.txt")
        );
        assert_eq!(
            fee_document_for("KAY-DEE Special Needs"),
            Some("/fee-pdfs/KayDee_Special_Needs_2025_Fees.pdf")
        );
        assert_eq!(fee_document_for("Unknown Academy"), None);
    }

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance("4.5"), 4.5);
        assert_eq!(parse_distance("4.5 km"), 4.5);
        assert_eq!(parse_distance("n/a"), 0.0);
        assert_eq!(parse_distance(""), 0.0);
    }

    #[test]
    fn test_parse_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample().as_bytes()).unwrap();

        let parser = CatalogParser::new();
        assert_eq!(parser.parse_file(file.path()).unwrap().schools.len(), 2);

        let err = parser.parse_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog file"));
    }
}
