use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::domain::{Lead, LeadStatus};

pub const EXPORT_COLUMNS: [&str; 11] = [
    "Name",
    "Email",
    "Phone",
    "City",
    "Loan Amount",
    "Status",
    "Source",
    "Assigned To",
    "Notes",
    "Created At",
    "Updated At",
];

pub const WORKSHEET_NAME: &str = "Leads";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "excel" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write spreadsheet: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("failed to flush export buffer: {0}")]
    Buffer(String),
}

/// Rendered file plus the name it should be downloaded as.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    /// Lead rows written, excluding the header.
    pub rows: usize,
}

pub fn render(format: ExportFormat, leads: &[Lead]) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => render_csv(leads),
        ExportFormat::Xlsx => render_xlsx(leads),
    }
}

pub fn render_csv(leads: &[Lead]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS)?;
    for lead in leads {
        writer.write_record(export_row(lead))?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Buffer(err.error().to_string()))
}

pub fn render_xlsx(leads: &[Lead]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(WORKSHEET_NAME)?;

    for (col, title) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (index, lead) in leads.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, value) in export_row(lead).iter().enumerate() {
            worksheet.write_string(row, col as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn export_row(lead: &Lead) -> [String; 11] {
    [
        lead.name.clone(),
        lead.email.clone(),
        lead.phone.clone(),
        lead.city.clone(),
        lead.loan_amount.map(format_currency).unwrap_or_default(),
        lead.status.label().to_string(),
        lead.source.clone(),
        lead.assigned_to.clone().unwrap_or_default(),
        lead.notes.clone().unwrap_or_default(),
        format_timestamp(&lead.created_at),
        format_timestamp(&lead.updated_at),
    ]
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Rupee amount with Indian digit grouping, e.g. `₹12,34,567.5`.
pub fn format_currency(amount: f64) -> String {
    let paise = (amount * 100.0).round() as u64;
    let rupees = paise / 100;
    let fraction = paise % 100;

    let mut rendered = format!("₹{}", group_indian(rupees));
    if fraction > 0 {
        let decimals = format!("{fraction:02}");
        rendered.push('.');
        rendered.push_str(decimals.trim_end_matches('0'));
    }
    rendered
}

fn group_indian(value: u64) -> String {
    let digits = value.to_string();
    if digits.len() <= 3 {
        return digits;
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

/// `leads[-<status>][-filtered]-YYYY-MM-DD.<ext>`
pub fn export_filename(
    status: Option<LeadStatus>,
    narrowed: bool,
    date: NaiveDate,
    format: ExportFormat,
) -> String {
    let mut name = String::from("leads");
    if let Some(status) = status {
        name.push('-');
        name.push_str(status.as_str());
    }
    if narrowed {
        name.push_str("-filtered");
    }
    format!(
        "{name}-{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::domain::LeadId;
    use chrono::TimeZone;

    fn lead(name: &str, city: &str, loan_amount: Option<f64>) -> Lead {
        let created = Utc.with_ymd_and_hms(2025, 7, 1, 4, 30, 0).unwrap();
        Lead {
            id: LeadId::generate(),
            name: name.to_string(),
            email: "lead@example.com".to_string(),
            phone: "9876543210".to_string(),
            city: city.to_string(),
            loan_amount,
            status: LeadStatus::Contacted,
            source: "widget".to_string(),
            assigned_to: Some("ravi".to_string()),
            notes: Some("said \"call back\"".to_string()),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn currency_uses_indian_grouping() {
        assert_eq!(format_currency(0.0), "₹0");
        assert_eq!(format_currency(999.0), "₹999");
        assert_eq!(format_currency(5000.0), "₹5,000");
        assert_eq!(format_currency(500000.0), "₹5,00,000");
        assert_eq!(format_currency(12345678.0), "₹1,23,45,678");
        assert_eq!(format_currency(1500.5), "₹1,500.5");
        assert_eq!(format_currency(1500.25), "₹1,500.25");
    }

    #[test]
    fn csv_has_fixed_header_and_one_row_per_lead() {
        let leads = vec![
            lead("Asha", "Pune", Some(250000.0)),
            lead("Rao, K.", "Mumbai", None),
        ];
        let bytes = render_csv(&leads).expect("renders");
        let text = String::from_utf8(bytes).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Name,Email,Phone,City,Loan Amount,Status,Source,Assigned To,Notes,Created At,Updated At")
        );
        assert_eq!(
            lines.next(),
            Some("Asha,lead@example.com,9876543210,Pune,\"₹2,50,000\",Contacted,widget,ravi,\"said \"\"call back\"\"\",2025-07-01T04:30:00Z,2025-07-01T04:30:00Z")
        );
        let second = lines.next().expect("second row");
        assert!(second.starts_with("\"Rao, K.\",lead@example.com"));
        assert!(second.contains(",Mumbai,,Contacted,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn csv_rows_parse_back_to_the_same_cells() {
        let leads = vec![lead("Line\nBreak", "Delhi", Some(10.0))];
        let bytes = render_csv(&leads).expect("renders");
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let records: Vec<csv::StringRecord> = reader
            .records()
            .collect::<Result<_, _>>()
            .expect("valid csv");
        assert_eq!(records.len(), 1);
        assert_eq!(&records[0][0], "Line\nBreak");
        assert_eq!(&records[0][4], "₹10");
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = render_xlsx(&[lead("Asha", "Pune", None)]).expect("renders");
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn filenames_reflect_status_and_narrowing() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 2).expect("valid date");
        assert_eq!(
            export_filename(None, false, date, ExportFormat::Csv),
            "leads-2025-07-02.csv"
        );
        assert_eq!(
            export_filename(Some(LeadStatus::Qualified), true, date, ExportFormat::Xlsx),
            "leads-qualified-filtered-2025-07-02.xlsx"
        );
    }
}
