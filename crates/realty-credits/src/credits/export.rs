use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AiTool, AiToolTransaction, TransactionId, TransactionStatus, UserId};

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Row { line: u64, message: String },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io(err) => write!(f, "failed to access usage export: {}", err),
            ExportError::Csv(err) => write!(f, "invalid usage CSV data: {}", err),
            ExportError::Row { line, message } => {
                write!(f, "invalid usage row on line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            ExportError::Csv(err) => Some(err),
            ExportError::Row { .. } => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    id: String,
    user_id: String,
    tool_name: String,
    credits_used: u64,
    created_at: String,
    status: String,
}

impl From<&AiToolTransaction> for LedgerRow {
    fn from(row: &AiToolTransaction) -> Self {
        Self {
            id: row.id.0.clone(),
            user_id: row.user_id.0.clone(),
            tool_name: row.tool_name.name().to_string(),
            credits_used: row.credits_used,
            created_at: row.created_at.to_rfc3339(),
            status: row.status.label().to_string(),
        }
    }
}

impl LedgerRow {
    fn into_transaction(self) -> Result<AiToolTransaction, String> {
        let tool_name = self
            .tool_name
            .parse::<AiTool>()
            .map_err(|err| err.to_string())?;
        let status = self.status.parse::<TransactionStatus>()?;
        let created_at = parse_timestamp(&self.created_at)
            .ok_or_else(|| format!("unrecognized timestamp '{}'", self.created_at))?;

        Ok(AiToolTransaction {
            id: TransactionId(self.id),
            user_id: UserId(self.user_id),
            tool_name,
            credits_used: self.credits_used,
            created_at,
            status,
        })
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn write_transactions<'a, W, I>(writer: W, rows: I) -> Result<(), ExportError>
where
    W: Write,
    I: IntoIterator<Item = &'a AiToolTransaction>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(LedgerRow::from(row))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the header even when there are no rows so downstream tools see the columns.
pub fn transactions_to_csv(rows: &[AiToolTransaction]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    if rows.is_empty() {
        let mut csv_writer = csv::Writer::from_writer(&mut buffer);
        csv_writer.write_record([
            "id",
            "user_id",
            "tool_name",
            "credits_used",
            "created_at",
            "status",
        ])?;
        csv_writer.flush()?;
    } else {
        write_transactions(&mut buffer, rows)?;
    }
    String::from_utf8(buffer).map_err(|err| ExportError::Row {
        line: 0,
        message: err.to_string(),
    })
}

pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<AiToolTransaction>, ExportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for record in csv_reader.deserialize::<LedgerRow>() {
        let row = record?;
        // header occupies line 1
        let line = rows.len() as u64 + 2;
        let transaction = row
            .into_transaction()
            .map_err(|message| ExportError::Row { line, message })?;
        rows.push(transaction);
    }

    Ok(rows)
}

pub fn read_transactions_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<AiToolTransaction>, ExportError> {
    let file = std::fs::File::open(path)?;
    read_transactions(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn export_then_import_preserves_rows() {
        let row = AiToolTransaction {
            id: TransactionId("txn-000042".to_string()),
            user_id: UserId("agent-7".to_string()),
            tool_name: AiTool::SeoSchema,
            credits_used: 1,
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 15, 30, 0).unwrap(),
            status: TransactionStatus::Succeeded,
        };

        let csv = transactions_to_csv(std::slice::from_ref(&row)).expect("export");
        assert!(csv.starts_with("id,user_id,tool_name,credits_used,created_at,status"));

        let parsed = read_transactions(Cursor::new(csv.into_bytes())).expect("import");
        assert_eq!(parsed, vec![row]);
    }

    #[test]
    fn empty_export_still_has_header() {
        let csv = transactions_to_csv(&[]).expect("export");
        assert_eq!(
            csv.trim_end(),
            "id,user_id,tool_name,credits_used,created_at,status"
        );
    }

    #[test]
    fn import_reports_line_of_bad_tool() {
        let data = "id,user_id,tool_name,credits_used,created_at,status\n\
                    t1,u1,resume_builder,5,2025-01-02,succeeded\n\
                    t2,u1,floor_planner,3,2025-01-02,succeeded\n";

        match read_transactions(Cursor::new(data)) {
            Err(ExportError::Row { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("floor_planner"));
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }
}
