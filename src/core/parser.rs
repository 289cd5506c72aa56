use crate::domain::model::{EntityKind, EntityRequest, EntitySpec, SourceRecord, ValidationReason};
use crate::utils::error::{ImportError, Result};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::io::Read;

pub const COLUMN_TYPE: &str = "type";
pub const COLUMN_NAME: &str = "name";
pub const COLUMN_TIMEZONE: &str = "timezone";
pub const COLUMN_PARENT_DOMAIN_ID: &str = "parent_domain_id";
pub const COLUMN_CLIENT_ID: &str = "client_id";

/// Column order used for every file this crate writes.
pub const INPUT_COLUMNS: [&str; 5] = [
    COLUMN_TYPE,
    COLUMN_NAME,
    COLUMN_TIMEZONE,
    COLUMN_PARENT_DOMAIN_ID,
    COLUMN_CLIENT_ID,
];

/// Case-insensitive header name to column index.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    indices: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn from_headers<'a, I>(headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut indices = HashMap::new();
        for (index, header) in headers.into_iter().enumerate() {
            let key = header.trim().trim_start_matches('\u{feff}').to_lowercase();
            if key.is_empty() {
                continue;
            }
            // 重複欄位以第一個為準
            indices.entry(key).or_insert(index);
        }

        if indices.is_empty() {
            return Err(ImportError::InvalidHeader {
                message: "header row is empty".to_string(),
            });
        }

        Ok(Self { indices })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    /// `None` when the column is absent from the header; `Some("")` when
    /// present but blank in this row.
    fn field<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.indices
            .get(column)
            .map(|&index| row.get(index).unwrap_or("").trim())
    }

    fn source_record(&self, row: &StringRecord) -> SourceRecord {
        let value = |column: &str| self.field(row, column).unwrap_or("").to_string();
        SourceRecord {
            entity_type: value(COLUMN_TYPE),
            name: value(COLUMN_NAME),
            timezone: value(COLUMN_TIMEZONE),
            parent_domain_id: value(COLUMN_PARENT_DOMAIN_ID),
            client_id: value(COLUMN_CLIENT_ID),
        }
    }
}

/// A row that could not become an `EntityRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub source_line: usize,
    pub reason: ValidationReason,
    pub source: SourceRecord,
}

impl ValidationError {
    /// The kind the row claimed to be, if the `type` cell was recognizable.
    pub fn declared_kind(&self) -> Option<EntityKind> {
        EntityKind::parse(&self.source.entity_type)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.source_line, self.reason)
    }
}

impl std::error::Error for ValidationError {}

pub type ParsedRow = std::result::Result<EntityRequest, ValidationError>;

/// Every data row of one input file, in file order.
#[derive(Debug, Clone, Default)]
pub struct ParsedInput {
    pub rows: Vec<ParsedRow>,
}

impl ParsedInput {
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn valid(&self) -> impl Iterator<Item = &EntityRequest> {
        self.rows.iter().filter_map(|row| row.as_ref().ok())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &ValidationError> {
        self.rows.iter().filter_map(|row| row.as_ref().err())
    }

    pub fn split(self) -> (Vec<EntityRequest>, Vec<ValidationError>) {
        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        for row in self.rows {
            match row {
                Ok(request) => valid.push(request),
                Err(error) => rejected.push(error),
            }
        }
        (valid, rejected)
    }
}

fn required<'r>(
    header: &HeaderMap,
    row: &'r StringRecord,
    column: &'static str,
) -> std::result::Result<&'r str, ValidationReason> {
    match header.field(row, column) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationReason::MissingField(column)),
    }
}

fn validate(
    header: &HeaderMap,
    row: &StringRecord,
) -> std::result::Result<(String, EntitySpec), ValidationReason> {
    let raw_kind = header.field(row, COLUMN_TYPE).unwrap_or("");
    let kind = EntityKind::parse(raw_kind)
        .ok_or_else(|| ValidationReason::UnknownKind(raw_kind.to_string()))?;

    let name = match header.field(row, COLUMN_NAME) {
        None => return Err(ValidationReason::MissingField(COLUMN_NAME)),
        Some("") => return Err(ValidationReason::EmptyName),
        Some(name) => name.to_string(),
    };

    // 只取該種類需要的欄位，其他欄位即使有值也忽略
    let spec = match kind {
        EntityKind::Domain => EntitySpec::Domain {
            timezone: required(header, row, COLUMN_TIMEZONE)?.to_string(),
        },
        EntityKind::Subdomain => EntitySpec::Subdomain {
            parent_domain_ref: required(header, row, COLUMN_PARENT_DOMAIN_ID)?.to_string(),
        },
        EntityKind::Client => EntitySpec::Client,
        EntityKind::BusinessUnit => EntitySpec::BusinessUnit {
            client_ref: required(header, row, COLUMN_CLIENT_ID)?.to_string(),
        },
    };

    Ok((name, spec))
}

/// Turn one raw row into a validated request. Pure: no I/O, no logging.
pub fn parse_row(header: &HeaderMap, row: &StringRecord, source_line: usize) -> ParsedRow {
    let source = header.source_record(row);
    match validate(header, row) {
        Ok((name, spec)) => Ok(EntityRequest {
            name,
            spec,
            source_line,
            source,
        }),
        Err(reason) => Err(ValidationError {
            source_line,
            reason,
            source,
        }),
    }
}

/// Read a whole delimited file. Only a missing/empty header or an I/O
/// failure is fatal; every bad row becomes a `ValidationError`.
pub fn read_rows<R: Read>(reader: R, delimiter: u8) -> Result<ParsedInput> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header_record = csv_reader.byte_headers()?.clone();
    let header_record = StringRecord::from_byte_record(header_record).map_err(|e| {
        ImportError::InvalidHeader {
            message: format!("header is not valid UTF-8: {}", e),
        }
    })?;
    let header = HeaderMap::from_headers(header_record.iter())?;

    for column in [COLUMN_TYPE, COLUMN_NAME] {
        if !header.contains(column) {
            tracing::warn!(
                "⚠️ Header has no '{}' column; every row will fail validation",
                column
            );
        }
    }

    let mut rows = Vec::new();
    let mut record = ByteRecord::new();
    let mut index = 0usize;
    loop {
        let has_row = match csv_reader.read_byte_record(&mut record) {
            Ok(has_row) => has_row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                // 無法解析的列：記錄後繼續
                let source_line = e.position().map(|p| p.line() as usize).unwrap_or(index + 2);
                rows.push(Err(ValidationError {
                    source_line,
                    reason: ValidationReason::Malformed(e.to_string()),
                    source: SourceRecord::default(),
                }));
                index += 1;
                continue;
            }
        };
        if !has_row {
            break;
        }

        let source_line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);

        let parsed = match StringRecord::from_byte_record(record.clone()) {
            Ok(row) => parse_row(&header, &row, source_line),
            Err(e) => Err(ValidationError {
                source_line,
                reason: ValidationReason::Malformed(format!("invalid UTF-8: {}", e.utf8_error())),
                source: SourceRecord::default(),
            }),
        };

        if let Err(error) = &parsed {
            tracing::debug!("Row rejected: {}", error);
        }
        rows.push(parsed);
        index += 1;
    }

    tracing::debug!("Parsed {} data rows", rows.len());
    Ok(ParsedInput { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> HeaderMap {
        HeaderMap::from_headers(["Type", "NAME", "timezone", "parent_domain_id", "client_id"])
            .unwrap()
    }

    fn row(values: &[&str]) -> StringRecord {
        StringRecord::from(values.to_vec())
    }

    #[test]
    fn test_parse_domain_row() {
        let request = parse_row(
            &header(),
            &row(&["domain", " EMEA ", "Europe/Berlin", "ignored", "ignored"]),
            2,
        )
        .unwrap();

        assert_eq!(request.name, "EMEA");
        assert_eq!(request.source_line, 2);
        assert_eq!(
            request.spec,
            EntitySpec::Domain {
                timezone: "Europe/Berlin".to_string()
            }
        );
        assert_eq!(request.parent_ref(), None);
    }

    #[test]
    fn test_parse_subdomain_and_business_unit_rows() {
        let subdomain = parse_row(&header(), &row(&["SubDomain", "France", "", "EMEA", ""]), 3).unwrap();
        assert_eq!(subdomain.kind(), EntityKind::Subdomain);
        assert_eq!(subdomain.parent_ref(), Some("EMEA"));

        let unit = parse_row(&header(), &row(&["business_unit", "Legal", "", "", "c-42"]), 4).unwrap();
        assert_eq!(unit.kind(), EntityKind::BusinessUnit);
        assert_eq!(unit.parent_ref(), Some("c-42"));

        let client = parse_row(&header(), &row(&["client", "Acme", "UTC", "x", "y"]), 5).unwrap();
        assert_eq!(client.spec, EntitySpec::Client);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let error = parse_row(&header(), &row(&["project", "Foo", "", "", ""]), 7).unwrap_err();
        assert_eq!(error.source_line, 7);
        assert_eq!(error.reason, ValidationReason::UnknownKind("project".to_string()));
        assert_eq!(error.declared_kind(), None);
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let error = parse_row(&header(), &row(&["domain", "EMEA", "", "", ""]), 2).unwrap_err();
        assert_eq!(error.reason, ValidationReason::MissingField("timezone"));
        assert_eq!(error.declared_kind(), Some(EntityKind::Domain));

        let error = parse_row(&header(), &row(&["business_unit", "Legal", "", "", ""]), 3).unwrap_err();
        assert_eq!(error.reason, ValidationReason::MissingField("client_id"));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let error = parse_row(&header(), &row(&["client", "  ", "", "", ""]), 2).unwrap_err();
        assert_eq!(error.reason, ValidationReason::EmptyName);
    }

    #[test]
    fn test_missing_column_fails_rows_that_need_it() {
        let header = HeaderMap::from_headers(["type", "name"]).unwrap();

        assert!(parse_row(&header, &row(&["client", "Acme"]), 2).is_ok());
        let error = parse_row(&header, &row(&["domain", "EMEA"]), 3).unwrap_err();
        assert_eq!(error.reason, ValidationReason::MissingField("timezone"));
    }

    #[test]
    fn test_read_rows_with_custom_delimiter_and_extra_columns() {
        let input = "type;name;timezone;notes\n\
                     domain;EMEA;Europe/Berlin;first\n\
                     domain;APAC;;second\n\
                     client;Acme;;\n";

        let parsed = read_rows(input.as_bytes(), b';').unwrap();

        assert_eq!(parsed.total(), 3);
        assert_eq!(parsed.valid().count(), 2);
        let rejected: Vec<_> = parsed.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].source_line, 3);
        assert_eq!(rejected[0].source.name, "APAC");
    }

    #[test]
    fn test_read_rows_short_row_does_not_abort() {
        let input = "type,name,timezone\ndomain,EMEA\nclient,Acme,\n";

        let parsed = read_rows(input.as_bytes(), b',').unwrap();

        assert_eq!(parsed.total(), 2);
        let (valid, rejected) = parsed.split();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].source_line, 3);
        assert_eq!(rejected[0].reason, ValidationReason::MissingField("timezone"));
    }

    #[test]
    fn test_read_rows_empty_input_is_fatal() {
        let result = read_rows("".as_bytes(), b',');
        assert!(matches!(result, Err(ImportError::InvalidHeader { .. })));
    }
}
