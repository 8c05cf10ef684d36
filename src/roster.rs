// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, error};

use crate::config::DefaultsConfig;
use crate::error::ProvisionError;
use crate::mapping::split_list;

const SAM_COLUMNS: &[&str] = &["samaccountname", "sam"];
const DISPLAY_NAME_COLUMNS: &[&str] = &["displayname", "display"];
const GIVEN_NAME_COLUMNS: &[&str] = &["givenname", "given"];
const SURNAME_COLUMNS: &[&str] = &["surname", "sn"];
const UPN_COLUMNS: &[&str] = &["userprincipalname", "upn"];
const DEPARTMENT_COLUMNS: &[&str] = &["department"];
const USAGE_LOCATION_COLUMNS: &[&str] = &["usagelocation"];
const ROLES_COLUMNS: &[&str] = &["roles"];
const GROUPS_COLUMNS: &[&str] = &["groups"];
const LICENSES_COLUMNS: &[&str] = &["licenses"];

/// A normalized input row with every default filled in.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct UserRow {
    pub(crate) sam: String,
    pub(crate) display_name: String,
    pub(crate) given_name: String,
    pub(crate) surname: String,
    pub(crate) user_principal_name: String,
    pub(crate) mail_nickname: String,
    pub(crate) department: String,
    pub(crate) usage_location: String,
    pub(crate) roles: String,
    pub(crate) groups: Vec<String>,
    pub(crate) licenses: Vec<String>,
}

/// A row that could not be turned into a [`UserRow`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RejectedRow {
    pub(crate) line: u64,
    pub(crate) sam: String,
    pub(crate) display_name: String,
    pub(crate) reason: String,
}

pub(crate) type ParsedRow = Result<UserRow, RejectedRow>;

pub(crate) fn read_roster(
    csv_path: &Path,
    defaults: &DefaultsConfig,
) -> Result<Vec<ParsedRow>, ProvisionError> {
    let path_string = csv_path.display().to_string();
    debug!("Reading roster at: {path_string}");

    let file = File::open(csv_path).map_err(|e| ProvisionError::CsvInput {
        path: path_string.clone(),
        source: csv::Error::from(e),
    })?;

    parse_roster(file, defaults).map_err(|source| ProvisionError::CsvInput {
        path: path_string,
        source,
    })
}

pub(crate) fn parse_roster<R: Read>(
    reader: R,
    defaults: &DefaultsConfig,
) -> Result<Vec<ParsedRow>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: HashMap<String, usize> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, header)| (header.to_lowercase(), index))
        .collect();

    let mut rows = Vec::new();

    for (idx, result) in rdr.records().enumerate() {
        // header is line 1; quoted fields may span several physical lines
        let fallback_line = idx as u64 + 2;
        let position = match &result {
            Ok(record) => record.position(),
            Err(e) => e.position(),
        };
        let line = position.map_or(fallback_line, |position| position.line());

        let row = match result {
            Ok(record) => normalize(&Columns::new(&columns, &record), line, defaults),
            Err(e) => Err(RejectedRow {
                line,
                sam: String::new(),
                display_name: String::new(),
                reason: format!("Malformed CSV record on line {line}: {e}"),
            }),
        };

        if let Err(rejected) = &row {
            error!("{}", rejected.reason);
        }

        rows.push(row);
    }

    debug!("Parsed {} roster row(s)", rows.len());

    Ok(rows)
}

struct Columns<'a> {
    index: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl<'a> Columns<'a> {
    fn new(index: &'a HashMap<String, usize>, record: &'a csv::StringRecord) -> Self {
        Columns { index, record }
    }

    /// First non-empty value among the given header aliases.
    fn get(&self, aliases: &[&str]) -> String {
        aliases
            .iter()
            .filter_map(|alias| self.index.get(*alias))
            .filter_map(|position| self.record.get(*position))
            .find(|value| !value.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

fn normalize(columns: &Columns, line: u64, defaults: &DefaultsConfig) -> ParsedRow {
    let sam = columns.get(SAM_COLUMNS);
    let display_name = columns.get(DISPLAY_NAME_COLUMNS);
    let mut user_principal_name = columns.get(UPN_COLUMNS);

    if user_principal_name.is_empty() {
        if sam.is_empty() {
            return Err(RejectedRow {
                line,
                sam,
                display_name,
                reason: format!(
                    "Row on line {line} is missing both UserPrincipalName and sAMAccountName"
                ),
            });
        }
        user_principal_name = format!("{}@{}", sam, defaults.domain);
    }

    let mail_nickname = if sam.is_empty() {
        user_principal_name
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    } else {
        sam.to_lowercase()
    };

    let usage_location = match columns.get(USAGE_LOCATION_COLUMNS) {
        location if location.is_empty() => defaults.usage_location.clone(),
        location => location,
    };

    Ok(UserRow {
        given_name: columns.get(GIVEN_NAME_COLUMNS),
        surname: columns.get(SURNAME_COLUMNS),
        department: columns.get(DEPARTMENT_COLUMNS),
        roles: columns.get(ROLES_COLUMNS),
        groups: split_list(&columns.get(GROUPS_COLUMNS)),
        licenses: split_list(&columns.get(LICENSES_COLUMNS)),
        sam,
        display_name,
        user_principal_name,
        mail_nickname,
        usage_location,
    })
}
