// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use log::{debug, warn};
use serde::Deserialize;

use crate::error::ProvisionError;

pub(crate) const LIST_SEPARATOR: char = ';';

lazy_static! {
    /// Friendly product names for common SKU part numbers, used for log output only.
    static ref KNOWN_SKUS: BTreeMap<&'static str, &'static str> = BTreeMap::from([
        ("ENTERPRISEPACK", "Office 365 E3"),
        ("SPE_E5", "Microsoft 365 E5"),
        ("EMS", "Enterprise Mobility + Security E3/E5"),
        ("BUSINESS_PREMIUM", "Microsoft 365 Business Premium"),
    ]);
}

/// Business role and entitlement tables. Loaded once at startup, read-only afterwards.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct Mapping {
    pub(crate) roles: BTreeMap<String, Vec<String>>,
    pub(crate) entitlement_groups: BTreeMap<String, Vec<String>>,
}

const DEFAULT_ROLES: &[(&str, &[&str])] = &[
    ("Engineer", &["MailUser", "TeamsUser", "SharePointReader"]),
    ("Analyst", &["MailUser", "TeamsUser", "SharePointContributor"]),
    ("Contractor", &["MailUser"]),
    (
        "Admin",
        &["MailUser", "TeamsUser", "SharePointAdmin", "GlobalReader"],
    ),
];

const DEFAULT_ENTITLEMENT_GROUPS: &[(&str, &[&str])] = &[
    ("MailUser", &["All Mail Users"]),
    ("TeamsUser", &["All Teams Users"]),
    ("SharePointReader", &["SharePoint Readers"]),
    ("SharePointContributor", &["SharePoint Contributors"]),
    ("SharePointAdmin", &["SharePoint Admins"]),
    ("GlobalReader", &["Global Readers"]),
];

impl Default for Mapping {
    fn default() -> Self {
        Mapping {
            roles: to_table(DEFAULT_ROLES),
            entitlement_groups: to_table(DEFAULT_ENTITLEMENT_GROUPS),
        }
    }
}

fn to_table(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(key, values)| {
            (
                key.to_string(),
                values.iter().map(|value| value.to_string()).collect(),
            )
        })
        .collect()
}

impl Mapping {
    /// Expands a `;`-delimited role list into the sorted, deduplicated entitlements it covers.
    ///
    /// Unknown roles are logged and skipped.
    pub(crate) fn expand_roles(&self, raw_roles: &str) -> Vec<String> {
        let mut entitlements = BTreeSet::new();

        for role in split_list(raw_roles) {
            match self.roles.get(&role) {
                Some(covered) => entitlements.extend(covered.iter().cloned()),
                None => warn!("Unknown business role '{}' - skipping", role),
            }
        }

        entitlements.into_iter().collect()
    }

    /// Group display names granted by the given entitlements.
    pub(crate) fn groups_for(&self, entitlements: &[String]) -> BTreeSet<String> {
        entitlements
            .iter()
            .filter_map(|entitlement| self.entitlement_groups.get(entitlement))
            .flatten()
            .cloned()
            .collect()
    }

    fn report_unmapped_entitlements(&self) {
        let unmapped: BTreeSet<&String> = self
            .roles
            .values()
            .flatten()
            .filter(|entitlement| !self.entitlement_groups.contains_key(*entitlement))
            .collect();

        for entitlement in unmapped {
            warn!(
                "Entitlement '{}' has no group mapping - it will not grant any membership",
                entitlement
            );
        }
    }
}

pub(crate) fn read_mapping(mapping_path: &Path) -> Result<Mapping, ProvisionError> {
    let path_string = mapping_path.display().to_string();
    debug!("Reading mapping at: {path_string}");

    let mapping_data =
        fs::read_to_string(mapping_path).map_err(|source| ProvisionError::MappingFile {
            path: path_string,
            source,
        })?;

    let mapping: Mapping = serde_yaml::from_str(&mapping_data)?;
    mapping.report_unmapped_entitlements();

    Ok(mapping)
}

/// Splits a `;`-delimited cell into its trimmed, non-empty tokens.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn describe_sku(part_number: &str) -> String {
    match KNOWN_SKUS.get(part_number) {
        Some(name) => format!("'{}' ({})", part_number, name),
        None => format!("'{}'", part_number),
    }
}
