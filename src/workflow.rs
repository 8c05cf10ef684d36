// Copyright (c) 2024 PostFinance AG
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info, warn};

use crate::cli::ProvisionArgs;
use crate::config::Config;
use crate::directory::{Directory, NewUser, PasswordProfile};
use crate::error::ProvisionError;
use crate::graph::GraphClient;
use crate::mapping::{describe_sku, read_mapping, Mapping};
use crate::password::generate_random_password;
use crate::report::{write_csv_report, write_json_report, ProvisionResult};
use crate::roster::{read_roster, ParsedRow, RejectedRow, UserRow};

/// Prefix of the identifiers fabricated for users that a what-if run would create.
pub(crate) const WHAT_IF_ID_PREFIX: &str = "whatif-";

pub(crate) fn provision_from_csv(
    provision_args: &ProvisionArgs,
    config: &Config,
) -> Result<(), ProvisionError> {
    debug!("Starting provisioning workflow");

    let mapping = match &provision_args.mapping_path {
        Some(mapping_path) => read_mapping(mapping_path)?,
        None => Mapping::default(),
    };
    let rows = read_roster(&provision_args.csv, &config.defaults)?;

    let graph = GraphClient::connect(config, provision_args.what_if)?;
    let results = provision_rows(
        &graph,
        &mapping,
        &rows,
        usize::from(provision_args.password_length),
    );

    write_csv_report(&results, &provision_args.report)?;
    write_json_report(&results, &provision_args.json)?;

    println!(
        "Successfully wrote reports '{}' and '{}'",
        provision_args.report.display(),
        provision_args.json.display()
    );

    Ok(())
}

/// What a single row asks for, after expanding its roles.
#[derive(Debug, PartialEq)]
pub(crate) struct RowPlan<'a> {
    pub(crate) row: &'a UserRow,
    pub(crate) entitlements: Vec<String>,
    pub(crate) group_names: BTreeSet<String>,
}

pub(crate) fn plan_row<'a>(mapping: &Mapping, row: &'a UserRow) -> RowPlan<'a> {
    let entitlements = mapping.expand_roles(&row.roles);
    let mut group_names = mapping.groups_for(&entitlements);
    group_names.extend(row.groups.iter().cloned());

    RowPlan {
        row,
        entitlements,
        group_names,
    }
}

/// Provisions every row in order and returns exactly one result per row.
pub(crate) fn provision_rows<D: Directory>(
    directory: &D,
    mapping: &Mapping,
    rows: &[ParsedRow],
    password_length: usize,
) -> Vec<ProvisionResult> {
    let plans: Vec<Result<RowPlan, &RejectedRow>> = rows
        .iter()
        .map(|row| row.as_ref().map(|user| plan_row(mapping, user)))
        .collect();

    let all_group_names: BTreeSet<String> = plans
        .iter()
        .flatten()
        .flat_map(|plan| plan.group_names.iter().cloned())
        .collect();
    let name_to_id = resolve_group_ids(directory, &all_group_names);

    let results: Vec<ProvisionResult> = plans
        .iter()
        .map(|plan| match plan {
            Ok(plan) => provision_row(directory, &name_to_id, plan, password_length),
            Err(rejected) => {
                debug!("Reporting rejected row from line {}", rejected.line);
                ProvisionResult {
                    sam: rejected.sam.clone(),
                    display: rejected.display_name.clone(),
                    what_if: directory.what_if(),
                    error: Some(rejected.reason.clone()),
                    ..Default::default()
                }
            }
        })
        .collect();

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let created = results.iter().filter(|r| r.created).count();
    info!(
        "Processed {} row(s): {} created, {} failed",
        results.len(),
        created,
        failed
    );

    results
}

/// Looks up each group name once. Names without a match map to `None`.
pub(crate) fn resolve_group_ids<D: Directory>(
    directory: &D,
    names: &BTreeSet<String>,
) -> BTreeMap<String, Option<String>> {
    let mut resolved = BTreeMap::new();

    for name in names {
        if name.trim().is_empty() {
            resolved.insert(name.clone(), None);
            continue;
        }

        let group_id = match directory.find_group_id(name) {
            Ok(Some(group_id)) => {
                debug!("Resolved group '{}' to '{}'", name, group_id);
                Some(group_id)
            }
            Ok(None) => {
                warn!("Group '{}' not found in tenant - skipping", name);
                None
            }
            Err(e) => {
                warn!("Failed to look up group '{}': {}", name, e);
                None
            }
        };

        resolved.insert(name.clone(), group_id);
    }

    resolved
}

fn provision_row<D: Directory>(
    directory: &D,
    name_to_id: &BTreeMap<String, Option<String>>,
    plan: &RowPlan,
    password_length: usize,
) -> ProvisionResult {
    let row = plan.row;
    let mut result = ProvisionResult {
        upn: row.user_principal_name.clone(),
        sam: row.sam.clone(),
        display: row.display_name.clone(),
        what_if: directory.what_if(),
        ..Default::default()
    };

    if let Err(e) = apply_plan(directory, name_to_id, plan, password_length, &mut result) {
        error!("Failed to provision '{}': {}", row.user_principal_name, e);
        result.error = Some(e.to_string());
    }

    result
}

// `result` is updated after every step so that a later failure still reports partial progress.
fn apply_plan<D: Directory>(
    directory: &D,
    name_to_id: &BTreeMap<String, Option<String>>,
    plan: &RowPlan,
    password_length: usize,
    result: &mut ProvisionResult,
) -> Result<(), ProvisionError> {
    let row = plan.row;
    debug!(
        "Provisioning '{}' with entitlements {:?}",
        row.user_principal_name, plan.entitlements
    );

    let group_ids: Vec<String> = plan
        .group_names
        .iter()
        .filter_map(|name| name_to_id.get(name).cloned().flatten())
        .collect();

    let user = ensure_user(directory, row, password_length)?;
    result.created = user.created;

    if !group_ids.is_empty() {
        result.groups_added = add_user_to_groups(directory, &user.id, &group_ids);
    }

    if !row.licenses.is_empty() {
        ensure_usage_location(directory, &user, row)?;
        result.licenses_assigned = assign_licenses(directory, &user.id, &row.licenses)?;
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
pub(crate) struct EnsuredUser {
    pub(crate) id: String,
    pub(crate) created: bool,
    pub(crate) usage_location: Option<String>,
}

/// Returns the existing user for the row's principal name, or creates it.
pub(crate) fn ensure_user<D: Directory>(
    directory: &D,
    row: &UserRow,
    password_length: usize,
) -> Result<EnsuredUser, ProvisionError> {
    let upn = &row.user_principal_name;

    if let Some(existing) = directory.find_user(upn)? {
        info!("User '{}' already exists", upn);
        return Ok(EnsuredUser {
            id: existing.id,
            created: false,
            usage_location: existing.usage_location,
        });
    }

    let new_user = NewUser {
        account_enabled: true,
        display_name: row.display_name.clone(),
        mail_nickname: row.mail_nickname.clone(),
        user_principal_name: upn.clone(),
        given_name: row.given_name.clone(),
        surname: row.surname.clone(),
        department: row.department.clone(),
        usage_location: row.usage_location.clone(),
        password_profile: PasswordProfile {
            force_change_password_next_sign_in: true,
            password: generate_random_password(password_length),
        },
    };

    let id = match directory.create_user(&new_user)? {
        Some(id) => {
            info!("Created user '{}'", upn);
            id
        }
        None => format!("{WHAT_IF_ID_PREFIX}{upn}"),
    };

    Ok(EnsuredUser {
        id,
        created: true,
        usage_location: Some(row.usage_location.clone()),
    })
}

// Licenses cannot be assigned to a user without a usage location.
fn ensure_usage_location<D: Directory>(
    directory: &D,
    user: &EnsuredUser,
    row: &UserRow,
) -> Result<(), ProvisionError> {
    let has_location = user
        .usage_location
        .as_deref()
        .is_some_and(|location| !location.trim().is_empty());

    if !has_location {
        info!(
            "Setting usage location '{}' on '{}' before license assignment",
            row.usage_location, row.user_principal_name
        );
        directory.update_usage_location(&user.id, &row.usage_location)?;
    }

    Ok(())
}

/// Adds the user to each group independently and returns the groups that succeeded.
pub(crate) fn add_user_to_groups<D: Directory>(
    directory: &D,
    user_id: &str,
    group_ids: &[String],
) -> Vec<String> {
    let mut added = Vec::new();

    for group_id in group_ids.iter().filter(|group_id| !group_id.is_empty()) {
        match directory.add_group_member(group_id, user_id) {
            Ok(()) => added.push(group_id.clone()),
            Err(e) => warn!("Adding '{}' to group {} failed: {}", user_id, group_id, e),
        }
    }

    added
}

/// Assigns the requested SKU part numbers that exist in the tenant with a single call.
///
/// A what-if run reports the full requested list once at least one part number resolved.
pub(crate) fn assign_licenses<D: Directory>(
    directory: &D,
    user_id: &str,
    sku_part_numbers: &[String],
) -> Result<Vec<String>, ProvisionError> {
    if sku_part_numbers.is_empty() {
        return Ok(Vec::new());
    }

    let subscribed = directory.subscribed_skus()?;
    let mut assigned = Vec::new();
    let mut sku_ids = Vec::new();

    for part_number in sku_part_numbers {
        match subscribed.get(part_number) {
            Some(_) if assigned.contains(part_number) => {}
            Some(sku_id) => {
                assigned.push(part_number.clone());
                sku_ids.push(sku_id.clone());
            }
            None => warn!(
                "SKU {} not found in tenant subscriptions",
                describe_sku(part_number)
            ),
        }
    }

    if sku_ids.is_empty() {
        return Ok(Vec::new());
    }

    directory.assign_licenses(user_id, &sku_ids)?;

    if directory.what_if() {
        let mut requested: Vec<String> = Vec::new();
        for part_number in sku_part_numbers {
            if !requested.contains(part_number) {
                requested.push(part_number.clone());
            }
        }
        return Ok(requested);
    }

    info!("Assigned licenses {:?} to '{}'", assigned, user_id);

    Ok(assigned)
}
