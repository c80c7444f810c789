//! Naming Vocabularies
//!
//! Column and table name heuristics shared by role and pattern rules.
//! Compiled once per process; matching is case-insensitive.

use regex::Regex;
use std::sync::OnceLock;

use crate::graph::{Column, DataTypeCategory, Table};

pub struct Vocabulary {
    pub deletion_marker: Regex,
    pub deletion_actor: Regex,
    pub validity_start: Regex,
    pub validity_end: Regex,
    pub current_flag: Regex,
    pub version: Regex,
    pub discriminator: Regex,
    pub generic_reference: Regex,
    pub created_timestamp: Regex,
    pub updated_timestamp: Regex,
    pub change_actor: Regex,
    pub audit_action: Regex,
    pub audit_values: Regex,
    pub audit_table: Regex,
    pub fact_table: Regex,
    pub dimension_table: Regex,
    pub system_table: Regex,
    pub lookup_label: Regex,
    pub natural_key: Regex,
    pub eav_attribute: Regex,
    pub eav_value: Regex,
    pub json_catch_all: Regex,
}

impl Vocabulary {
    fn new() -> Self {
        Self {
            deletion_marker: Regex::new(r"^(is_)?(deleted|archived|removed)(_at|_on)?$").unwrap(),
            deletion_actor: Regex::new(r"^(deleted|archived|removed)_by(_id)?$").unwrap(),
            validity_start: Regex::new(
                r"^((valid|effective|active)_(from|start|since)(_date|_at|_ts)?|start_date|effective_date|begin_date)$",
            )
            .unwrap(),
            validity_end: Regex::new(
                r"^((valid|effective|active)_(to|until|end|thru|through)(_date|_at|_ts)?|end_date|expiry_date|expiration_date)$",
            )
            .unwrap(),
            current_flag: Regex::new(r"^(is_)?(current|latest)(_flag|_row|_version)?$").unwrap(),
            version: Regex::new(r"^(row_)?version(_number|_no|_num)?$").unwrap(),
            discriminator: Regex::new(r"^(?:(?P<prefix>[a-z0-9_]+?)_)?(?:type|kind)$").unwrap(),
            generic_reference: Regex::new(
                r"^(target|object|entity|resource|subject|owner|item|record|source|reference|ref)_id$",
            )
            .unwrap(),
            created_timestamp: Regex::new(
                r"^((created|inserted|creation)(_at|_on|_date|_time|_ts)?|date_created|create_time)$",
            )
            .unwrap(),
            updated_timestamp: Regex::new(
                r"^((updated|modified|changed|last_modified|last_updated)(_at|_on|_date|_time|_ts)?|date_modified|update_time)$",
            )
            .unwrap(),
            change_actor: Regex::new(r"^(created|updated|modified|changed)_by(_id)?$").unwrap(),
            audit_action: Regex::new(r"^(action|operation|op|event_type|change_type|event_name)$").unwrap(),
            audit_values: Regex::new(r"^(old|new|before|after|previous)_(values?|data|row|state)$").unwrap(),
            audit_table: Regex::new(r"(^audit_|_(log|logs|audit|audits|history|events)$)").unwrap(),
            fact_table: Regex::new(r"(^fact_|_facts?$)").unwrap(),
            dimension_table: Regex::new(r"(^dim_|_(dim|dimension)$)").unwrap(),
            system_table: Regex::new(
                r"^(schema_migrations|ar_internal_metadata|flyway_schema_history|_sqlx_migrations|__diesel_schema_migrations|alembic_version|django_migrations|django_session|django_content_type|knex_migrations|knex_migrations_lock|goose_db_version|spatial_ref_sys)$",
            )
            .unwrap(),
            lookup_label: Regex::new(r"^(code|name|label|title|description|slug|abbreviation|symbol)$").unwrap(),
            natural_key: Regex::new(r"^(.+_)?(code|key|number|no|sku|isbn|slug|ref)$").unwrap(),
            eav_attribute: Regex::new(r"^(attribute|attr|key|property|field)(_name|_key|_id)?$").unwrap(),
            eav_value: Regex::new(r"^(value|val|attribute_value|property_value)(_text|_string)?$").unwrap(),
            json_catch_all: Regex::new(
                r"^(data|payload|attributes|metadata|meta|properties|extra|settings|details|document|body)$",
            )
            .unwrap(),
        }
    }

    pub fn matches(pattern: &Regex, name: &str) -> bool {
        pattern.is_match(&name.to_lowercase())
    }
}

pub fn vocabulary() -> &'static Vocabulary {
    static VOCABULARY: OnceLock<Vocabulary> = OnceLock::new();
    VOCABULARY.get_or_init(Vocabulary::new)
}

/// First column whose name matches and whose category passes `accept`
pub fn find_column<'t>(
    table: &'t Table,
    pattern: &Regex,
    accept: impl Fn(DataTypeCategory) -> bool,
) -> Option<&'t Column> {
    table
        .columns
        .iter()
        .find(|c| Vocabulary::matches(pattern, &c.name) && accept(c.category()))
}

pub fn has_created_and_updated(table: &Table) -> bool {
    let vocab = vocabulary();
    let temporal = |c: DataTypeCategory| c.is_temporal();
    find_column(table, &vocab.created_timestamp, temporal).is_some()
        && find_column(table, &vocab.updated_timestamp, temporal).is_some()
}

/// Validity start/end column pair, both temporal
pub fn validity_range(table: &Table) -> Option<(&Column, &Column)> {
    let vocab = vocabulary();
    let temporal = |c: DataTypeCategory| c.is_temporal();
    let start = find_column(table, &vocab.validity_start, temporal)?;
    let end = find_column(table, &vocab.validity_end, temporal)?;
    Some((start, end))
}
