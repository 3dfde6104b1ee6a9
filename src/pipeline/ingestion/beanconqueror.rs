//! Beanconqueror export decoding.
//!
//! The app exports its database as a ZIP archive holding one JSON document
//! with a table per entity. Brews reference beans, grinders (`MILL`) and
//! preparation methods by UUID; the UUID and modification time of every entry
//! live in its nested `config` object.

use serde_json::Value;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{info, warn};
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::{PipelineError, Result};
use crate::pipeline::processing::normalize::IdentifierLookup;
use crate::types::{Batch, Cell, Column};

const UUID_PATH: &str = "config.uuid";
const UPDATED_AT_PATH: &str = "config.unix_timestamp";

/// (output column, path inside an entry)
type FieldSpec = (&'static str, &'static str);

const BEAN_FIELDS: &[FieldSpec] = &[
    ("name", "name"),
    ("roaster", "roaster"),
    ("uuid", UUID_PATH),
    ("roast", "roast"),
    ("bean_mix", "beanMix"),
    ("decaffeinated", "decaffeinated"),
    ("bean_roasting_type", "bean_roasting_type"),
    ("updated_at", UPDATED_AT_PATH),
];

const GRINDER_FIELDS: &[FieldSpec] = &[
    ("name", "name"),
    ("uuid", UUID_PATH),
    ("updated_at", UPDATED_AT_PATH),
];

const METHOD_FIELDS: &[FieldSpec] = &[
    ("name", "name"),
    ("uuid", UUID_PATH),
    ("type", "type"),
    ("style_type", "style_type"),
    ("updated_at", UPDATED_AT_PATH),
];

const TOOL_FIELDS: &[FieldSpec] = &[
    ("name", "name"),
    ("uuid", UUID_PATH),
    ("updated_at", UPDATED_AT_PATH),
];

const BREW_FIELDS: &[FieldSpec] = &[
    ("uuid", UUID_PATH),
    ("updated_at", UPDATED_AT_PATH),
    ("grind_size", "grind_size"),
    ("grind_weight", "grind_weight"),
    ("method_of_preparation", "method_of_preparation"),
    ("mill", "mill"),
    ("bean", "bean"),
    ("brew_temperature", "brew_temperature"),
    ("brew_time", "brew_time"),
    ("note", "note"),
    ("rating", "rating"),
    ("coffee_first_drip_time", "coffee_first_drip_time"),
    ("coffee_blooming_time", "coffee_blooming_time"),
    ("brew_beverage_quantity", "brew_beverage_quantity"),
    ("brew_beverage_quantity_type", "brew_beverage_quantity_type"),
    ("method_of_preparation_tools", "method_of_preparation_tools"),
    ("favourite", "favourite"),
    ("best_brew", "best_brew"),
];

/// Decoded Beanconqueror database
#[derive(Debug, Clone, Default)]
pub struct BeanconquerorExport {
    /// Brews joined with their bean, grinder and method
    pub logs: Batch,
    /// beans, grinders, methods, method_tools and brews as exported
    pub tables: Vec<(String, Batch)>,
    /// Preparation tool UUID → tool name
    pub lookup: IdentifierLookup,
}

pub fn read_archive(bytes: &[u8], member: &str) -> Result<BeanconquerorExport> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive.by_name(member)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    info!("Unzipped {} ({} bytes)", member, contents.len());

    let json: Value = serde_json::from_str(&contents)?;
    extract_export(&json)
}

pub fn extract_export(json: &Value) -> Result<BeanconquerorExport> {
    let beans = entries(json, "BEANS")?;
    let grinders = entries(json, "MILL")?;
    let methods = entries(json, "PREPARATION")?;
    let brews = entries(json, "BREWS")?;

    let mut tool_rows: Vec<(&Value, String)> = Vec::new();
    for method in methods {
        let method_name = field(method, "name").to_string();
        let tools = method.get("tools").and_then(Value::as_array);
        for tool in tools.into_iter().flatten() {
            tool_rows.push((tool, method_name.clone()));
        }
    }

    let mut lookup = IdentifierLookup::new();
    for (tool, _) in &tool_rows {
        let id = field(tool, UUID_PATH).to_string();
        match Uuid::parse_str(&id) {
            Ok(uuid) => lookup.insert(uuid, field(tool, "name").to_string()),
            Err(_) => warn!("Skipping preparation tool with malformed uuid {:?}", id),
        }
    }

    let mut method_tools = flatten(tool_rows.iter().map(|(tool, _)| *tool), TOOL_FIELDS)?;
    method_tools.push_column(Column::new(
        "preparation_method_name",
        tool_rows.iter().map(|(_, m)| Cell::text(m.as_str())).collect(),
    ))?;

    let logs = join_brews(beans, grinders, methods, brews)?;

    let tables = vec![
        ("beans".to_string(), flatten(beans.iter(), BEAN_FIELDS)?),
        ("grinders".to_string(), flatten(grinders.iter(), GRINDER_FIELDS)?),
        ("methods".to_string(), flatten(methods.iter(), METHOD_FIELDS)?),
        ("method_tools".to_string(), method_tools),
        ("brews".to_string(), flatten(brews.iter(), BREW_FIELDS)?),
    ];

    Ok(BeanconquerorExport {
        logs,
        tables,
        lookup,
    })
}

fn entries<'a>(json: &'a Value, table: &str) -> Result<&'a [Value]> {
    json.get(table)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| PipelineError::Source(format!("table {table} is missing or not a list")))
}

/// Follow a dotted path inside an entry
fn lookup_path<'a>(entry: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(entry, |value, key| value.get(key))
}

/// Cell for one field; lists of scalars are rendered comma-separated
fn field(entry: &Value, path: &str) -> Cell {
    match lookup_path(entry, path) {
        None => Cell::Null,
        Some(Value::Array(items)) => Cell::Text(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Some(value) => Cell::from_json(value),
    }
}

fn flatten<'a, I>(entries: I, fields: &[FieldSpec]) -> Result<Batch>
where
    I: Iterator<Item = &'a Value> + Clone,
{
    let columns = fields
        .iter()
        .map(|(name, path)| Column::new(*name, entries.clone().map(|e| field(e, path)).collect()))
        .collect();
    Ok(Batch::from_columns(columns)?)
}

fn index_by_uuid(entries: &[Value]) -> HashMap<String, &Value> {
    entries
        .iter()
        .filter_map(|e| lookup_path(e, UUID_PATH).and_then(Value::as_str).map(|id| (id.to_string(), e)))
        .collect()
}

/// Entity a joined log column is read from
#[derive(Debug, Clone, Copy)]
enum Part {
    Brew,
    Bean,
    Grinder,
    Method,
}

/// (output column, entity, path inside that entity)
const LOG_COLUMNS: &[(&str, Part, &str)] = &[
    ("uuid", Part::Brew, UUID_PATH),
    ("updated_at", Part::Brew, UPDATED_AT_PATH),
    ("grind_size", Part::Brew, "grind_size"),
    ("grind_weight", Part::Brew, "grind_weight"),
    ("method", Part::Method, "name"),
    ("grinder", Part::Grinder, "name"),
    ("roaster", Part::Bean, "roaster"),
    ("bean", Part::Bean, "name"),
    ("brew_temperature", Part::Brew, "brew_temperature"),
    ("brew_time", Part::Brew, "brew_time"),
    ("note", Part::Brew, "note"),
    ("rating", Part::Brew, "rating"),
    ("coffee_first_drip_time", Part::Brew, "coffee_first_drip_time"),
    ("coffee_blooming_time", Part::Brew, "coffee_blooming_time"),
    ("brew_beverage_quantity", Part::Brew, "brew_beverage_quantity"),
    ("brew_beverage_quantity_type", Part::Brew, "brew_beverage_quantity_type"),
    ("method_of_preparation_tools", Part::Brew, "method_of_preparation_tools"),
    ("favourite", Part::Brew, "favourite"),
    ("best_brew", Part::Brew, "best_brew"),
];

struct JoinedBrew<'a> {
    brew: &'a Value,
    bean: &'a Value,
    grinder: &'a Value,
    method: &'a Value,
}

impl<'a> JoinedBrew<'a> {
    fn part(&self, part: Part) -> &'a Value {
        match part {
            Part::Brew => self.brew,
            Part::Bean => self.bean,
            Part::Grinder => self.grinder,
            Part::Method => self.method,
        }
    }
}

/// Inner join of brews with their bean, grinder and method
fn join_brews(beans: &[Value], grinders: &[Value], methods: &[Value], brews: &[Value]) -> Result<Batch> {
    let beans = index_by_uuid(beans);
    let grinders = index_by_uuid(grinders);
    let methods = index_by_uuid(methods);

    let mut joined = Vec::new();
    let mut dropped = 0usize;
    for brew in brews {
        let reference = |path: &str| lookup_path(brew, path).and_then(Value::as_str).unwrap_or_default();
        match (
            beans.get(reference("bean")),
            grinders.get(reference("mill")),
            methods.get(reference("method_of_preparation")),
        ) {
            (Some(bean), Some(grinder), Some(method)) => joined.push(JoinedBrew {
                brew,
                bean: *bean,
                grinder: *grinder,
                method: *method,
            }),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!("Dropped {} brews without a matching bean, grinder or method", dropped);
    }

    let columns = LOG_COLUMNS
        .iter()
        .map(|(name, part, path)| {
            Column::new(*name, joined.iter().map(|row| field(row.part(*part), path)).collect())
        })
        .collect();
    Ok(Batch::from_columns(columns)?)
}
