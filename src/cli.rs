//! CLI command handlers.
//!
//! Each handler takes an opened [`Registry`] plus parsed arguments and
//! prints human-readable output; the binary owns argument parsing and exit
//! codes. Timestamps are Unix seconds throughout, with `0`/omitted meaning
//! "now" where a handler documents it.

use crate::models::{
    ComponentFilter, FlagFilter, ListRange, NameFilter, OrderBy, OrderDirection, Timestamp,
};
use crate::services::{Registry, TimeFilter};
use crate::{current_timestamp, RegistryConfig, Result};

/// Resolves an optional CLI time argument, defaulting to now.
fn time_or_now(time: Option<i64>) -> i64 {
    time.unwrap_or_else(current_timestamp)
}

fn stamp(time: Option<i64>, uid: &str, comments: Option<&str>) -> Timestamp {
    let mut stamp = Timestamp::new(time_or_now(time), uid);
    if let Some(comments) = comments {
        stamp = stamp.with_comments(comments);
    }
    stamp
}

/// `init`: creates the data directory and database file.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created.
pub fn cmd_init(config: RegistryConfig) -> Result<()> {
    let db_path = config.db_path();
    let registry = Registry::open(config)?;
    let stats = registry.stats()?;
    println!("initialized {}", db_path.display());
    println!(
        "{} vertices, {} edges",
        stats.vertex_count, stats.edge_count
    );
    Ok(())
}

/// `status`: prints aggregate store counts.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn cmd_status(registry: &Registry) -> Result<()> {
    let stats = registry.stats()?;
    println!(
        "vertices: {} ({} active)",
        stats.vertex_count, stats.active_vertex_count
    );
    println!(
        "edges:    {} ({} active)",
        stats.edge_count, stats.active_edge_count
    );
    Ok(())
}

/// `type add`: adds a component type.
///
/// # Errors
///
/// Returns an error on a duplicate name or store failure.
pub fn cmd_type_add(registry: &Registry, name: &str, comments: &str) -> Result<()> {
    let added = registry.catalog().add_component_type(name, comments)?;
    println!("added component type '{}'", added.name);
    Ok(())
}

/// `type list`: lists component types, optionally filtered by substring.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn cmd_type_list(registry: &Registry, name: Option<&str>, range: ListRange) -> Result<()> {
    let filter = name.map_or_else(NameFilter::default, NameFilter::containing);
    let types = registry.catalog().list_component_types(
        &filter,
        range,
        OrderBy::Name,
        OrderDirection::Ascending,
    )?;
    for component_type in &types {
        if component_type.comments.is_empty() {
            println!("{}", component_type.name);
        } else {
            println!("{}\t{}", component_type.name, component_type.comments);
        }
    }
    let total = registry.catalog().count_component_types(&filter)?;
    println!("{} of {total}", types.len());
    Ok(())
}

/// `component add`: adds a component of an existing type.
///
/// # Errors
///
/// Returns an error for an unknown type or version, or a duplicate name.
pub fn cmd_component_add(
    registry: &Registry,
    name: &str,
    type_name: &str,
    version: Option<&str>,
) -> Result<()> {
    let component = registry.components().add(name, type_name, version)?;
    match component.version {
        Some(ref v) => println!(
            "added component '{}' ({} / {})",
            component.name, component.component_type.name, v.name
        ),
        None => println!(
            "added component '{}' ({})",
            component.name, component.component_type.name
        ),
    }
    Ok(())
}

/// `component list`: lists components with optional name/type filters.
///
/// # Errors
///
/// Returns an error if a referenced type does not exist or the store fails.
pub fn cmd_component_list(
    registry: &Registry,
    name: Option<&str>,
    type_name: Option<&str>,
    range: ListRange,
) -> Result<()> {
    let filter = ComponentFilter {
        name: name.map(str::to_string),
        type_name: type_name.map(str::to_string),
        version_name: None,
    };
    let components = registry.components().list(
        &filter,
        range,
        OrderBy::Name,
        OrderDirection::Ascending,
    )?;
    for component in &components {
        let version = component
            .version
            .as_ref()
            .map_or(String::new(), |v| format!("\t{}", v.name));
        println!(
            "{}\t{}{version}",
            component.name, component.component_type.name
        );
    }
    let total = registry.components().count(&filter)?;
    println!("{} of {total}", components.len());
    Ok(())
}

/// `component show`: prints a point-in-time snapshot as JSON.
///
/// # Errors
///
/// Returns an error for an unknown component.
pub fn cmd_component_show(registry: &Registry, name: &str, at: Option<i64>) -> Result<()> {
    let snapshot = registry.components().snapshot(name, time_or_now(at))?;
    let rendered = serde_json::to_string_pretty(&snapshot).map_err(|e| {
        crate::Error::OperationFailed {
            operation: "render_snapshot".to_string(),
            cause: e.to_string(),
        }
    })?;
    println!("{rendered}");
    Ok(())
}

/// `connect`: opens a connection between two components.
///
/// # Errors
///
/// Returns an error on duplicate or overlapping intervals.
pub fn cmd_connect(
    registry: &Registry,
    a: &str,
    b: &str,
    start: Option<i64>,
    end: Option<i64>,
    uid: &str,
    comments: Option<&str>,
) -> Result<()> {
    let start = stamp(start, uid, comments);
    let end = end.map(|t| Timestamp::new(t, uid));
    registry.components().connect(a, b, start, end)?;
    println!("connected '{a}' and '{b}'");
    Ok(())
}

/// `disconnect`: closes the connection active at the given time.
///
/// # Errors
///
/// Returns an error if no connection is active at that time.
pub fn cmd_disconnect(
    registry: &Registry,
    a: &str,
    b: &str,
    end: Option<i64>,
    uid: &str,
    comments: Option<&str>,
) -> Result<()> {
    registry.components().disconnect(a, b, stamp(end, uid, comments))?;
    println!("disconnected '{a}' and '{b}'");
    Ok(())
}

/// `connections`: prints a component's connection history.
///
/// # Errors
///
/// Returns an error for an unknown component.
pub fn cmd_connections(registry: &Registry, name: &str, at: Option<i64>) -> Result<()> {
    let filter = at.map_or(TimeFilter::All, TimeFilter::At);
    for connection in registry.components().get_connections(name, filter, None)? {
        match connection.validity.end_time() {
            Some(end) => println!(
                "{}\t[{}, {end})",
                connection.peer_name,
                connection.validity.start_time()
            ),
            None => println!(
                "{}\t[{}, ...)",
                connection.peer_name,
                connection.validity.start_time()
            ),
        }
    }
    Ok(())
}

/// `property set`: records property values from the given start.
///
/// # Errors
///
/// Returns an error on validation or interval conflicts.
#[allow(clippy::too_many_arguments)]
pub fn cmd_property_set(
    registry: &Registry,
    component: &str,
    property_type: &str,
    values: Vec<String>,
    start: Option<i64>,
    end: Option<i64>,
    force: bool,
    uid: &str,
) -> Result<()> {
    let start = stamp(start, uid, None);
    let end = end.map(|t| Timestamp::new(t, uid));
    registry
        .properties()
        .set_property(component, property_type, values, start, end, force)?;
    println!("set '{property_type}' on '{component}'");
    Ok(())
}

/// `property unset`: closes the open interval of a property.
///
/// # Errors
///
/// Returns an error if the property is absent or already ended.
pub fn cmd_property_unset(
    registry: &Registry,
    component: &str,
    property_type: &str,
    end: Option<i64>,
    uid: &str,
) -> Result<()> {
    registry
        .properties()
        .unset_property(component, property_type, stamp(end, uid, None))?;
    println!("unset '{property_type}' on '{component}'");
    Ok(())
}

/// `property history`: prints a component's property intervals.
///
/// # Errors
///
/// Returns an error for an unknown component.
pub fn cmd_property_history(registry: &Registry, component: &str, at: Option<i64>) -> Result<()> {
    let filter = at.map_or(TimeFilter::All, TimeFilter::At);
    for assignment in registry.properties().get_properties(component, filter)? {
        let values = assignment.property.values.join(", ");
        match assignment.validity.end_time() {
            Some(end) => println!(
                "{}\t{values}\t[{}, {end})",
                assignment.property.property_type.name,
                assignment.validity.start_time()
            ),
            None => println!(
                "{}\t{values}\t[{}, ...)",
                assignment.property.property_type.name,
                assignment.validity.start_time()
            ),
        }
    }
    Ok(())
}

/// `flag add`: raises a flag over a window, attached to components.
///
/// # Errors
///
/// Returns an error for unknown types, severities, or components.
#[allow(clippy::too_many_arguments)]
pub fn cmd_flag_add(
    registry: &Registry,
    name: &str,
    flag_type: &str,
    severity: &str,
    components: &[String],
    start: Option<i64>,
    end: Option<i64>,
    comments: &str,
    uid: &str,
) -> Result<()> {
    let component_names: Vec<&str> = components.iter().map(String::as_str).collect();
    let start = stamp(start, uid, None);
    let end = end.map(|t| Timestamp::new(t, uid));
    registry.flags().add_flag(
        name,
        comments,
        start,
        end,
        flag_type,
        severity,
        &component_names,
    )?;
    println!("raised flag '{name}'");
    Ok(())
}

/// `flag end`: closes a flag's window.
///
/// # Errors
///
/// Returns an error if the flag is unknown or already ended.
pub fn cmd_flag_end(registry: &Registry, name: &str, end: Option<i64>, uid: &str) -> Result<()> {
    registry.flags().end_flag(name, stamp(end, uid, None))?;
    println!("ended flag '{name}'");
    Ok(())
}

/// `flag list`: lists flags with optional type/severity filters.
///
/// # Errors
///
/// Returns an error if a referenced type or severity does not exist.
pub fn cmd_flag_list(
    registry: &Registry,
    type_name: Option<&str>,
    severity: Option<&str>,
    range: ListRange,
) -> Result<()> {
    let filter = FlagFilter {
        name: None,
        type_name: type_name.map(str::to_string),
        severity_name: severity.map(str::to_string),
    };
    let flags = registry.flags().list(
        &filter,
        range,
        OrderBy::Name,
        OrderDirection::Ascending,
    )?;
    for flag in &flags {
        let window = match flag.window.end_time() {
            Some(end) => format!("[{}, {end})", flag.window.start.time),
            None => format!("[{}, ...)", flag.window.start.time),
        };
        println!(
            "{}\t{}\t{}\t{window}",
            flag.name, flag.flag_type.name, flag.severity.name
        );
    }
    let total = registry.flags().count(&filter)?;
    println!("{} of {total}", flags.len());
    Ok(())
}
