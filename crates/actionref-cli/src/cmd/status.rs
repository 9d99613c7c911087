use crate::output::{print_json, print_table};
use actionref_core::{ActionDescriptor, ActionStatus};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatusRow<'a> {
    uses: &'a str,
    status: ActionStatus,
}

pub fn run(root: &Path, uses: &[String], json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let cache = super::open_cache(&config)?;
    let ctx = super::root_context(root);

    let rows: Vec<StatusRow> = uses
        .iter()
        .map(|u| StatusRow {
            uses: u,
            status: cache.status(&ActionDescriptor::parse(u), &ctx),
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    let table: Vec<Vec<String>> = rows
        .iter()
        .map(|r| vec![r.uses.to_string(), r.status.to_string()])
        .collect();
    print_table(&["USES", "STATUS"], &table);
    Ok(())
}
