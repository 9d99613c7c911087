use crate::output::{print_json, print_table};
use actionref_core::ActionDescriptor;
use std::path::Path;

pub fn run(root: &Path, uses: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let cache = super::open_cache(&config)?;
    let ctx = super::root_context(root);
    let descriptor = ActionDescriptor::parse(uses);

    let Some(manifest) = cache.manifest(&descriptor, &ctx) else {
        let status = cache.status(&descriptor, &ctx);
        anyhow::bail!("no manifest available for '{uses}' (status: {status})");
    };

    if json {
        return print_json(manifest.as_ref());
    }

    if manifest.inputs.is_empty() {
        println!("'{uses}' declares no inputs.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = manifest
        .inputs
        .iter()
        .map(|i| {
            vec![
                i.name.clone(),
                if i.required { "yes" } else { "no" }.to_string(),
                i.default.clone().unwrap_or_default(),
                i.deprecation_message.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["NAME", "REQUIRED", "DEFAULT", "DEPRECATED"], &rows);
    Ok(())
}
