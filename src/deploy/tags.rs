//! Tag reconciliation.
//!
//! Tag sync is best-effort relative to the workflow deployment: a failure to
//! list remote tags degrades to an empty mapping instead of aborting, and
//! failures on individual tags are isolated.

use crate::client::{resource_id, N8nApi};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of reconciling declared tag names against the remote collection.
#[derive(Debug, Default)]
pub struct TagSync {
    /// Declared tag name to remote ID, for translating workflow tag lists.
    pub name_to_id: BTreeMap<String, String>,
    /// Remote tags absent from the declaration, as `(id, name)`, to delete
    /// during the prune phase.
    pub prune: Vec<(String, String)>,
}

/// Diff declared tag names against the remote collection, creating missing
/// tags and returning the name-to-ID mapping.
pub fn reconcile_tags(client: &dyn N8nApi, declared: &[String], prune: bool) -> TagSync {
    println!("synchronizing tags...");
    let remote_tags = match client.list_tags() {
        Ok(tags) => tags,
        Err(err) => {
            tracing::warn!(error = %err, "could not fetch remote tags, continuing without tag sync");
            eprintln!("warning: could not fetch tags from n8n: {err}");
            return TagSync::default();
        }
    };
    println!("found {} remote tag(s)", remote_tags.len());

    let mut remote_by_name: BTreeMap<String, String> = BTreeMap::new();
    for tag in &remote_tags {
        if let (Some(id), Some(name)) = (resource_id(tag), tag_name(tag)) {
            remote_by_name.insert(name, id);
        }
    }

    let mut name_to_id = BTreeMap::new();
    for name in declared {
        if let Some(id) = remote_by_name.get(name) {
            println!("  tag '{name}' already exists (id {id})");
            name_to_id.insert(name.clone(), id.clone());
            continue;
        }
        match client.create_tag(name) {
            Ok(created) => match resource_id(&created) {
                Some(id) => {
                    println!("  created tag '{name}' (id {id})");
                    name_to_id.insert(name.clone(), id);
                }
                None => eprintln!("warning: created tag '{name}' but no ID was returned"),
            },
            Err(err) => eprintln!("warning: failed to create tag '{name}': {err}"),
        }
    }

    let prune_list = if prune {
        remote_tags
            .iter()
            .filter_map(|tag| {
                let id = resource_id(tag)?;
                let name = tag_name(tag)?;
                (!declared.contains(&name)).then_some((id, name))
            })
            .collect()
    } else {
        Vec::new()
    };

    TagSync {
        name_to_id,
        prune: prune_list,
    }
}

fn tag_name(tag: &Value) -> Option<String> {
    tag.get("name").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::FakeApi;
    use serde_json::json;

    #[test]
    fn creates_missing_tags_and_returns_mapping() {
        let client = FakeApi::new();
        let declared = vec!["prod".to_string()];
        let sync = reconcile_tags(&client, &declared, false);

        assert_eq!(sync.name_to_id.len(), 1);
        assert!(sync.name_to_id.contains_key("prod"));
        assert!(sync.prune.is_empty());
        assert_eq!(client.calls(), vec!["list_tags", "create_tag prod"]);
    }

    #[test]
    fn reuses_existing_remote_ids() {
        let mut client = FakeApi::new();
        client.remote_tags = vec![json!({"id": "t1", "name": "prod"})];
        let declared = vec!["prod".to_string()];
        let sync = reconcile_tags(&client, &declared, false);

        assert_eq!(sync.name_to_id["prod"], "t1");
        assert_eq!(client.calls(), vec!["list_tags"]);
    }

    #[test]
    fn listing_failure_degrades_to_empty_mapping() {
        let mut client = FakeApi::new();
        client.fail_list_tags = true;
        let declared = vec!["prod".to_string()];
        let sync = reconcile_tags(&client, &declared, true);

        assert!(sync.name_to_id.is_empty());
        assert!(sync.prune.is_empty());
        assert_eq!(client.calls(), vec!["list_tags"]);
    }

    #[test]
    fn undeclared_remote_tags_are_prune_candidates() {
        let mut client = FakeApi::new();
        client.remote_tags = vec![
            json!({"id": "t1", "name": "prod"}),
            json!({"id": "t2", "name": "stale"}),
        ];
        let declared = vec!["prod".to_string()];

        let sync = reconcile_tags(&client, &declared, true);
        assert_eq!(sync.prune, vec![("t2".to_string(), "stale".to_string())]);

        let sync = reconcile_tags(&client, &declared, false);
        assert!(sync.prune.is_empty());
    }
}
