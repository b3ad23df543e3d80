use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::node::{join_name, MapNode, Node};

/// Structural limits of the remote store.
///
/// A tree that violates any limit is rejected at save time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of items in a single list-node.
    pub max_list_len: usize,
    /// Maximum number of scalar values (list items included) in one record.
    pub max_properties: usize,
    /// Maximum nesting depth of map-nodes.
    pub max_depth: usize,
    /// Maximum stored size of a single scalar value.
    pub max_value_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_list_len: 20_000,
            max_properties: 20_000,
            max_depth: 64,
            max_value_bytes: 1024 * 1024,
        }
    }
}

impl Limits {
    /// No limits at all.
    pub fn unlimited() -> Self {
        Self {
            max_list_len: usize::MAX,
            max_properties: usize::MAX,
            max_depth: usize::MAX,
            max_value_bytes: usize::MAX,
        }
    }

    /// Verify that a record tree fits within these limits.
    pub fn check(&self, root: &MapNode) -> TreeResult<()> {
        let mut properties = 0usize;
        self.check_map(root, "", 0, &mut properties)?;
        Ok(())
    }

    fn check_map(
        &self,
        node: &MapNode,
        path: &str,
        depth: usize,
        properties: &mut usize,
    ) -> TreeResult<()> {
        if depth > self.max_depth {
            return Err(exceeded(path, "depth", depth, self.max_depth));
        }
        if let Some(value) = node.value() {
            self.count_value(value.stored_len(), path, properties)?;
        }
        for (name, child) in node.children() {
            let child_path = join_name(path, name);
            match child {
                Node::Map(m) => self.check_map(m, &child_path, depth + 1, properties)?,
                Node::List(list) => {
                    if list.len() > self.max_list_len {
                        return Err(exceeded(
                            &child_path,
                            "list length",
                            list.len(),
                            self.max_list_len,
                        ));
                    }
                    for item in list.iter() {
                        self.check_map(item, &child_path, depth + 1, properties)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn count_value(&self, len: usize, path: &str, properties: &mut usize) -> TreeResult<()> {
        if len > self.max_value_bytes {
            return Err(exceeded(path, "value size", len, self.max_value_bytes));
        }
        *properties += 1;
        if *properties > self.max_properties {
            return Err(exceeded(
                path,
                "property count",
                *properties,
                self.max_properties,
            ));
        }
        Ok(())
    }
}

fn exceeded(path: &str, limit: &'static str, actual: usize, max: usize) -> TreeError {
    TreeError::LimitExceeded {
        path: path.to_string(),
        limit,
        actual,
        max,
    }
}
