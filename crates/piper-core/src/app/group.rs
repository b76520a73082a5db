//! GroupAttributes / GroupStack - 登録時だけ使う属性スタック
//!
//! `Piper::group` pushes attributes merged with the enclosing group, runs
//! the body and pops them again. Nothing here is consulted after boot.

use std::collections::BTreeMap;

use crate::domain::MiddlewareRef;

/// Attributes shared by the pipes of a group.
#[derive(Debug, Clone, Default)]
pub struct GroupAttributes {
    pub namespace: Option<String>,
    pub key: Option<String>,
    pub middleware: Vec<MiddlewareRef>,
    pub alias: Vec<String>,
    pub wheres: BTreeMap<String, String>,
}

impl GroupAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine an inner group's attributes with its parent's.
    ///
    /// - namespace: appended with `\`, or replaced when the inner one starts with `\`
    /// - key, alias: the inner value wins when present
    /// - middleware: parent first, then inner
    /// - where: merged, inner wins per placeholder
    pub fn merge(new: GroupAttributes, old: &GroupAttributes) -> GroupAttributes {
        let namespace = match (new.namespace, &old.namespace) {
            (Some(inner), Some(outer)) if !inner.starts_with('\\') => Some(format!(
                "{}\\{}",
                outer.trim_matches('\\'),
                inner.trim_matches('\\')
            )),
            (Some(inner), _) => Some(inner.trim_matches('\\').to_string()),
            (None, outer) => outer.clone(),
        };

        let mut middleware = old.middleware.clone();
        middleware.extend(new.middleware);

        let mut wheres = old.wheres.clone();
        wheres.extend(new.wheres);

        GroupAttributes {
            namespace,
            key: new.key.or_else(|| old.key.clone()),
            middleware,
            alias: if new.alias.is_empty() {
                old.alias.clone()
            } else {
                new.alias
            },
            wheres,
        }
    }
}

#[derive(Debug, Default)]
pub struct GroupStack {
    stack: Vec<GroupAttributes>,
}

impl GroupStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `attributes` merged with the current top.
    pub fn push(&mut self, attributes: GroupAttributes) {
        let merged = match self.stack.last() {
            Some(top) => GroupAttributes::merge(attributes, top),
            None => GroupAttributes::merge(attributes, &GroupAttributes::default()),
        };
        self.stack.push(merged);
    }

    pub fn pop(&mut self) -> Option<GroupAttributes> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&GroupAttributes> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> GroupAttributes {
        GroupAttributes::new()
    }

    #[test]
    fn namespaces_are_joined_with_backslashes() {
        let outer = GroupAttributes {
            namespace: Some("\\Bot".into()),
            ..attrs()
        };
        let inner = GroupAttributes {
            namespace: Some("Pipes\\".into()),
            ..attrs()
        };
        let merged = GroupAttributes::merge(inner, &GroupAttributes::merge(outer, &attrs()));
        assert_eq!(merged.namespace.as_deref(), Some("Bot\\Pipes"));
    }

    #[test]
    fn leading_backslash_resets_the_namespace() {
        let outer = GroupAttributes {
            namespace: Some("Bot".into()),
            ..attrs()
        };
        let inner = GroupAttributes {
            namespace: Some("\\Other".into()),
            ..attrs()
        };
        let merged = GroupAttributes::merge(inner, &outer);
        assert_eq!(merged.namespace.as_deref(), Some("Other"));
    }

    #[test]
    fn inner_scalars_win_and_lists_accumulate() {
        let outer = GroupAttributes {
            key: Some("text".into()),
            middleware: vec!["auth".into()],
            alias: vec!["hi".into()],
            wheres: BTreeMap::from([
                ("id".to_string(), "[0-9]+".to_string()),
                ("name".to_string(), "[a-z]+".to_string()),
            ]),
            ..attrs()
        };
        let inner = GroupAttributes {
            key: Some("trigger".into()),
            middleware: vec!["log".into()],
            wheres: BTreeMap::from([("name".to_string(), "bob".to_string())]),
            ..attrs()
        };

        let merged = GroupAttributes::merge(inner, &outer);
        assert_eq!(merged.key.as_deref(), Some("trigger"));
        assert_eq!(merged.middleware.len(), 2);
        assert!(matches!(&merged.middleware[0], MiddlewareRef::Named(n) if n == "auth"));
        assert_eq!(merged.alias, ["hi"]);
        assert_eq!(merged.wheres["id"], "[0-9]+");
        assert_eq!(merged.wheres["name"], "bob");
    }

    #[test]
    fn stack_merges_with_the_current_top() {
        let mut stack = GroupStack::new();
        stack.push(GroupAttributes {
            key: Some("text".into()),
            ..attrs()
        });
        stack.push(GroupAttributes {
            namespace: Some("Bot".into()),
            ..attrs()
        });

        let top = stack.top().unwrap();
        assert_eq!(top.key.as_deref(), Some("text"));
        assert_eq!(top.namespace.as_deref(), Some("Bot"));
        assert_eq!(stack.depth(), 2);

        stack.pop();
        stack.pop();
        assert!(stack.is_empty());
    }
}
