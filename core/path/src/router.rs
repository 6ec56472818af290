// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Reverse URI matching across a set of templates.
//!
//! The REST transport registers every method binding here to decide
//! which method an incoming URI belongs to. Candidates are held in a
//! Vec in declaration order so the tie-break never depends on map
//! iteration order.

use crate::template::{Bindings, PathTemplate};

struct Entry {
    verb: String,
    template: PathTemplate,
}

/// Ordered collection of `(verb, template)` candidates.
#[derive(Default)]
pub struct TemplateSet {
    entries: Vec<Entry>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate; returns its index for later identification.
    pub fn add(&mut self, verb: &str, template: PathTemplate) -> usize {
        self.entries.push(Entry {
            verb: verb.to_ascii_uppercase(),
            template,
        });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match a URI path against all candidates with the given verb.
    ///
    /// Tie-break: longer literal prefix wins; among equals, fewer
    /// wildcards wins; among equals, the first declared wins.
    pub fn match_uri(&self, verb: &str, path: &str) -> Option<(usize, Bindings)> {
        let verb = verb.to_ascii_uppercase();
        let mut best: Option<(usize, Bindings, usize, usize)> = None;

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.verb != verb {
                continue;
            }
            let Some(bindings) = entry.template.matches(path) else {
                continue;
            };
            let prefix = entry.template.literal_prefix_len();
            let wildcards = entry.template.wildcard_count();
            let better = match &best {
                None => true,
                Some((_, _, best_prefix, best_wildcards)) => {
                    prefix > *best_prefix
                        || (prefix == *best_prefix && wildcards < *best_wildcards)
                }
            };
            if better {
                best = Some((index, bindings, prefix, wildcards));
            }
        }

        best.map(|(index, bindings, _, _)| (index, bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[(&str, &str)]) -> TemplateSet {
        let mut templates = TemplateSet::new();
        for (verb, pattern) in patterns {
            templates.add(verb, PathTemplate::new(pattern).unwrap());
        }
        templates
    }

    #[test]
    fn test_match_by_verb() {
        let templates = set(&[
            ("GET", "/v1/{name=projects/*}"),
            ("DELETE", "/v1/{name=projects/*}"),
        ]);
        let (index, _) = templates.match_uri("delete", "/v1/projects/p").unwrap();
        assert_eq!(index, 1);
        assert!(templates.match_uri("POST", "/v1/projects/p").is_none());
    }

    #[test]
    fn test_longer_literal_prefix_wins() {
        let templates = set(&[
            ("GET", "/v1/{name=**}"),
            ("GET", "/v1/projects/{project}"),
        ]);
        let (index, bindings) = templates.match_uri("GET", "/v1/projects/p").unwrap();
        assert_eq!(index, 1);
        assert_eq!(bindings.get("project"), Some("p"));
    }

    #[test]
    fn test_fewer_wildcards_wins() {
        let templates = set(&[
            ("GET", "/v1/{a=*}/{b=*}"),
            ("GET", "/v1/{name=**}"),
        ]);
        // Equal literal prefix, one wildcard beats two.
        let (index, bindings) = templates.match_uri("GET", "/v1/x/y").unwrap();
        assert_eq!(index, 1);
        assert_eq!(bindings.get("name"), Some("x/y"));
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let templates = set(&[
            ("GET", "/v1/{a=*}/items"),
            ("GET", "/v1/{b=*}/items"),
        ]);
        let (index, bindings) = templates.match_uri("GET", "/v1/z/items").unwrap();
        assert_eq!(index, 0);
        assert_eq!(bindings.get("a"), Some("z"));
    }

    #[test]
    fn test_no_match() {
        let templates = set(&[("GET", "/v1/{name=projects/*}")]);
        assert!(templates.match_uri("GET", "/v2/projects/p").is_none());
    }

    #[test]
    fn test_binding_values_survive_reverse_match() {
        let templates = set(&[(
            "POST",
            "/v1/{parent=projects/*/locations/*}/pipelineJobs",
        )]);
        let (_, bindings) = templates
            .match_uri("POST", "/v1/projects/p/locations/us-central1/pipelineJobs")
            .unwrap();
        assert_eq!(bindings.get("parent"), Some("projects/p/locations/us-central1"));
    }
}
