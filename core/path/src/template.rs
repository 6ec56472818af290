// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Template compilation, formatting, parsing and matching.
//!
//! A template is compiled once into a flat list of segments; variables
//! (`{name=sub/pattern}`) span one or more contiguous segments. Matching
//! is a two-cursor walk: segments before a `**` are matched from the
//! left, segments after it from the right, and the `**` takes the
//! remaining middle. That realizes the greedy rule deterministically:
//! the `**` consumes the longest remainder that still lets the trailing
//! literal suffix match.

use crate::errors::{Result, TemplateError};

#[derive(Debug, Clone, PartialEq)]
enum SegKind {
    Literal(String),
    Star,
    DoubleStar,
}

#[derive(Debug, Clone)]
struct Seg {
    kind: SegKind,
    // Index into `vars` when this segment is part of a named binding.
    var: Option<usize>,
}

/// Ordered binding-name to value mapping captured from or supplied to a
/// template. Iteration follows insertion order; equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(String, String)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Bindings {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut bindings = Bindings::new();
        for (n, v) in pairs {
            bindings.insert(n, v);
        }
        bindings
    }
}

impl PartialEq for Bindings {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.entries.clone();
        let mut b = other.entries.clone();
        a.sort();
        b.sort();
        a == b
    }
}

impl Eq for Bindings {}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Seg>,
    vars: Vec<String>,
    verb: Option<String>,
    leading_slash: bool,
}

impl PathTemplate {
    /// Compile a pattern string.
    pub fn new(pattern: &str) -> Result<Self> {
        let raw = pattern.to_string();
        let (body, verb) = split_verb(pattern)?;

        let leading_slash = body.starts_with('/');
        let body = body.strip_prefix('/').unwrap_or(body);
        if body.is_empty() {
            return Err(TemplateError::InvalidTemplate(
                "template has no segments".to_string(),
            ));
        }

        let mut segments = Vec::new();
        let mut vars: Vec<String> = Vec::new();

        for token in split_segments(body)? {
            if let Some(inner) = token.strip_prefix('{') {
                let inner = inner.strip_suffix('}').ok_or_else(|| {
                    TemplateError::InvalidTemplate(format!("unterminated binding: {}", token))
                })?;
                let (name, sub) = match inner.split_once('=') {
                    Some((name, sub)) => (name, sub),
                    None => (inner, "*"),
                };
                if name.is_empty() {
                    return Err(TemplateError::InvalidTemplate(
                        "empty binding name".to_string(),
                    ));
                }
                if vars.iter().any(|v| v == name) {
                    return Err(TemplateError::InvalidTemplate(format!(
                        "duplicate binding name: {}",
                        name
                    )));
                }
                let var_index = vars.len();
                vars.push(name.to_string());
                for sub_token in sub.split('/') {
                    segments.push(Seg {
                        kind: seg_kind(sub_token)?,
                        var: Some(var_index),
                    });
                }
            } else {
                segments.push(Seg {
                    kind: seg_kind(&token)?,
                    var: None,
                });
            }
        }

        // At most one **, and only literals may follow it.
        let double_stars: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.kind == SegKind::DoubleStar)
            .map(|(i, _)| i)
            .collect();
        if double_stars.len() > 1 {
            return Err(TemplateError::InvalidTemplate(
                "more than one ** in template".to_string(),
            ));
        }
        if let Some(&d) = double_stars.first() {
            if segments[d + 1..]
                .iter()
                .any(|s| !matches!(s.kind, SegKind::Literal(_)))
            {
                return Err(TemplateError::InvalidTemplate(
                    "only literal segments may follow **".to_string(),
                ));
            }
        }

        Ok(Self {
            raw,
            segments,
            vars,
            verb: verb.map(str::to_string),
            leading_slash,
        })
    }

    /// The original pattern string.
    pub fn pattern(&self) -> &str {
        &self.raw
    }

    /// Binding names in declaration order.
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(String::as_str)
    }

    /// Number of wildcard segments (`*` and `**`), bound or not.
    pub fn wildcard_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| !matches!(s.kind, SegKind::Literal(_)))
            .count()
    }

    /// Length in segments of the leading run of literal segments.
    pub fn literal_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .take_while(|s| matches!(s.kind, SegKind::Literal(_)))
            .count()
    }

    /// Render the template with the supplied bindings.
    pub fn format(&self, bindings: &Bindings) -> Result<String> {
        // Validate each binding value against its sub-pattern so that
        // parse(format(b)) == b holds for every accepted input.
        let mut values: Vec<Option<&str>> = vec![None; self.vars.len()];
        for (i, name) in self.vars.iter().enumerate() {
            let value = bindings
                .get(name)
                .ok_or_else(|| TemplateError::MissingBinding(name.clone()))?;
            if value.is_empty() {
                return Err(TemplateError::EmptyBinding(name.clone()));
            }
            values[i] = Some(value);
        }

        let mut out = Vec::with_capacity(self.segments.len());
        let mut i = 0;
        while i < self.segments.len() {
            let seg = &self.segments[i];
            match (&seg.kind, seg.var) {
                (SegKind::Literal(lit), None) => {
                    out.push(lit.clone());
                    i += 1;
                }
                (_, None) => return Err(TemplateError::UnboundWildcard),
                (_, Some(var_index)) => {
                    // Consume the whole span of this variable at once.
                    let span_end = self.var_span_end(i, var_index);
                    let value = values[var_index].expect("validated above");
                    self.check_var_value(i, span_end, var_index, value)?;
                    out.push(value.to_string());
                    i = span_end;
                }
            }
        }

        let mut rendered = out.join("/");
        if self.leading_slash {
            rendered.insert(0, '/');
        }
        if let Some(verb) = &self.verb {
            rendered.push(':');
            rendered.push_str(verb);
        }
        Ok(rendered)
    }

    /// Match a path, returning the captured bindings.
    pub fn matches(&self, path: &str) -> Option<Bindings> {
        let path = match &self.verb {
            Some(verb) => {
                let suffix = format!(":{}", verb);
                path.strip_suffix(suffix.as_str())?
            }
            None => path,
        };
        let path = if self.leading_slash {
            path.strip_prefix('/')?
        } else {
            if path.starts_with('/') {
                return None;
            }
            path
        };

        let parts: Vec<&str> = path.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        let double_star = self
            .segments
            .iter()
            .position(|s| s.kind == SegKind::DoubleStar);

        let mut captures: Vec<Vec<&str>> = vec![Vec::new(); self.vars.len()];

        match double_star {
            None => {
                if parts.len() != self.segments.len() {
                    return None;
                }
                for (seg, part) in self.segments.iter().zip(parts.iter()) {
                    match_one(seg, part, &mut captures)?;
                }
            }
            Some(d) => {
                let suffix_len = self.segments.len() - d - 1;
                // ** matches one or more segments.
                if parts.len() < self.segments.len() {
                    return None;
                }
                for (seg, part) in self.segments[..d].iter().zip(parts.iter()) {
                    match_one(seg, part, &mut captures)?;
                }
                let tail_start = parts.len() - suffix_len;
                for (seg, part) in self.segments[d + 1..].iter().zip(parts[tail_start..].iter()) {
                    match_one(seg, part, &mut captures)?;
                }
                let middle = &parts[d..tail_start];
                if middle.is_empty() {
                    return None;
                }
                if let Some(var_index) = self.segments[d].var {
                    captures[var_index].extend_from_slice(middle);
                }
            }
        }

        let mut bindings = Bindings::new();
        for (name, parts) in self.vars.iter().zip(captures) {
            bindings.insert(name.clone(), parts.join("/"));
        }
        Some(bindings)
    }

    /// Parse a resource name, failing with a typed error on mismatch.
    pub fn parse(&self, path: &str) -> Result<Bindings> {
        self.matches(path).ok_or_else(|| TemplateError::Mismatch {
            template: self.raw.clone(),
            path: path.to_string(),
        })
    }

    fn var_span_end(&self, start: usize, var_index: usize) -> usize {
        let mut end = start;
        while end < self.segments.len() && self.segments[end].var == Some(var_index) {
            end += 1;
        }
        end
    }

    fn check_var_value(
        &self,
        span_start: usize,
        span_end: usize,
        var_index: usize,
        value: &str,
    ) -> Result<()> {
        let name = &self.vars[var_index];
        let span = &self.segments[span_start..span_end];
        let single_star = span.len() == 1 && span[0].kind == SegKind::Star;
        if single_star {
            if value.contains('/') {
                return Err(TemplateError::SlashInBinding {
                    name: name.clone(),
                    value: value.to_string(),
                });
            }
            return Ok(());
        }

        // Multi-segment binding: the value must itself match the
        // sub-pattern, otherwise a later parse would split it differently.
        let sub = PathTemplate {
            raw: String::new(),
            segments: span.iter().map(|s| Seg { kind: s.kind.clone(), var: None }).collect(),
            vars: Vec::new(),
            verb: None,
            leading_slash: false,
        };
        if sub.matches(value).is_none() {
            return Err(TemplateError::Mismatch {
                template: self.raw.clone(),
                path: value.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_one<'a>(seg: &Seg, part: &'a str, captures: &mut [Vec<&'a str>]) -> Option<()> {
    match &seg.kind {
        SegKind::Literal(lit) => {
            if lit != part {
                return None;
            }
        }
        SegKind::Star => {}
        SegKind::DoubleStar => unreachable!("handled by the caller"),
    }
    if let Some(var_index) = seg.var {
        captures[var_index].push(part);
    }
    Some(())
}

fn seg_kind(token: &str) -> Result<SegKind> {
    match token {
        "" => Err(TemplateError::InvalidTemplate(
            "empty segment".to_string(),
        )),
        "*" => Ok(SegKind::Star),
        "**" => Ok(SegKind::DoubleStar),
        literal => {
            if literal.contains('{') || literal.contains('}') || literal.contains('*') {
                return Err(TemplateError::InvalidTemplate(format!(
                    "malformed segment: {}",
                    literal
                )));
            }
            Ok(SegKind::Literal(literal.to_string()))
        }
    }
}

/// Split the optional trailing `:verb` off the pattern.
fn split_verb(pattern: &str) -> Result<(&str, Option<&str>)> {
    let last_slash = pattern.rfind('/').map(|i| i + 1).unwrap_or(0);
    let last = &pattern[last_slash..];
    // The verb separator must sit outside any binding braces.
    if let Some(colon) = last.rfind(':') {
        if !last[colon..].contains('}') {
            let verb = &last[colon + 1..];
            if verb.is_empty() {
                return Err(TemplateError::InvalidTemplate(
                    "empty verb".to_string(),
                ));
            }
            return Ok((&pattern[..last_slash + colon], Some(verb)));
        }
    }
    Ok((pattern, None))
}

/// Split the template body into top-level segments, keeping `{...}`
/// groups (which may contain `/`) intact.
fn split_segments(body: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in body.chars() {
        match c {
            '{' => {
                depth += 1;
                if depth > 1 {
                    return Err(TemplateError::InvalidTemplate(
                        "nested binding braces".to_string(),
                    ));
                }
                current.push(c);
            }
            '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    TemplateError::InvalidTemplate("unbalanced '}'".to_string())
                })?;
                current.push(c);
            }
            '/' if depth == 0 => {
                segments.push(std::mem::take(&mut current));
                continue;
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(TemplateError::InvalidTemplate(
            "unbalanced '{'".to_string(),
        ));
    }
    segments.push(current);
    if segments.iter().any(|s| s.is_empty()) {
        return Err(TemplateError::InvalidTemplate(
            "empty segment".to_string(),
        ));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name_round_trip() {
        let template =
            PathTemplate::new("projects/{project}/locations/{location}/pipelineJobs/{pipeline_job}")
                .unwrap();
        let bindings = Bindings::from([
            ("project", "p-1"),
            ("location", "us-central1"),
            ("pipeline_job", "pj-xyz"),
        ]);

        let formatted = template.format(&bindings).unwrap();
        assert_eq!(
            formatted,
            "projects/p-1/locations/us-central1/pipelineJobs/pj-xyz"
        );
        assert_eq!(template.parse(&formatted).unwrap(), bindings);
    }

    #[test]
    fn test_format_missing_binding() {
        let template = PathTemplate::new("projects/{project}").unwrap();
        let err = template.format(&Bindings::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingBinding("project".to_string()));
    }

    #[test]
    fn test_format_empty_binding() {
        let template = PathTemplate::new("projects/{project}").unwrap();
        let err = template
            .format(&Bindings::from([("project", "")]))
            .unwrap_err();
        assert_eq!(err, TemplateError::EmptyBinding("project".to_string()));
    }

    #[test]
    fn test_format_rejects_slash_in_single_wildcard() {
        let template = PathTemplate::new("projects/{project}").unwrap();
        let err = template
            .format(&Bindings::from([("project", "a/b")]))
            .unwrap_err();
        assert!(matches!(err, TemplateError::SlashInBinding { .. }));
    }

    #[test]
    fn test_compound_binding() {
        let template = PathTemplate::new("/v1/{parent=projects/*/locations/*}/pipelineJobs").unwrap();
        let bindings = Bindings::from([("parent", "projects/p/locations/us-central1")]);
        assert_eq!(
            template.format(&bindings).unwrap(),
            "/v1/projects/p/locations/us-central1/pipelineJobs"
        );
        assert_eq!(
            template
                .matches("/v1/projects/p/locations/us-central1/pipelineJobs")
                .unwrap(),
            bindings
        );
    }

    #[test]
    fn test_compound_binding_value_must_match_subpattern() {
        let template = PathTemplate::new("/v1/{parent=projects/*/locations/*}/pipelineJobs").unwrap();
        let err = template
            .format(&Bindings::from([("parent", "projects/p")]))
            .unwrap_err();
        assert!(matches!(err, TemplateError::Mismatch { .. }));
    }

    #[test]
    fn test_verb_suffix() {
        let template =
            PathTemplate::new("/v1/{name=projects/*/locations/*/operations/*}:cancel").unwrap();
        let bindings = Bindings::from([("name", "projects/p/locations/l/operations/op-7")]);
        assert_eq!(
            template.format(&bindings).unwrap(),
            "/v1/projects/p/locations/l/operations/op-7:cancel"
        );
        assert_eq!(
            template
                .matches("/v1/projects/p/locations/l/operations/op-7:cancel")
                .unwrap(),
            bindings
        );
        assert!(
            template
                .matches("/v1/projects/p/locations/l/operations/op-7")
                .is_none()
        );
    }

    #[test]
    fn test_double_star_takes_longest_remainder() {
        let template = PathTemplate::new("{name=operations/**}/status").unwrap();
        let bindings = template
            .matches("operations/a/b/c/status")
            .unwrap();
        assert_eq!(bindings.get("name"), Some("operations/a/b/c"));
    }

    #[test]
    fn test_double_star_requires_at_least_one_segment() {
        let template = PathTemplate::new("{name=operations/**}").unwrap();
        assert!(template.matches("operations").is_none());
        assert_eq!(
            template.matches("operations/x").unwrap().get("name"),
            Some("operations/x")
        );
    }

    #[test]
    fn test_double_star_round_trip() {
        let template = PathTemplate::new("buckets/{bucket}/objects/{object=**}").unwrap();
        let bindings = Bindings::from([("bucket", "b"), ("object", "dir/sub/file.txt")]);
        let formatted = template.format(&bindings).unwrap();
        assert_eq!(formatted, "buckets/b/objects/dir/sub/file.txt");
        assert_eq!(template.parse(&formatted).unwrap(), bindings);
    }

    #[test]
    fn test_parse_mismatch_error() {
        let template = PathTemplate::new("projects/{project}").unwrap();
        let err = template.parse("tenants/t-1").unwrap_err();
        assert!(matches!(err, TemplateError::Mismatch { .. }));
    }

    #[test]
    fn test_empty_path_segment_rejected() {
        let template = PathTemplate::new("projects/{project}").unwrap();
        assert!(template.matches("projects//").is_none());
        assert!(template.matches("projects/").is_none());
    }

    #[test]
    fn test_invalid_templates() {
        for pattern in [
            "",
            "a//b",
            "projects/{project",
            "projects/{}",
            "a/{x=**}/{y=**}",
            "a/**/{x}",
            "a/{x={y}}",
            "a/b:",
            "pro*ject",
        ] {
            assert!(
                PathTemplate::new(pattern).is_err(),
                "pattern should be rejected: {}",
                pattern
            );
        }
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        assert!(PathTemplate::new("a/{x}/b/{x}").is_err());
    }

    #[test]
    fn test_unbound_wildcard_cannot_format() {
        let template = PathTemplate::new("projects/*/things/{thing}").unwrap();
        let err = template
            .format(&Bindings::from([("thing", "t")]))
            .unwrap_err();
        assert_eq!(err, TemplateError::UnboundWildcard);
    }
}
