//! The rule model: immutable (save for a sink's sanitizer list) descriptions
//! of interesting calls, loaded from YAML rule files.

use compact_str::CompactString;
use serde::Deserialize;

/// A dotted (or `->`, `::`) identifier chain: zero or more attribute-prefix
/// components plus a final name. Equality is structural per component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Identifier {
    /// Attribute-prefix components, outermost first (e.g. `["request", "args"]`).
    pub object_name: Vec<CompactString>,
    /// The final name component.
    pub ident: CompactString,
}

impl Identifier {
    /// Builds an identifier with no object-name prefix.
    #[must_use]
    pub fn bare(ident: impl Into<CompactString>) -> Self {
        Self {
            object_name: Vec::new(),
            ident: ident.into(),
        }
    }
}

/// A single rule-file parameter slot: a wildcard, a required literal, or the
/// `$TAINT` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterPattern {
    /// Any argument is accepted at this position.
    Wildcard,
    /// The `$TAINT` sentinel: this position must carry tainted data.
    Taint,
    /// The argument must equal this literal.
    Literal(CompactString),
}

impl<'de> Deserialize<'de> for ParameterPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(match raw {
            None => ParameterPattern::Wildcard,
            Some(s) if s == crate::constants::TAINT_SENTINEL => ParameterPattern::Taint,
            Some(s) => ParameterPattern::Literal(s.into()),
        })
    }
}

/// One entry in a rule's `Methods` list: the method name, its positional
/// parameter pattern, and a human-readable comment surfaced on matching
/// taints.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodPattern {
    /// Name the call's identifier must match.
    #[serde(rename = "Methodname")]
    pub method_name: CompactString,
    /// Positional parameter patterns; length must equal the call's argument count.
    #[serde(rename = "Parameters")]
    pub parameters: Vec<ParameterPattern>,
    /// Free-text description, used as a taint's `Comment` field.
    #[serde(rename = "Comment")]
    pub comment: String,
    /// Sanitizers attached to this method pattern (sinks only; empty otherwise).
    #[serde(rename = "Sanitizers", default)]
    pub sanitizers: Vec<RawSanitizerDef>,
}

/// A rule definition as it appears on disk: `{ObjectName: {Methods: [...]}}`,
/// with `ObjectName` possibly `null`/absent to mean "matches any receiver".
#[derive(Debug, Clone, Deserialize)]
pub struct RawRuleDef {
    #[serde(flatten)]
    entry: std::collections::BTreeMap<String, RawMethodsList>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMethodsList {
    #[serde(rename = "Methods")]
    methods: Vec<MethodPattern>,
}

/// Raw, not-yet-leveled sanitizer definition nested under a sink's
/// `Sanitizers` list.
pub type RawSanitizerDef = RawRuleDef;

fn object_name_from_key(key: &str) -> Option<Vec<CompactString>> {
    if key.is_empty() || key.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(
        key.split(['.', ':'])
            .filter(|s| !s.is_empty())
            .map(CompactString::from)
            .collect(),
    )
}

impl RawRuleDef {
    fn object_name(&self) -> Option<Vec<CompactString>> {
        self.entry.keys().next().and_then(|k| object_name_from_key(k))
    }

    fn methods(&self) -> Vec<MethodPattern> {
        self.entry
            .values()
            .next()
            .map(|m| m.methods.clone())
            .unwrap_or_default()
    }
}

/// A call whose return value or side effect introduces untrusted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Receiver identity constraint, or `None` to match any receiver.
    pub object_name: Option<Vec<CompactString>>,
    /// Ordered method patterns this source may match.
    pub methods: Vec<MethodPatternKey>,
    /// Free-text descriptions, indexed identically to `methods`. Excluded
    /// from equality since `MethodPatternKey` already carries rule identity.
    pub comments: Vec<String>,
}

/// A call whose tainted arguments constitute a security issue.
#[derive(Debug, Clone)]
pub struct Sink {
    /// Receiver identity constraint, or `None` to match any receiver.
    pub object_name: Option<Vec<CompactString>>,
    /// Ordered method patterns this sink may match.
    pub methods: Vec<MethodPatternKey>,
    /// Free-text descriptions, indexed identically to `methods`.
    pub comments: Vec<String>,
    /// Per-method-pattern sanitizer lists, indexed identically to `methods`.
    pub sanitizers: Vec<Vec<Sanitizer>>,
}

/// A call that neutralizes a tainted value before it reaches a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitizer {
    /// Receiver identity constraint, or `None` to match any receiver.
    pub object_name: Option<Vec<CompactString>>,
    /// Ordered method patterns this sanitizer may match.
    pub methods: Vec<MethodPatternKey>,
    /// Free-text descriptions, indexed identically to `methods`.
    pub comments: Vec<String>,
    /// Indirection depth: 0 for rule-origin sanitizers, `level+1` for
    /// sanitizers discovered by promotion through another sanitizer.
    pub level: u32,
}

/// The comparable, cloneable projection of a `MethodPattern` used for
/// equality (rule-deduplication) and matching. `comment`/nested sanitizers
/// are intentionally excluded from equality: two rules describing the same
/// method signature are duplicates regardless of their prose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodPatternKey {
    /// Name the call's identifier must match.
    pub method_name: CompactString,
    /// Positional parameter patterns.
    pub parameters: Vec<ParameterPattern>,
}

/// The stable identity of a Source/Sink/Sanitizer rule: its receiver
/// constraint plus method-pattern list, independent of a sink's mutable
/// sanitizer list. Used as the map key for a method's discovered matches and
/// for Ruleset's duplicate-rejection check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    /// Receiver identity constraint, or `None` to match any receiver.
    pub object_name: Option<Vec<CompactString>>,
    /// Ordered method patterns.
    pub methods: Vec<MethodPatternKey>,
}

impl Source {
    /// The rule's stable identity, independent of any other rule state.
    #[must_use]
    pub fn key(&self) -> RuleKey {
        RuleKey {
            object_name: self.object_name.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl Sink {
    /// The rule's stable identity, independent of its sanitizer list.
    #[must_use]
    pub fn key(&self) -> RuleKey {
        RuleKey {
            object_name: self.object_name.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl Sanitizer {
    /// The rule's stable identity, independent of `level`.
    #[must_use]
    pub fn key(&self) -> RuleKey {
        RuleKey {
            object_name: self.object_name.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl From<&MethodPattern> for MethodPatternKey {
    fn from(p: &MethodPattern) -> Self {
        Self {
            method_name: p.method_name.clone(),
            parameters: p.parameters.clone(),
        }
    }
}

impl Source {
    /// Builds a `Source` from a parsed rule-file document.
    #[must_use]
    pub fn from_raw(raw: &RawRuleDef) -> Self {
        let methods = raw.methods();
        Self {
            object_name: raw.object_name(),
            comments: methods.iter().map(|m| m.comment.clone()).collect(),
            methods: methods.iter().map(MethodPatternKey::from).collect(),
        }
    }
}

impl Sink {
    /// Builds a `Sink` from a parsed rule-file document, recursively lifting
    /// any nested `Sanitizers` at level 0.
    #[must_use]
    pub fn from_raw(raw: &RawRuleDef) -> Self {
        let methods = raw.methods();
        let sanitizers = methods
            .iter()
            .map(|m| {
                m.sanitizers
                    .iter()
                    .map(|s| Sanitizer::from_raw(s, 0))
                    .collect()
            })
            .collect();
        Self {
            object_name: raw.object_name(),
            comments: methods.iter().map(|m| m.comment.clone()).collect(),
            methods: methods.iter().map(MethodPatternKey::from).collect(),
            sanitizers,
        }
    }
}

impl Sanitizer {
    /// Builds a `Sanitizer` from a parsed rule-file document at the given
    /// indirection `level`.
    #[must_use]
    pub fn from_raw(raw: &RawRuleDef, level: u32) -> Self {
        let methods = raw.methods();
        Self {
            object_name: raw.object_name(),
            comments: methods.iter().map(|m| m.comment.clone()).collect(),
            methods: methods.iter().map(MethodPatternKey::from).collect(),
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> RawRuleDef {
        serde_yaml::from_str(yaml).expect("valid rule yaml")
    }

    #[test]
    fn parses_source_without_object_name() {
        let raw = parse(
            "null:\n  Methods:\n    - Methodname: scanf\n      Parameters: [null, \"$TAINT\"]\n      Comment: Reads formatted input from stdin.\n",
        );
        let source = Source::from_raw(&raw);
        assert!(source.object_name.is_none());
        assert_eq!(source.methods.len(), 1);
        assert_eq!(source.methods[0].method_name, "scanf");
        assert_eq!(
            source.methods[0].parameters,
            vec![ParameterPattern::Wildcard, ParameterPattern::Taint]
        );
    }

    #[test]
    fn parses_sink_with_nested_sanitizer() {
        let raw = parse(
            "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n      Sanitizers:\n        - null:\n            Methods:\n              - Methodname: test\n                Parameters: [\"$TAINT\"]\n                Comment: Neutralizes format strings.\n",
        );
        let sink = Sink::from_raw(&raw);
        assert_eq!(sink.methods.len(), 1);
        assert_eq!(sink.sanitizers[0].len(), 1);
        assert_eq!(sink.sanitizers[0][0].level, 0);
        assert_eq!(sink.sanitizers[0][0].methods[0].method_name, "test");
    }

    #[test]
    fn parses_object_scoped_rule() {
        let raw = parse(
            "C:\n  Methods:\n    - Methodname: sink\n      Parameters: [\"$TAINT\"]\n      Comment: Class sink.\n",
        );
        let sink = Sink::from_raw(&raw);
        assert_eq!(sink.object_name, Some(vec!["C".into()]));
    }
}
