//! Resource identifiers - parsing and formatting hierarchical management paths
//!
//! Every regional resource is addressed by a path of the form
//! `/subscriptions/{id}/resourceGroups/{name}/providers/{Namespace}/{type}/{name}/...`.
//! [`ParsedResourceId`] splits such a path into its label/value pairs, and the
//! typed identifiers in [`ids`] pop the labels they expect out of it, failing on
//! anything missing, empty or left over.

use std::fmt;

use thiserror::Error;

const SUBSCRIPTIONS: &str = "subscriptions";
const RESOURCE_GROUPS: &str = "resourceGroups";
const PROVIDERS: &str = "providers";

/// Errors raised while parsing or validating a resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A label the identifier requires is absent
    #[error("ID was missing the '{0}' element")]
    MissingSegment(String),

    /// A label is present but its value is empty
    #[error("ID contained an empty value for the '{0}' element")]
    EmptyValue(String),

    /// The path cannot be split into label/value pairs
    #[error("parsing ID {input:?}: {reason}")]
    MalformedPath { input: String, reason: &'static str },

    /// Segments remained after every expected label was consumed
    #[error("ID contained more segments than required: '{0}'")]
    UnexpectedTrailingSegment(String),

    /// The path names a different provider namespace than the identifier expects
    #[error("ID expected provider namespace {expected:?} but found {actual:?}")]
    UnexpectedNamespace { expected: String, actual: String },
}

impl ParseError {
    fn malformed(input: &str, reason: &'static str) -> Self {
        Self::MalformedPath {
            input: input.to_string(),
            reason,
        }
    }
}

/// A single `label/value` pair following the resource group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub key: String,
    pub value: String,
}

/// Generic parse result of a resource path
///
/// Segments after the resource group are kept in order (including every
/// `providers/{Namespace}` pair) so that [`ParsedResourceId::format`] reproduces
/// the input exactly for canonical paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    segments: Vec<PathSegment>,
}

impl ParsedResourceId {
    /// Parse a resource path into its subscription, resource group and segments
    ///
    /// The `subscriptions`, `resourceGroups` and `providers` labels are matched
    /// case-insensitively and normalized; every other label is kept verbatim.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if input.is_empty() {
            return Err(ParseError::malformed(input, "cannot parse an empty string"));
        }
        let Some(path) = input.strip_prefix('/') else {
            return Err(ParseError::malformed(input, "ID must start with '/'"));
        };

        let components: Vec<&str> = path.split('/').collect();
        if components.len() % 2 != 0 {
            return Err(ParseError::malformed(
                input,
                "the number of path segments is not divisible by 2",
            ));
        }

        let mut pairs = components.chunks(2).map(|pair| (pair[0], pair[1]));

        let subscription_id = match pairs.next() {
            Some((key, value)) if key.eq_ignore_ascii_case(SUBSCRIPTIONS) => value,
            _ => {
                return Err(ParseError::malformed(
                    input,
                    "ID must start with '/subscriptions/'",
                ));
            }
        };
        if subscription_id.is_empty() {
            return Err(ParseError::EmptyValue(SUBSCRIPTIONS.to_string()));
        }

        let resource_group = match pairs.next() {
            Some((key, value)) if key.eq_ignore_ascii_case(RESOURCE_GROUPS) => value,
            _ => return Err(ParseError::MissingSegment(RESOURCE_GROUPS.to_string())),
        };
        if resource_group.is_empty() {
            return Err(ParseError::EmptyValue(RESOURCE_GROUPS.to_string()));
        }

        let mut segments = Vec::with_capacity(components.len() / 2);
        for (key, value) in pairs {
            if key.is_empty() {
                return Err(ParseError::malformed(input, "ID contains an empty segment label"));
            }
            let key = if key.eq_ignore_ascii_case(PROVIDERS) {
                PROVIDERS
            } else {
                key
            };
            segments.push(PathSegment {
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        Ok(Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            segments,
        })
    }

    /// Segments not yet popped, in path order
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Provider namespaces still present, in path order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter(|s| s.key == PROVIDERS)
            .map(|s| s.value.as_str())
    }

    /// Remove the first segment labelled `key` and return its value
    pub fn pop_segment(&mut self, key: &str) -> Result<String, ParseError> {
        let position = self
            .segments
            .iter()
            .position(|s| s.key == key)
            .ok_or_else(|| ParseError::MissingSegment(key.to_string()))?;

        let segment = self.segments.remove(position);
        if segment.value.is_empty() {
            return Err(ParseError::EmptyValue(segment.key));
        }
        Ok(segment.value)
    }

    /// Remove the next `providers` pair, which must name `namespace` when present
    ///
    /// Paths without a `providers` pair are accepted; the namespace is
    /// restored when the identifier is formatted again.
    pub fn pop_provider(&mut self, namespace: &str) -> Result<(), ParseError> {
        let Some(position) = self.segments.iter().position(|s| s.key == PROVIDERS) else {
            return Ok(());
        };

        let segment = self.segments.remove(position);
        if segment.value.is_empty() {
            return Err(ParseError::EmptyValue(PROVIDERS.to_string()));
        }
        if segment.value != namespace {
            return Err(ParseError::UnexpectedNamespace {
                expected: namespace.to_string(),
                actual: segment.value,
            });
        }
        Ok(())
    }

    /// Fail if any segment was left unconsumed
    pub fn ensure_consumed(&self) -> Result<(), ParseError> {
        match self.segments.first() {
            Some(segment) => Err(ParseError::UnexpectedTrailingSegment(segment.key.clone())),
            None => Ok(()),
        }
    }

    /// Fail if any value in the identifier is the empty string
    pub fn validate_no_empty_segments(&self) -> Result<(), ParseError> {
        if self.subscription_id.is_empty() {
            return Err(ParseError::EmptyValue(SUBSCRIPTIONS.to_string()));
        }
        if self.resource_group.is_empty() {
            return Err(ParseError::EmptyValue(RESOURCE_GROUPS.to_string()));
        }
        match self.segments.iter().find(|s| s.value.is_empty()) {
            Some(segment) => Err(ParseError::EmptyValue(segment.key.clone())),
            None => Ok(()),
        }
    }

    /// Canonical path string
    pub fn format(&self) -> String {
        let mut out = format!(
            "/{}/{}/{}/{}",
            SUBSCRIPTIONS, self.subscription_id, RESOURCE_GROUPS, self.resource_group
        );
        for segment in &self.segments {
            out.push('/');
            out.push_str(&segment.key);
            out.push('/');
            out.push_str(&segment.value);
        }
        out
    }
}

impl fmt::Display for ParsedResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// One element of a typed identifier's path template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// A `providers/{Namespace}` pair
    Provider(&'static str),
    /// A `{key}/{value}` pair; `label` is the human name used in descriptions
    Named {
        key: &'static str,
        label: &'static str,
    },
}

/// Render a template with placeholders, e.g. for listing supported kinds
pub fn template(segments: &[Segment]) -> String {
    let mut out = String::from("/subscriptions/{Subscription}/resourceGroups/{Resource Group}");
    for segment in segments {
        match segment {
            Segment::Provider(namespace) => {
                out.push_str("/providers/");
                out.push_str(namespace);
            }
            Segment::Named { key, label } => {
                out.push_str(&format!("/{}/{{{}}}", key, label));
            }
        }
    }
    out
}

/// A strongly-typed resource identifier
///
/// Implementors only describe their path template and expose their values;
/// parsing, formatting and validation are shared.
pub trait ResourceIdentifier: Sized {
    /// Human name of the kind (e.g. "Storage Account Custom Domain")
    const KIND: &'static str;

    /// Path template after the resource group
    const SEGMENTS: &'static [Segment];

    fn subscription_id(&self) -> &str;

    fn resource_group(&self) -> &str;

    /// Values of the named segments, in template order
    fn names(&self) -> Vec<&str>;

    /// Build from values already extracted in template order
    fn from_parts(subscription_id: String, resource_group: String, names: Vec<String>) -> Self;

    /// Parse a path into this identifier
    fn parse(input: &str) -> Result<Self, ParseError> {
        let mut parsed = ParsedResourceId::parse(input)?;

        let mut names = Vec::new();
        for segment in Self::SEGMENTS {
            match *segment {
                Segment::Provider(namespace) => parsed.pop_provider(namespace)?,
                Segment::Named { key, .. } => names.push(parsed.pop_segment(key)?),
            }
        }
        parsed.ensure_consumed()?;

        let id = Self::from_parts(parsed.subscription_id, parsed.resource_group, names);
        id.validate_no_empty_segments()?;
        Ok(id)
    }

    /// Canonical path string
    fn id(&self) -> String {
        let mut out = format!(
            "/{}/{}/{}/{}",
            SUBSCRIPTIONS,
            self.subscription_id(),
            RESOURCE_GROUPS,
            self.resource_group()
        );
        let mut names = self.names().into_iter();
        for segment in Self::SEGMENTS {
            let (key, value) = match *segment {
                Segment::Provider(namespace) => (PROVIDERS, namespace),
                Segment::Named { key, .. } => (key, names.next().unwrap_or_default()),
            };
            out.push('/');
            out.push_str(key);
            out.push('/');
            out.push_str(value);
        }
        out
    }

    /// Fail if any value in the identifier is the empty string
    fn validate_no_empty_segments(&self) -> Result<(), ParseError> {
        if self.subscription_id().is_empty() {
            return Err(ParseError::EmptyValue(SUBSCRIPTIONS.to_string()));
        }
        if self.resource_group().is_empty() {
            return Err(ParseError::EmptyValue(RESOURCE_GROUPS.to_string()));
        }
        let keys = Self::SEGMENTS.iter().filter_map(|s| match s {
            Segment::Named { key, .. } => Some(*key),
            Segment::Provider(_) => None,
        });
        for (key, value) in keys.zip(self.names()) {
            if value.is_empty() {
                return Err(ParseError::EmptyValue(key.to_string()));
            }
        }
        Ok(())
    }

    /// Human description, innermost name first
    fn describe(&self) -> String {
        let labels = Self::SEGMENTS.iter().filter_map(|s| match s {
            Segment::Named { label, .. } => Some(*label),
            Segment::Provider(_) => None,
        });
        let mut parts: Vec<String> = labels
            .zip(self.names())
            .map(|(label, value)| format!("{} {:?}", label, value))
            .collect();
        parts.reverse();
        parts.push(format!("Resource Group {:?}", self.resource_group()));
        format!("{}: ({})", Self::KIND, parts.join(" / "))
    }
}

/// Declare a typed identifier and implement [`ResourceIdentifier`] for it
///
/// ```ignore
/// resource_id! {
///     pub struct CreatorId("Creator") {
///         providers("Microsoft.Maps") {
///             account_name: "accounts" => "Account Name",
///             name: "creators" => "Name",
///         }
///     }
/// }
/// ```
macro_rules! resource_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($kind:literal) {
            $(
                providers($namespace:literal) {
                    $( $field:ident : $key:literal => $label:literal ),+ $(,)?
                }
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name {
            pub subscription_id: String,
            pub resource_group: String,
            $( $( pub $field: String, )+ )+
        }

        impl $name {
            #[allow(clippy::too_many_arguments)]
            pub fn new(
                subscription_id: impl Into<String>,
                resource_group: impl Into<String>,
                $( $( $field: impl Into<String>, )+ )+
            ) -> Self {
                Self {
                    subscription_id: subscription_id.into(),
                    resource_group: resource_group.into(),
                    $( $( $field: $field.into(), )+ )+
                }
            }
        }

        impl $crate::resource_id::ResourceIdentifier for $name {
            const KIND: &'static str = $kind;
            const SEGMENTS: &'static [$crate::resource_id::Segment] = &[
                $(
                    $crate::resource_id::Segment::Provider($namespace),
                    $( $crate::resource_id::Segment::Named { key: $key, label: $label }, )+
                )+
            ];

            fn subscription_id(&self) -> &str {
                &self.subscription_id
            }

            fn resource_group(&self) -> &str {
                &self.resource_group
            }

            fn names(&self) -> Vec<&str> {
                vec![ $( $( self.$field.as_str(), )+ )+ ]
            }

            fn from_parts(subscription_id: String, resource_group: String, names: Vec<String>) -> Self {
                let mut names = names.into_iter();
                Self {
                    subscription_id,
                    resource_group,
                    $( $( $field: names.next().unwrap_or_default(), )+ )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&$crate::resource_id::ResourceIdentifier::describe(self))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::resource_id::ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as $crate::resource_id::ResourceIdentifier>::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&$crate::resource_id::ResourceIdentifier::id(self))
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                <Self as $crate::resource_id::ResourceIdentifier>::parse(&raw)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

pub mod ids;

pub use ids::*;
