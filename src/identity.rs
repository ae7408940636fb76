//! Resource identity.
//!
//! A resource's durable id is persisted by the engine and handed back on every
//! later Read, Update, Delete and Diff, so both encodings here are part of the
//! provider's external contract and must stay byte-stable:
//!
//! - [`CompositeId`]: `kind:id` segments joined by `/`, encoding the
//!   containment path (`project:demo/pipeline:7/action:12`). The last
//!   segment's kind owns the id.
//! - [`BindingId`]: raw foreign ids joined by `~~~` for association resources
//!   (`3~~~17`). Binding ids carry no kind.
//!
//! Kinds and ids must not contain `/` or `:`; this is not checked when
//! stringifying.

use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

const SEGMENT_SEPARATOR: char = '/';
const KIND_SEPARATOR: char = ':';
const BINDING_SEPARATOR: &str = "~~~";

/// Pulumi package name and type token prefix.
pub const PACKAGE: &str = "buddy";
const TYPE_PREFIX: &str = "buddy:index:";

/// Every resource kind the provider manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// A Buddy project.
    Project,
    /// A pipeline inside a project.
    Pipeline,
    /// An action inside a pipeline.
    Action,
    /// A workspace member.
    Member,
    /// A workspace group.
    Group,
    /// A permission set.
    Permission,
    /// A workspace webhook.
    Webhook,
    /// An environment variable, workspace or project scoped.
    Variable,
    /// A user SSH key.
    SshKey,
    /// A third-party integration.
    Integration,
    /// Membership of a member in a group.
    GroupMember,
    /// Membership of a member in a project with a permission set.
    ProjectMember,
}

impl Kind {
    /// All kinds, in registration order.
    pub const ALL: [Kind; 12] = [
        Kind::Project,
        Kind::Pipeline,
        Kind::Action,
        Kind::Member,
        Kind::Group,
        Kind::Permission,
        Kind::Webhook,
        Kind::Variable,
        Kind::SshKey,
        Kind::Integration,
        Kind::GroupMember,
        Kind::ProjectMember,
    ];

    /// Slug used in composite ids and in the payload `kind` field.
    pub fn slug(self) -> &'static str {
        match self {
            Kind::Project => "project",
            Kind::Pipeline => "pipeline",
            Kind::Action => "action",
            Kind::Member => "member",
            Kind::Group => "group",
            Kind::Permission => "permission",
            Kind::Webhook => "webhook",
            Kind::Variable => "variable",
            Kind::SshKey => "ssh_key",
            Kind::Integration => "integration",
            Kind::GroupMember => "group_member",
            Kind::ProjectMember => "project_member",
        }
    }

    /// Resource name used in the type token.
    pub fn type_name(self) -> &'static str {
        match self {
            Kind::Project => "Project",
            Kind::Pipeline => "Pipeline",
            Kind::Action => "Action",
            Kind::Member => "Member",
            Kind::Group => "Group",
            Kind::Permission => "Permission",
            Kind::Webhook => "Webhook",
            Kind::Variable => "Variable",
            Kind::SshKey => "SshKey",
            Kind::Integration => "Integration",
            Kind::GroupMember => "GroupMember",
            Kind::ProjectMember => "ProjectMember",
        }
    }

    /// Full Pulumi type token, e.g. `buddy:index:Project`.
    pub fn type_token(self) -> String {
        format!("{}{}", TYPE_PREFIX, self.type_name())
    }

    /// Look a kind up by its slug.
    pub fn from_slug(slug: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|k| k.slug() == slug)
    }

    /// Look a kind up by its type token.
    pub fn from_type_token(token: &str) -> Option<Kind> {
        let name = token.strip_prefix(TYPE_PREFIX)?;
        Kind::ALL.into_iter().find(|k| k.type_name() == name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Kind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::from_slug(s).ok_or_else(|| ProviderError::UnsupportedKind(s.to_string()))
    }
}

/// A containment path of `(kind, local id)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId {
    segments: Vec<(Kind, String)>,
}

impl CompositeId {
    /// Build an id from its segments, outermost first.
    pub fn new(segments: Vec<(Kind, String)>) -> Self {
        Self { segments }
    }

    /// Build an id with a single segment.
    pub fn single(kind: Kind, id: impl Into<String>) -> Self {
        Self::new(vec![(kind, id.into())])
    }

    /// Append a child segment.
    pub fn child(mut self, kind: Kind, id: impl Into<String>) -> Self {
        self.segments.push((kind, id.into()));
        self
    }

    /// The segments, outermost first.
    pub fn segments(&self) -> &[(Kind, String)] {
        &self.segments
    }

    /// Kind of the last segment, which owns the id.
    pub fn kind(&self) -> Option<Kind> {
        self.segments.last().map(|(kind, _)| *kind)
    }

    /// Local id of the segment with the given kind.
    pub fn get(&self, kind: Kind) -> Option<&str> {
        self.segments
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| id.as_str())
    }

    /// Local id of the given kind, or an invalid identifier error.
    pub fn require(&self, kind: Kind) -> Result<&str, ProviderError> {
        self.get(kind).ok_or_else(|| {
            ProviderError::InvalidIdentifier(format!(
                "'{}' has no {} segment",
                self, kind
            ))
        })
    }

    /// Serialize to `kind:id/kind:id/...`.
    pub fn stringify(&self) -> String {
        self.segments
            .iter()
            .map(|(kind, id)| format!("{}{}{}", kind.slug(), KIND_SEPARATOR, id))
            .collect::<Vec<_>>()
            .join(&SEGMENT_SEPARATOR.to_string())
    }

    /// Parse `kind:id/kind:id/...`, splitting each segment on its first `:`.
    pub fn parse(id: &str) -> Result<Self, ProviderError> {
        if id.is_empty() {
            return Err(ProviderError::InvalidIdentifier("empty id".to_string()));
        }
        let segments = id
            .split(SEGMENT_SEPARATOR)
            .map(|segment| {
                let (kind, local) = segment.split_once(KIND_SEPARATOR).ok_or_else(|| {
                    ProviderError::InvalidIdentifier(format!(
                        "segment '{}' of '{}' is not kind:id",
                        segment, id
                    ))
                })?;
                let kind = Kind::from_slug(kind).ok_or_else(|| {
                    ProviderError::InvalidIdentifier(format!(
                        "segment '{}' of '{}' has unknown kind",
                        segment, id
                    ))
                })?;
                if local.is_empty() {
                    return Err(ProviderError::InvalidIdentifier(format!(
                        "segment '{}' of '{}' has an empty id",
                        segment, id
                    )));
                }
                Ok((kind, local.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// Whether `id` looks like a composite id at all.
    ///
    /// Binding ids never contain `:`, so this is enough to pick a decoder.
    pub fn is_composite(id: &str) -> bool {
        id.contains(KIND_SEPARATOR)
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

/// Id of an association resource: raw ids joined by `~~~`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingId {
    parts: Vec<String>,
}

impl BindingId {
    /// Build a binding id from its parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a binding id that must have exactly `arity` non-empty parts.
    pub fn parse(id: &str, arity: usize) -> Result<Self, ProviderError> {
        let parts: Vec<String> = id.split(BINDING_SEPARATOR).map(str::to_string).collect();
        if parts.len() != arity || parts.iter().any(String::is_empty) {
            return Err(ProviderError::InvalidIdentifier(format!(
                "'{}' is not a binding id with {} parts",
                id, arity
            )));
        }
        Ok(Self { parts })
    }

    /// The parts in order.
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Part at `index`.
    pub fn part(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    /// Serialize to `a~~~b[~~~c]`.
    pub fn stringify(&self) -> String {
        self.parts.join(BINDING_SEPARATOR)
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

/// Extract the resource type token from a urn.
///
/// Urns look like `urn:pulumi:<stack>::<project>::<qualified type>::<name>`,
/// where the qualified type is `$`-joined parent types ending in the
/// resource's own type.
pub fn type_from_urn(urn: &str) -> Option<&str> {
    let mut parts = urn.splitn(4, "::");
    let _stack = parts.next()?;
    let _project = parts.next()?;
    let qualified = parts.next()?;
    parts.next()?;
    qualified.rsplit('$').next().filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stringify_containment_path() {
        let id = CompositeId::single(Kind::Project, "demo")
            .child(Kind::Pipeline, "7")
            .child(Kind::Action, "12");
        assert_eq!(id.stringify(), "project:demo/pipeline:7/action:12");
        assert_eq!(id.kind(), Some(Kind::Action));
        assert_eq!(id.get(Kind::Pipeline), Some("7"));
    }

    #[test]
    fn test_parse_round_trip_for_every_kind() {
        for kind in Kind::ALL {
            let pairs = vec![(Kind::Project, "p-1".to_string()), (kind, "42".to_string())];
            let id = CompositeId::new(pairs.clone());
            let parsed = CompositeId::parse(&id.stringify()).unwrap();
            assert_eq!(parsed.segments(), pairs.as_slice());
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "project", "project:demo/pipeline", "nope:1", "project:", "/project:1"] {
            let err = CompositeId::parse(bad).unwrap_err();
            assert!(
                matches!(err, ProviderError::InvalidIdentifier(_)),
                "{} should be invalid",
                bad
            );
        }
    }

    #[test]
    fn test_require_missing_segment() {
        let id = CompositeId::single(Kind::Member, "3");
        assert_eq!(id.require(Kind::Member).unwrap(), "3");
        assert!(matches!(
            id.require(Kind::Project),
            Err(ProviderError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_binding_id() {
        let id = BindingId::new(["1", "2"]);
        assert_eq!(id.stringify(), "1~~~2");

        let parsed = BindingId::parse("demo~~~5~~~9", 3).unwrap();
        assert_eq!(parsed.part(0), Some("demo"));
        assert_eq!(parsed.part(2), Some("9"));

        assert!(BindingId::parse("1~~~2", 3).is_err());
        assert!(BindingId::parse("1~~~", 2).is_err());
        assert!(BindingId::parse("project:1", 2).is_err());
        assert!(!CompositeId::is_composite("1~~~2"));
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(Kind::from_slug("ssh_key"), Some(Kind::SshKey));
        assert_eq!(
            Kind::from_type_token("buddy:index:GroupMember"),
            Some(Kind::GroupMember)
        );
        assert_eq!(Kind::Project.type_token(), "buddy:index:Project");
        assert!(Kind::from_type_token("aws:s3:Bucket").is_none());
        assert!("sandbox".parse::<Kind>().is_err());
    }

    #[test]
    fn test_type_from_urn() {
        assert_eq!(
            type_from_urn("urn:pulumi:dev::infra::buddy:index:Project::main"),
            Some("buddy:index:Project")
        );
        assert_eq!(
            type_from_urn("urn:pulumi:dev::infra::my:comp:Stack$buddy:index:Pipeline::ci"),
            Some("buddy:index:Pipeline")
        );
        assert_eq!(
            type_from_urn("urn:pulumi:dev::infra::pulumi:providers:buddy::default"),
            Some("pulumi:providers:buddy")
        );
        assert_eq!(type_from_urn("not-a-urn"), None);
    }
}
