//! Version selection
//!
//! A [`Selector`] is compiled once from a subscription and then applied to
//! candidate lists. Selection is a pure function of its inputs: it never
//! fails, never reorders or mutates the input, and returns `None` when
//! nothing qualifies.

use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::collections::HashSet;

use kargo_core::{
    ChartSubscription, CommitSelectionStrategy, GitSubscription, ImageSelectionStrategy,
    ImageSubscription, Subscription, VersionConstraint, parse_version_lenient,
};

use crate::candidate::Candidate;
use crate::error::SelectionError;

/// How the winner is chosen among the candidates that pass the filters
#[derive(Debug, Clone)]
enum Strategy {
    /// Greatest version string, byte-wise
    Lexical,
    /// Newest commit; ties broken by commit id
    NewestCommit,
    /// Newest tag or build; ties broken by version string
    Newest,
    /// Greatest semantic version that satisfies the constraint
    SemVer(Option<VersionConstraint>),
    /// The candidate whose tag is exactly this one
    Digest(String),
}

/// Include/exclude filters on tags
#[derive(Debug, Clone, Default)]
struct TagFilter {
    allow: Option<Regex>,
    ignore: HashSet<String>,
}

impl TagFilter {
    fn compile(allow_tags: &str, ignore_tags: &[String]) -> Result<Self, SelectionError> {
        let allow = if allow_tags.is_empty() {
            None
        } else {
            Some(
                Regex::new(allow_tags).map_err(|source| SelectionError::InvalidAllowTags {
                    pattern: allow_tags.to_string(),
                    source,
                })?,
            )
        };
        Ok(Self {
            allow,
            ignore: ignore_tags.iter().cloned().collect(),
        })
    }

    fn permits(&self, tag: &str) -> bool {
        !self.ignore.contains(tag) && self.allow.as_ref().is_none_or(|re| re.is_match(tag))
    }
}

/// Compiled selection rules for one subscription
#[derive(Debug, Clone)]
pub struct Selector {
    strategy: Strategy,
    tags: TagFilter,
    platform: Option<String>,
}

impl Selector {
    /// Compile the filters and strategy of `subscription`
    pub fn from_subscription(subscription: &Subscription) -> Result<Self, SelectionError> {
        match subscription {
            Subscription::Git(git) => Self::for_git(git),
            Subscription::Image(image) => Self::for_image(image),
            Subscription::Chart(chart) => Self::for_chart(chart),
        }
    }

    fn for_git(git: &GitSubscription) -> Result<Self, SelectionError> {
        let strategy = match git.commit_selection_strategy {
            CommitSelectionStrategy::Lexical => Strategy::Lexical,
            CommitSelectionStrategy::NewestFromBranch => Strategy::NewestCommit,
            CommitSelectionStrategy::NewestTag => Strategy::Newest,
            CommitSelectionStrategy::SemVer => {
                Strategy::SemVer(parse_constraint(&git.semver_constraint)?)
            }
        };
        // Branch heads are commits, not tags
        let tags = match strategy {
            Strategy::NewestCommit => TagFilter::default(),
            _ => TagFilter::compile(&git.allow_tags, &git.ignore_tags)?,
        };
        Ok(Self {
            strategy,
            tags,
            platform: None,
        })
    }

    fn for_image(image: &ImageSubscription) -> Result<Self, SelectionError> {
        let (strategy, tags) = match image.image_selection_strategy {
            ImageSelectionStrategy::Digest => {
                if image.semver_constraint.is_empty() {
                    return Err(SelectionError::MissingPinnedTag {
                        repo_url: image.repo_url.clone(),
                    });
                }
                (
                    Strategy::Digest(image.semver_constraint.clone()),
                    TagFilter::default(),
                )
            }
            other => {
                let strategy = match other {
                    ImageSelectionStrategy::Lexical => Strategy::Lexical,
                    ImageSelectionStrategy::NewestBuild => Strategy::Newest,
                    _ => Strategy::SemVer(parse_constraint(&image.semver_constraint)?),
                };
                (
                    strategy,
                    TagFilter::compile(&image.allow_tags, &image.ignore_tags)?,
                )
            }
        };
        Ok(Self {
            strategy,
            tags,
            platform: Some(image.platform_or_default()),
        })
    }

    fn for_chart(chart: &ChartSubscription) -> Result<Self, SelectionError> {
        Ok(Self {
            strategy: Strategy::SemVer(parse_constraint(&chart.semver_constraint)?),
            tags: TagFilter::default(),
            platform: None,
        })
    }

    /// Pick the best candidate, or `None` if nothing qualifies
    pub fn select<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        let mut eligible = candidates.iter().filter(|c| {
            self.platform
                .as_deref()
                .is_none_or(|platform| c.supports_platform(platform))
        });

        match &self.strategy {
            Strategy::Digest(tag) => eligible.find(|c| &c.version == tag),
            Strategy::Lexical => eligible
                .filter(|c| self.tags.permits(&c.version))
                .max_by(|a, b| a.version.as_bytes().cmp(b.version.as_bytes())),
            Strategy::NewestCommit => eligible.max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            Strategy::Newest => eligible
                .filter(|c| self.tags.permits(&c.version))
                .max_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.version.cmp(&b.version))
                }),
            Strategy::SemVer(constraint) => eligible
                .filter(|c| self.tags.permits(&c.version))
                .filter_map(|c| parse_version_lenient(&c.version).map(|v| (v, c)))
                .filter(|(v, _)| constraint.as_ref().is_none_or(|req| req.matches(v)))
                .max_by(|(va, a), (vb, b)| compare_semver(va, vb, &a.version, &b.version))
                .map(|(_, c)| c),
        }
    }
}

fn parse_constraint(raw: &str) -> Result<Option<VersionConstraint>, SelectionError> {
    if raw.is_empty() {
        Ok(None)
    } else {
        Ok(Some(VersionConstraint::parse(raw)?))
    }
}

/// SemVer precedence, ignoring build metadata, then the raw tag
fn compare_semver(a: &Version, b: &Version, raw_a: &str, raw_b: &str) -> Ordering {
    a.cmp_precedence(b).then_with(|| raw_a.cmp(raw_b))
}
