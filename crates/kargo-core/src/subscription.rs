//! Subscriptions to external artifact repositories
//!
//! A Warehouse subscribes to ONE OF a Git repository, a container image
//! repository or a Helm chart repository per entry. The variant is a sum type
//! so that every consumer has to handle each kind explicitly.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A subscription to exactly one artifact repository
///
/// Serialized as `{git: {...}}`, `{image: {...}}` or `{chart: {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Subscription {
    /// Subscription to a Git repository
    Git(GitSubscription),
    /// Subscription to a container image repository
    Image(ImageSubscription),
    /// Subscription to a Helm chart repository
    Chart(ChartSubscription),
}

/// Kind of a subscription, mostly for logging and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Git,
    Image,
    Chart,
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Image => write!(f, "image"),
            Self::Chart => write!(f, "chart"),
        }
    }
}

impl Subscription {
    /// Repository URL of whichever variant is set
    pub fn repo_url(&self) -> &str {
        match self {
            Self::Git(git) => &git.repo_url,
            Self::Image(image) => &image.repo_url,
            Self::Chart(chart) => &chart.repo_url,
        }
    }

    /// Kind of this subscription
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            Self::Git(_) => SubscriptionKind::Git,
            Self::Image(_) => SubscriptionKind::Image,
            Self::Chart(_) => SubscriptionKind::Chart,
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chart(chart) if !chart.name.is_empty() => {
                write!(f, "chart {}/{}", chart.repo_url, chart.name)
            }
            other => write!(f, "{} {}", other.kind(), other.repo_url()),
        }
    }
}

/// Rules for picking the newest commit of a Git repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CommitSelectionStrategy {
    /// Lexically greatest tag
    Lexical,
    /// Most recent commit on a branch (default)
    #[default]
    NewestFromBranch,
    /// Most recently created tag
    NewestTag,
    /// Tag with the greatest semantic version
    SemVer,
}

/// Rules for picking the newest version of a container image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ImageSelectionStrategy {
    /// Whatever digest a fixed (usually mutable) tag currently points to
    Digest,
    /// Lexically greatest tag
    Lexical,
    /// Most recently pushed tag
    NewestBuild,
    /// Tag with the greatest semantic version (default)
    #[default]
    SemVer,
}

/// Subscription to a Git repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitSubscription {
    /// Repository URL (HTTP or HTTPS)
    #[serde(rename = "repoURL")]
    pub repo_url: String,

    /// How the newest commit is identified
    #[serde(default)]
    pub commit_selection_strategy: CommitSelectionStrategy,

    /// Branch to follow; only used by `NewestFromBranch`. Empty means the
    /// repository's default branch.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,

    /// Constraint on tagged versions; only used by `SemVer`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub semver_constraint: String,

    /// Regular expression a tag must match to be considered
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub allow_tags: String,

    /// Tags that are never considered (exact match)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_tags: Vec<String>,

    /// Skip TLS certificate verification when talking to the repository
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,
}

/// Subscription to a container image repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSubscription {
    /// Image repository, without a tag
    #[serde(rename = "repoURL")]
    pub repo_url: String,

    /// Git repository the image is built from (provenance hint only)
    #[serde(default, rename = "gitRepoURL", skip_serializing_if = "String::is_empty")]
    pub git_repo_url: String,

    /// How the newest image is identified
    #[serde(default)]
    pub image_selection_strategy: ImageSelectionStrategy,

    /// Constraint on tags for `SemVer`; the pinned tag for `Digest`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub semver_constraint: String,

    /// Regular expression a tag must match to be considered
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub allow_tags: String,

    /// Tags that are never considered (exact match)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_tags: Vec<String>,

    /// `<os>/<arch>` the image must be available for
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,
}

impl ImageSubscription {
    /// Platform to select for, falling back to the controller's own
    pub fn platform_or_default(&self) -> String {
        if self.platform.is_empty() {
            default_platform()
        } else {
            self.platform.clone()
        }
    }
}

/// Subscription to a Helm chart repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartSubscription {
    /// Classic (HTTP/S) chart repository, or an OCI repository holding a
    /// single chart
    #[serde(rename = "repoURL")]
    pub repo_url: String,

    /// Chart name within a classic repository; must be empty for OCI
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Constraint on chart versions
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub semver_constraint: String,
}

impl ChartSubscription {
    /// Whether the repository lives in an OCI registry
    pub fn is_oci(&self) -> bool {
        self.repo_url.starts_with("oci://")
    }
}

/// The `<os>/<arch>` this process runs on, using the names container
/// registries use (`linux/amd64`, `darwin/arm64`, ...)
pub fn default_platform() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64le",
        other => other,
    };
    format!("{}/{}", os, arch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_variants() {
        let yaml = r#"
- git:
    repoURL: https://github.com/example/app.git
    branch: main
- image:
    repoURL: ghcr.io/example/app
    semverConstraint: ^1.0.0
- chart:
    repoURL: https://charts.example.com
    name: app
"#;
        let subs: Vec<Subscription> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].kind(), SubscriptionKind::Git);
        assert_eq!(subs[1].kind(), SubscriptionKind::Image);
        assert_eq!(subs[2].repo_url(), "https://charts.example.com");
    }

    #[test]
    fn test_strategy_defaults() {
        let git: GitSubscription =
            serde_yaml::from_str("repoURL: https://github.com/example/app.git").unwrap();
        assert_eq!(
            git.commit_selection_strategy,
            CommitSelectionStrategy::NewestFromBranch
        );

        let image: ImageSubscription = serde_yaml::from_str("repoURL: nginx").unwrap();
        assert_eq!(image.image_selection_strategy, ImageSelectionStrategy::SemVer);
    }

    #[test]
    fn test_two_variants_rejected() {
        let yaml = r#"
git:
  repoURL: https://github.com/example/app.git
image:
  repoURL: nginx
"#;
        assert!(serde_yaml::from_str::<Subscription>(yaml).is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let sub = Subscription::Git(GitSubscription {
            repo_url: "https://github.com/example/app.git".to_string(),
            insecure_skip_tls_verify: true,
            ..Default::default()
        });
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["git"]["repoURL"], "https://github.com/example/app.git");
        assert_eq!(json["git"]["insecureSkipTLSVerify"], true);
        assert_eq!(json["git"]["commitSelectionStrategy"], "NewestFromBranch");
        assert!(json["git"].get("branch").is_none());
    }

    #[test]
    fn test_platform_default() {
        let image = ImageSubscription {
            repo_url: "nginx".to_string(),
            ..Default::default()
        };
        let platform = image.platform_or_default();
        assert!(platform.contains('/'));

        let pinned = ImageSubscription {
            platform: "linux/arm64".to_string(),
            ..image
        };
        assert_eq!(pinned.platform_or_default(), "linux/arm64");
    }

    #[test]
    fn test_chart_oci_detection() {
        let oci = ChartSubscription {
            repo_url: "oci://ghcr.io/example/charts/app".to_string(),
            ..Default::default()
        };
        assert!(oci.is_oci());
        assert_eq!(Subscription::Chart(oci).to_string(), "chart oci://ghcr.io/example/charts/app");
    }
}
