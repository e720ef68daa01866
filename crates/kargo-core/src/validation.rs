//! Field-pathed validation of resource specs
//!
//! Errors mirror the shape of Kubernetes API field errors
//! (`spec.subscriptions[0].git.repoURL: Invalid value: "x": ...`) so that
//! admission rejections read the same as schema rejections.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

use crate::constraint::VersionConstraint;
use crate::project::{ProjectSpec, PromotionPolicy};
use crate::subscription::{
    ChartSubscription, GitSubscription, ImageSelectionStrategy, ImageSubscription, Subscription,
};
use crate::warehouse::WarehouseSpec;

static GIT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(\w+([\.-]\w+)*@)?\w+([\.-]\w+)*(:[\d]+)?(/.*)?$")
        .expect("valid regex")
});

static IMAGE_REPO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+([\.-]\w+)*(:[\d]+)?/)?(\w+([\.-]\w+)*)(/\w+([\.-]\w+)*)*$")
        .expect("valid regex")
});

static CHART_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(((https?)|(oci))://)([\w\d\.\-]+)(:[\d]+)?(/.*)*$").expect("valid regex")
});

static BRANCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+([-/]\w+)*$").expect("valid regex"));

static PLATFORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+/[a-z0-9]+(/[a-z0-9]+)?$").expect("valid regex"));

/// Path to a field, e.g. `spec.subscriptions[0].git.repoURL`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    /// Root path
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    /// Path to a named child field
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    /// Path to a list element
    pub fn index(&self, idx: usize) -> Self {
        Self(format!("{}[{}]", self.0, idx))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Invalid,
    Required,
    Forbidden,
    Duplicate,
}

/// One problem with one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub path: FieldPath,
    /// Offending value, if there is one worth echoing back
    pub value: Option<String>,
    pub detail: String,
}

impl FieldError {
    pub fn invalid(path: FieldPath, value: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Invalid,
            path,
            value: Some(value.into()),
            detail: detail.into(),
        }
    }

    pub fn required(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Required,
            path,
            value: None,
            detail: detail.into(),
        }
    }

    pub fn forbidden(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Forbidden,
            path,
            value: None,
            detail: detail.into(),
        }
    }

    pub fn duplicate(path: FieldPath, value: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Duplicate,
            path,
            value: Some(value.into()),
            detail: String::new(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            FieldErrorKind::Invalid => "Invalid value",
            FieldErrorKind::Required => "Required value",
            FieldErrorKind::Forbidden => "Forbidden",
            FieldErrorKind::Duplicate => "Duplicate value",
        };
        write!(f, "{}: {}", self.path, label)?;
        if let Some(value) = &self.value {
            write!(f, ": {:?}", value)?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// A non-empty list of field errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Turn a list into a result: empty means valid
    pub fn into_result(errors: Vec<FieldError>) -> Result<(), ValidationErrors> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self(errors))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{}", single),
            many => {
                let rendered: Vec<String> = many.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

// ============ Project ============

/// Validate a Project spec rooted at `path`
pub fn validate_project_spec(path: &FieldPath, spec: &ProjectSpec) -> Result<(), ValidationErrors> {
    validate_promotion_policies(&path.child("promotionPolicies"), &spec.promotion_policies)
}

/// Each Stage may be referenced by at most one policy; the first repeat
/// found is reported
fn validate_promotion_policies(
    path: &FieldPath,
    policies: &[PromotionPolicy],
) -> Result<(), ValidationErrors> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(policies.len());
    for policy in policies {
        if !seen.insert(policy.stage.as_str()) {
            return Err(ValidationErrors(vec![FieldError::invalid(
                path.clone(),
                policy.stage.clone(),
                format!("multiple {} reference stage {}", path, policy.stage),
            )]));
        }
    }
    Ok(())
}

// ============ Warehouse ============

/// Validate a Warehouse spec rooted at `path`, collecting every problem
pub fn validate_warehouse_spec(
    path: &FieldPath,
    spec: &WarehouseSpec,
) -> Result<(), ValidationErrors> {
    let subs_path = path.child("subscriptions");
    let mut errors = Vec::new();

    if spec.subscriptions.is_empty() {
        errors.push(FieldError::required(
            subs_path.clone(),
            "at least one subscription is required",
        ));
    }

    for (idx, sub) in spec.subscriptions.iter().enumerate() {
        let sub_path = subs_path.index(idx);
        match sub {
            Subscription::Git(git) => validate_git(&sub_path.child("git"), git, &mut errors),
            Subscription::Image(image) => {
                validate_image(&sub_path.child("image"), image, &mut errors)
            }
            Subscription::Chart(chart) => {
                validate_chart(&sub_path.child("chart"), chart, &mut errors)
            }
        }
    }

    ValidationErrors::into_result(errors)
}

fn validate_git(path: &FieldPath, git: &GitSubscription, errors: &mut Vec<FieldError>) {
    validate_url(&path.child("repoURL"), &git.repo_url, &GIT_URL, errors);
    if !git.branch.is_empty() && !BRANCH.is_match(&git.branch) {
        errors.push(FieldError::invalid(
            path.child("branch"),
            git.branch.clone(),
            format!("must match {}", BRANCH.as_str()),
        ));
    }
    validate_allow_tags(&path.child("allowTags"), &git.allow_tags, errors);
    validate_constraint(&path.child("semverConstraint"), &git.semver_constraint, errors);
}

fn validate_image(path: &FieldPath, image: &ImageSubscription, errors: &mut Vec<FieldError>) {
    validate_url(&path.child("repoURL"), &image.repo_url, &IMAGE_REPO, errors);
    if !image.git_repo_url.is_empty() && !GIT_URL.is_match(&image.git_repo_url) {
        errors.push(FieldError::invalid(
            path.child("gitRepoURL"),
            image.git_repo_url.clone(),
            format!("must match {}", GIT_URL.as_str()),
        ));
    }
    validate_allow_tags(&path.child("allowTags"), &image.allow_tags, errors);

    match image.image_selection_strategy {
        // For Digest the field names the tag to pin, not a constraint
        ImageSelectionStrategy::Digest => {
            if image.semver_constraint.is_empty() {
                errors.push(FieldError::required(
                    path.child("semverConstraint"),
                    "the Digest strategy needs the tag to track",
                ));
            }
        }
        _ => validate_constraint(&path.child("semverConstraint"), &image.semver_constraint, errors),
    }

    if !image.platform.is_empty() && !PLATFORM.is_match(&image.platform) {
        errors.push(FieldError::invalid(
            path.child("platform"),
            image.platform.clone(),
            "must be of the form <os>/<arch>",
        ));
    }
}

fn validate_chart(path: &FieldPath, chart: &ChartSubscription, errors: &mut Vec<FieldError>) {
    validate_url(&path.child("repoURL"), &chart.repo_url, &CHART_URL, errors);
    if chart.is_oci() {
        if !chart.name.is_empty() {
            errors.push(FieldError::forbidden(
                path.child("name"),
                "must be empty when repoURL points to an OCI repository",
            ));
        }
    } else if chart.name.is_empty() {
        errors.push(FieldError::required(
            path.child("name"),
            "must be set when repoURL points to a classic chart repository",
        ));
    }
    validate_constraint(&path.child("semverConstraint"), &chart.semver_constraint, errors);
}

fn validate_url(path: &FieldPath, url: &str, pattern: &Regex, errors: &mut Vec<FieldError>) {
    if url.is_empty() {
        errors.push(FieldError::required(path.clone(), "repository URL is required"));
    } else if !pattern.is_match(url) {
        errors.push(FieldError::invalid(
            path.clone(),
            url,
            format!("must match {}", pattern.as_str()),
        ));
    }
}

fn validate_allow_tags(path: &FieldPath, allow_tags: &str, errors: &mut Vec<FieldError>) {
    if allow_tags.is_empty() {
        return;
    }
    if let Err(e) = Regex::new(allow_tags) {
        errors.push(FieldError::invalid(path.clone(), allow_tags, e.to_string()));
    }
}

fn validate_constraint(path: &FieldPath, constraint: &str, errors: &mut Vec<FieldError>) {
    if constraint.is_empty() {
        return;
    }
    if let Err(e) = VersionConstraint::parse(constraint) {
        errors.push(FieldError::invalid(path.clone(), constraint, e.to_string()));
    }
}
