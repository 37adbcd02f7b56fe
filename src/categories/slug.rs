use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::store::repo_types::NewCategory;

/// Category names as sent by forms: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CategoryInput {
    One(String),
    Many(Vec<String>),
}

impl CategoryInput {
    fn into_vec(self) -> Vec<String> {
        match self {
            CategoryInput::One(s) => vec![s],
            CategoryInput::Many(v) => v,
        }
    }
}

impl From<Vec<&str>> for CategoryInput {
    fn from(v: Vec<&str>) -> Self {
        CategoryInput::Many(v.into_iter().map(str::to_string).collect())
    }
}

/// Lowercase, collapse every run of non `[a-z0-9]` into `-`, trim hyphens.
pub fn slugify(name: &str) -> String {
    lazy_static! {
        static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    }
    NON_ALNUM
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

fn fallback_slug(index: usize) -> String {
    format!(
        "category-{}-{}",
        OffsetDateTime::now_utc().unix_timestamp_nanos(),
        index
    )
}

/// Trims, drops empties and dedupes on the slug, keeping the first-seen
/// spelling and order.
pub fn normalize_category_names(input: CategoryInput) -> Vec<NewCategory> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for raw in input.into_vec() {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let slug = slugify(name);
        // Names with no slug-able characters dedupe on their own text.
        let key = if slug.is_empty() {
            format!("~{}", name.to_lowercase())
        } else {
            slug.clone()
        };
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        let slug = if slug.is_empty() {
            fallback_slug(out.len())
        } else {
            slug
        };
        out.push(NewCategory {
            name: name.to_string(),
            slug,
        });
    }
    out
}
