//! Maven-compatible version ordering.
//!
//! Versions are split into a tree of items: numeric components, qualifier
//! strings and nested lists (opened by `-` and by digit/letter transitions).
//! Items compare component-wise; qualifiers follow the fixed precedence
//! `alpha < beta < milestone < rc < snapshot < release < sp < unknown`,
//! and trailing "null" items (`0`, `ga`, `final`, `release`, empty lists)
//! are dropped so that `1`, `1.0` and `1.0.0` are the same version.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::PommelError;

/// Known qualifiers, lowest first. `""` is a plain release.
const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

/// Position of the empty (release) qualifier in [`QUALIFIERS`]
const RELEASE_INDEX: &str = "5";

/// One parsed version component
#[derive(Debug, Clone)]
enum Item {
    /// Digits with leading zeros stripped; zero is "0"
    Int(String),
    /// Qualifier after alias normalisation
    Str(String),
    /// Nested sub-version
    List(Vec<Item>),
}

/// A parsed version string with Maven ordering semantics
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    items: Vec<Item>,
    canonical: String,
}

impl Version {
    /// Parse a version string. Any non-blank string is a valid version.
    pub fn parse(input: &str) -> Result<Self, PommelError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(PommelError::InvalidVersion {
                input: input.to_string(),
                reason: "version is empty".to_string(),
            });
        }
        let items = parse_items(raw);
        let canonical = canonical_list(&items);
        Ok(Self {
            raw: raw.to_string(),
            items,
            canonical,
        })
    }

    /// The version exactly as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Normalised form used for equality (`1.0.0` -> `1`)
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Whether this is a `-SNAPSHOT` or timestamped snapshot version
    pub fn is_snapshot(&self) -> bool {
        is_snapshot_string(&self.raw)
    }

    /// Whether this version carries a pre-release qualifier
    /// (alpha, beta, milestone, rc or snapshot)
    pub fn is_prerelease(&self) -> bool {
        fn walk(items: &[Item]) -> bool {
            items.iter().any(|item| match item {
                Item::Str(q) => QUALIFIERS[..5].contains(&q.as_str()),
                Item::List(list) => walk(list),
                Item::Int(_) => false,
            })
        }
        walk(&self.items)
    }

    /// Leading numeric components (`1.2.3-rc1` -> `[1, 2, 3]`).
    ///
    /// Trailing zeros are not part of the normalised form, so callers
    /// should treat missing positions as zero.
    pub fn numeric_components(&self) -> Vec<u64> {
        self.items
            .iter()
            .map_while(|item| match item {
                Item::Int(digits) => Some(digits.parse::<u64>().unwrap_or(u64::MAX)),
                _ => None,
            })
            .collect()
    }

    /// Numeric component at `index`, zero when absent
    pub fn component(&self, index: usize) -> u64 {
        self.numeric_components().get(index).copied().unwrap_or(0)
    }

    pub fn major(&self) -> u64 {
        self.component(0)
    }

    pub fn minor(&self) -> u64 {
        self.component(1)
    }

    pub fn patch(&self) -> u64 {
        self.component(2)
    }
}

/// Snapshot detection on a raw version string
pub fn is_snapshot_string(version: &str) -> bool {
    let upper = version.to_ascii_uppercase();
    upper == "SNAPSHOT" || upper.ends_with("-SNAPSHOT") || is_timestamped_snapshot(version)
}

/// Matches the `-yyyyMMdd.HHmmss-N` suffix of deployed snapshot files
pub fn is_timestamped_snapshot(version: &str) -> bool {
    let mut parts = version.rsplitn(3, '-');
    let (Some(build), Some(stamp), Some(_base)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let Some((date, time)) = stamp.split_once('.') else {
        return false;
    };
    !build.is_empty()
        && build.chars().all(|c| c.is_ascii_digit())
        && date.len() == 8
        && time.len() == 6
        && date.chars().chain(time.chars()).all(|c| c.is_ascii_digit())
}

fn qualifier_alias(value: &str, followed_by_digit: bool) -> String {
    if followed_by_digit && value.len() == 1 {
        match value {
            "a" => return "alpha".to_string(),
            "b" => return "beta".to_string(),
            "m" => return "milestone".to_string(),
            _ => {}
        }
    }
    match value {
        "ga" | "final" | "release" => String::new(),
        "cr" => "rc".to_string(),
        other => other.to_string(),
    }
}

fn comparable_qualifier(qualifier: &str) -> String {
    match QUALIFIERS.iter().position(|q| *q == qualifier) {
        Some(index) => index.to_string(),
        None => format!("{}-{}", QUALIFIERS.len(), qualifier),
    }
}

fn parse_item(is_digit: bool, buf: &str) -> Item {
    if is_digit {
        let trimmed = buf.trim_start_matches('0');
        Item::Int(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
    } else {
        Item::Str(qualifier_alias(buf, false))
    }
}

fn parse_items(version: &str) -> Vec<Item> {
    let lower = version.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();
    let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    // stack[0] is the root list; deeper entries are open sub-lists
    let mut stack: Vec<Vec<Item>> = vec![Vec::new()];
    let mut is_digit = false;
    let mut start = 0;

    for i in 0..chars.len() {
        let c = chars[i];
        if c == '.' || c == '-' {
            let item = if i == start {
                Item::Int("0".to_string())
            } else {
                parse_item(is_digit, &slice(start, i))
            };
            push_item(&mut stack, item);
            start = i + 1;
            if c == '-' {
                stack.push(Vec::new());
            }
        } else if c.is_ascii_digit() {
            if !is_digit && i > start {
                push_item(&mut stack, Item::Str(qualifier_alias(&slice(start, i), true)));
                start = i;
                stack.push(Vec::new());
            }
            is_digit = true;
        } else {
            if is_digit && i > start {
                push_item(&mut stack, parse_item(true, &slice(start, i)));
                start = i;
                stack.push(Vec::new());
            }
            is_digit = false;
        }
    }

    if chars.len() > start {
        push_item(&mut stack, parse_item(is_digit, &slice(start, chars.len())));
    }

    while stack.len() > 1 {
        let mut list = stack.pop().unwrap_or_default();
        normalize(&mut list);
        push_item(&mut stack, Item::List(list));
    }
    let mut root = stack.pop().unwrap_or_default();
    normalize(&mut root);
    root
}

fn push_item(stack: &mut [Vec<Item>], item: Item) {
    if let Some(list) = stack.last_mut() {
        list.push(item);
    }
}

/// Drop trailing null items, looking through trailing sub-lists
fn normalize(list: &mut Vec<Item>) {
    let mut i = list.len();
    while i > 0 {
        i -= 1;
        if list[i].is_null() {
            list.remove(i);
        } else if !matches!(list[i], Item::List(_)) {
            break;
        }
    }
}

impl Item {
    fn is_null(&self) -> bool {
        match self {
            Item::Int(digits) => digits == "0",
            Item::Str(value) => comparable_qualifier(value) == RELEASE_INDEX,
            Item::List(items) => items.is_empty(),
        }
    }

    /// Compare against another item, `None` meaning "no more components"
    fn compare_to(&self, other: Option<&Item>) -> Ordering {
        match (self, other) {
            (Item::Int(digits), None) => {
                if digits == "0" {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            (Item::Int(a), Some(Item::Int(b))) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Int(_), Some(_)) => Ordering::Greater,

            (Item::Str(value), None) => comparable_qualifier(value).as_str().cmp(RELEASE_INDEX),
            (Item::Str(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::Str(a), Some(Item::Str(b))) => comparable_qualifier(a).cmp(&comparable_qualifier(b)),
            (Item::Str(_), Some(Item::List(_))) => Ordering::Less,

            (Item::List(items), None) => match items.first() {
                Some(first) => first.compare_to(None),
                None => Ordering::Equal,
            },
            (Item::List(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::List(_), Some(Item::Str(_))) => Ordering::Greater,
            (Item::List(left), Some(Item::List(right))) => compare_lists(left, right),
        }
    }
}

fn compare_lists(left: &[Item], right: &[Item]) -> Ordering {
    for i in 0..left.len().max(right.len()) {
        let result = match (left.get(i), right.get(i)) {
            (None, None) => Ordering::Equal,
            (None, Some(r)) => r.compare_to(None).reverse(),
            (Some(l), r) => l.compare_to(r),
        };
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}

fn canonical_list(items: &[Item]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(if matches!(item, Item::List(_)) { '-' } else { '.' });
        }
        match item {
            Item::Int(digits) => out.push_str(digits),
            Item::Str(value) => out.push_str(value),
            Item::List(list) => out.push_str(&canonical_list(list)),
        }
    }
    out
}

impl FromStr for Version {
    type Err = PommelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.items, &other.items)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
