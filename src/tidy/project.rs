use crate::tidy::record::normalize_extension;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;

pub const FALLBACK_PROJECT_NAME: &str = "Unsorted";
pub const FALLBACK_TIME_RANGE_LABEL: &str = "unknown";
pub const FALLBACK_CATEGORY: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDefinition {
    pub canonical_name: String,
    pub alias_tokens: BTreeSet<String>,
    pub time_ranges: Vec<TimeRange>,
}

pub fn normalize_alias(alias: &str) -> Option<String> {
    let token = alias.trim().to_lowercase();
    if token.is_empty() { None } else { Some(token) }
}

impl ProjectDefinition {
    pub fn new<I, S>(canonical_name: &str, aliases: I, time_ranges: Vec<TimeRange>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut alias_tokens: BTreeSet<String> = aliases
            .into_iter()
            .filter_map(|a| normalize_alias(a.as_ref()))
            .collect();
        if let Some(own) = normalize_alias(canonical_name) {
            alias_tokens.insert(own);
        }
        Self {
            canonical_name: canonical_name.trim().to_string(),
            alias_tokens,
            time_ranges,
        }
    }
}

/// First project, in declaration order, with any alias token contained in
/// the lowercased chain. Declaration order is the only tie-break.
pub fn match_project<'a>(
    folder_chain: &str,
    projects: &'a [ProjectDefinition],
) -> Option<&'a ProjectDefinition> {
    let normalized_chain = folder_chain.trim().to_lowercase();
    projects.iter().find(|project| {
        project
            .alias_tokens
            .iter()
            .any(|token| !token.is_empty() && normalized_chain.contains(token.as_str()))
    })
}

/// Why a date fell outside a project's ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangeMissKind {
    NoRanges,
    BeforeEarliest,
    AfterLatest,
    Gap,
}

impl RangeMissKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::NoRanges => "no_ranges",
            Self::BeforeEarliest => "before_earliest",
            Self::AfterLatest => "after_latest",
            Self::Gap => "gap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeMiss {
    NoRanges,
    BeforeEarliest {
        date: NaiveDate,
        earliest_start: NaiveDate,
    },
    AfterLatest {
        date: NaiveDate,
        latest_end: NaiveDate,
    },
    Gap {
        date: NaiveDate,
        ranges: Vec<(NaiveDate, NaiveDate)>,
    },
}

impl RangeMiss {
    pub fn kind(&self) -> RangeMissKind {
        match self {
            Self::NoRanges => RangeMissKind::NoRanges,
            Self::BeforeEarliest { .. } => RangeMissKind::BeforeEarliest,
            Self::AfterLatest { .. } => RangeMissKind::AfterLatest,
            Self::Gap { .. } => RangeMissKind::Gap,
        }
    }
}

impl fmt::Display for RangeMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRanges => write!(f, "project has no defined time ranges"),
            Self::BeforeEarliest {
                date,
                earliest_start,
            } => write!(
                f,
                "file modified {date} is before earliest project start {earliest_start}"
            ),
            Self::AfterLatest { date, latest_end } => write!(
                f,
                "file modified {date} is after latest project end {latest_end}"
            ),
            Self::Gap { date, ranges } => {
                let listed = ranges
                    .iter()
                    .map(|(start, end)| format!("{start}-{end}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "file modified {date} not in any defined ranges: {listed}")
            }
        }
    }
}

/// First range, in the given order, whose inclusive interval holds `date`.
pub fn find_time_range(date: NaiveDate, ranges: &[TimeRange]) -> Option<&TimeRange> {
    ranges.iter().find(|r| r.contains(date))
}

/// Like [`find_time_range`], but explains a miss.
pub fn lookup_time_range(date: NaiveDate, ranges: &[TimeRange]) -> Result<&TimeRange, RangeMiss> {
    if let Some(hit) = find_time_range(date, ranges) {
        return Ok(hit);
    }
    let (Some(earliest_start), Some(latest_end)) = (
        ranges.iter().map(|r| r.start).min(),
        ranges.iter().map(|r| r.end).max(),
    ) else {
        return Err(RangeMiss::NoRanges);
    };

    if date < earliest_start {
        Err(RangeMiss::BeforeEarliest {
            date,
            earliest_start,
        })
    } else if date > latest_end {
        Err(RangeMiss::AfterLatest { date, latest_end })
    } else {
        Err(RangeMiss::Gap {
            date,
            ranges: ranges.iter().map(|r| (r.start, r.end)).collect(),
        })
    }
}

/// Category name → normalized extensions, kept in declaration order.
/// The first declared category listing an extension wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    categories: Vec<(String, BTreeSet<String>)>,
}

impl CategoryMap {
    pub fn new<I, N, E, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<(String, BTreeSet<String>)> = Vec::new();
        for (name, exts) in raw {
            let name: String = name.into();
            let normalized: BTreeSet<String> = exts
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect();
            match categories.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, slot)) => *slot = normalized,
                None => categories.push((name, normalized)),
            }
        }
        Self { categories }
    }

    pub fn categorize(&self, extension: &str) -> &str {
        let ext = normalize_extension(extension);
        self.categories
            .iter()
            .find(|(_, exts)| exts.contains(&ext))
            .map(|(name, _)| name.as_str())
            .unwrap_or(FALLBACK_CATEGORY)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn range(label: &str, start: NaiveDate, end: NaiveDate) -> TimeRange {
        TimeRange {
            label: label.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn aliases_are_normalized_and_include_canonical_name() {
        let project = ProjectDefinition::new("Longhu Villa", ["  LH ", "", "lh", "龙湖图片"], vec![]);
        let tokens: Vec<&str> = project.alias_tokens.iter().map(String::as_str).collect();
        assert_eq!(tokens, vec!["lh", "longhu villa", "龙湖图片"]);
    }

    #[test]
    fn first_declared_project_wins_regardless_of_alias_length() {
        let projects = vec![
            ProjectDefinition::new("Short", ["湖"], vec![]),
            ProjectDefinition::new("Long", ["龙湖固定家具"], vec![]),
        ];
        let hit = match_project("CAD / 龙湖固定家具(定稿07-04-25)", &projects).expect("match");
        assert_eq!(hit.canonical_name, "Short");

        let reversed: Vec<_> = projects.iter().rev().cloned().collect();
        let hit = match_project("CAD / 龙湖固定家具(定稿07-04-25)", &reversed).expect("match");
        assert_eq!(hit.canonical_name, "Long");
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let projects = vec![ProjectDefinition::new("Vanke", ["vanke"], vec![])];
        assert!(match_project("Photos / VANKE-2011", &projects).is_some());
        assert!(match_project("Photos / misc", &projects).is_none());
    }

    #[test]
    fn time_range_lookup_returns_first_declared_containing_range() {
        let ranges = vec![
            range("A", date(2010, 1, 1), date(2012, 12, 31)),
            range("B", date(2012, 1, 1), date(2014, 12, 31)),
        ];
        let hit = find_time_range(date(2012, 6, 1), &ranges).expect("hit");
        assert_eq!(hit.label, "A");
        assert!(find_time_range(date(2015, 1, 1), &ranges).is_none());
    }

    #[test]
    fn range_miss_reason_distinguishes_before_after_and_gap() {
        let ranges = vec![
            range("2010-2011", date(2010, 1, 1), date(2011, 12, 31)),
            range("2014", date(2014, 1, 1), date(2014, 12, 31)),
        ];
        let before = lookup_time_range(date(2009, 5, 5), &ranges).expect_err("before");
        assert_eq!(before.kind(), RangeMissKind::BeforeEarliest);
        assert!(before.to_string().contains("before earliest project start 2010-01-01"));

        let after = lookup_time_range(date(2016, 1, 1), &ranges).expect_err("after");
        assert_eq!(after.kind(), RangeMissKind::AfterLatest);

        let gap = lookup_time_range(date(2012, 7, 7), &ranges).expect_err("gap");
        assert_eq!(gap.kind(), RangeMissKind::Gap);
        assert!(gap.to_string().contains("2010-01-01-2011-12-31"));

        let none = lookup_time_range(date(2012, 7, 7), &[]).expect_err("none");
        assert_eq!(none, RangeMiss::NoRanges);
    }

    #[test]
    fn categorize_falls_back_to_other() {
        let map = CategoryMap::new([
            ("cad", vec!["dwg", ".DXF"]),
            ("photos", vec![".jpg", "jpeg"]),
        ]);
        assert_eq!(map.categorize(".DWG"), "cad");
        assert_eq!(map.categorize("jpeg"), "photos");
        assert_eq!(map.categorize(".zip"), FALLBACK_CATEGORY);
        assert_eq!(map.categorize(""), FALLBACK_CATEGORY);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn extension_in_two_categories_resolves_to_first_declared() {
        let map = CategoryMap::new([
            ("photos", vec![".jpg", ".png"]),
            ("assets", vec![".jpg", ".psd"]),
        ]);
        assert_eq!(map.categorize(".JPG"), "photos");
        assert_eq!(map.categorize(".psd"), "assets");

        let redeclared = CategoryMap::new([
            ("photos", vec![".png"]),
            ("assets", vec![".jpg"]),
            ("photos", vec![".jpg"]),
        ]);
        assert_eq!(redeclared.len(), 2);
        assert_eq!(redeclared.categorize(".jpg"), "photos");
        assert_eq!(redeclared.categorize(".png"), FALLBACK_CATEGORY);
    }
}
