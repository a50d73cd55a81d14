//! crates/research_copilot_core/src/citation.rs
//!
//! Splits generated prose into plain text and inline citation markers such as
//! `[Smith et al. 2021]`, and resolves each marker against the result's references.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::domain::{QueryResult, ReferenceCategory, ReferenceRecord};

/// Element id of the bibliography block that unresolved citations scroll to.
pub const REFERENCES_ANCHOR: &str = "references-section";

/// A bracketed label whose last four characters are a year.
fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[([^\[\]]+\d{4})\]").expect("citation pattern is a valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Segment {
    Text {
        content: String,
    },
    Citation {
        /// The marker exactly as it appeared, brackets included.
        marker: String,
        /// The marker without brackets.
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<ReferenceRecord>,
    },
}

/// Where a rendered citation points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "href", rename_all = "camelCase")]
pub enum CitationLink {
    External(String),
    Anchor(String),
}

impl Segment {
    /// The original text this segment was cut from.
    pub fn as_source(&self) -> &str {
        match self {
            Segment::Text { content } => content,
            Segment::Citation { marker, .. } => marker,
        }
    }

    /// Link target for a citation; `None` for plain text.
    pub fn link(&self) -> Option<CitationLink> {
        match self {
            Segment::Text { .. } => None,
            Segment::Citation { reference, .. } => Some(
                match reference.as_ref().and_then(ReferenceRecord::url) {
                    Some(url) => CitationLink::External(url.to_string()),
                    None => CitationLink::Anchor(REFERENCES_ANCHOR.to_string()),
                },
            ),
        }
    }
}

/// Splits `content` into text and citation segments.
///
/// With no references there is nothing to link to, so the whole input comes back
/// as one text segment without scanning.
pub fn parse(content: &str, references: &[ReferenceRecord]) -> Vec<Segment> {
    if references.is_empty() {
        return vec![Segment::Text {
            content: content.to_string(),
        }];
    }

    let mut segments = Vec::new();
    let mut last = 0;
    for caps in citation_pattern().captures_iter(content) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text {
                content: content[last..whole.start()].to_string(),
            });
        }
        segments.push(Segment::Citation {
            marker: whole.as_str().to_string(),
            label: label.as_str().to_string(),
            reference: find_reference(label.as_str(), references).cloned(),
        });
        last = whole.end();
    }
    if last < content.len() || segments.is_empty() {
        segments.push(Segment::Text {
            content: content[last..].to_string(),
        });
    }
    segments
}

/// First reference whose year, label, or first label word occurs in `label`.
pub fn find_reference<'a>(
    label: &str,
    references: &'a [ReferenceRecord],
) -> Option<&'a ReferenceRecord> {
    let label_lower = label.to_lowercase();
    references.iter().find(|reference| {
        let Some(work) = reference.as_work() else {
            return false;
        };
        let year_hit = work
            .year
            .as_deref()
            .is_some_and(|year| !year.is_empty() && label.contains(year));
        let (label_hit, first_word_hit) = match work.citation_label.as_deref() {
            Some(citation) => {
                let citation = citation.to_lowercase();
                let first = citation.split_whitespace().next().unwrap_or("");
                (
                    !citation.is_empty() && label_lower.contains(&citation),
                    !first.is_empty() && label_lower.contains(first),
                )
            }
            None => (false, false),
        };
        year_hit || label_hit || first_word_hit
    })
}

//=========================================================================================
// Whole results
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedSection {
    pub title: String,
    pub segments: Vec<Segment>,
}

/// A query result with its prose already cut into renderable segments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedResult {
    pub summary: Vec<Segment>,
    pub sections: Vec<LinkedSection>,
    pub reference_stats: ReferenceStats,
}

pub fn link_result(result: &QueryResult) -> LinkedResult {
    LinkedResult {
        summary: parse(&result.summary, &result.references),
        sections: result
            .sections
            .iter()
            .map(|section| LinkedSection {
                title: section.title.clone(),
                segments: parse(&section.content, &result.references),
            })
            .collect(),
        reference_stats: ReferenceStats::of(&result.references),
    }
}

/// Reference counts by category, for the bibliography footer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceStats {
    pub total: usize,
    pub by_category: HashMap<ReferenceCategory, usize>,
}

impl ReferenceStats {
    pub fn of(references: &[ReferenceRecord]) -> Self {
        let mut by_category = HashMap::new();
        for work in references.iter().filter_map(ReferenceRecord::as_work) {
            *by_category.entry(work.category()).or_insert(0) += 1;
        }
        Self {
            total: references.len(),
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CitedWork;
    use pretty_assertions::assert_eq;

    fn work(label: &str, year: &str, url: Option<&str>) -> ReferenceRecord {
        ReferenceRecord::Structured(CitedWork {
            citation_label: Some(label.to_string()),
            year: Some(year.to_string()),
            url: url.map(str::to_string),
            ..CitedWork::default()
        })
    }

    fn rebuild(segments: &[Segment]) -> String {
        segments.iter().map(Segment::as_source).collect()
    }

    #[test]
    fn text_without_markers_is_one_segment() {
        let refs = vec![work("Smith", "2020", None)];
        let segments = parse("No citations here.", &refs);
        assert_eq!(
            segments,
            vec![Segment::Text {
                content: "No citations here.".into()
            }]
        );
    }

    #[test]
    fn markers_split_and_round_trip() {
        let refs = vec![work("Smith", "2020", Some("https://doi.org/10.1/x"))];
        let input = "See [Smith 2020] and [Lee et al. 2021].";
        let segments = parse(input, &refs);

        assert_eq!(segments.len(), 5);
        assert!(matches!(&segments[0], Segment::Text { content } if content == "See "));
        match &segments[1] {
            Segment::Citation { label, reference, .. } => {
                assert_eq!(label, "Smith 2020");
                assert_eq!(reference.as_ref(), Some(&refs[0]));
            }
            other => panic!("expected citation, got {:?}", other),
        }
        assert!(matches!(&segments[3], Segment::Citation { reference: None, .. }));
        assert!(matches!(&segments[4], Segment::Text { content } if content == "."));
        assert_eq!(rebuild(&segments), input);
    }

    #[test]
    fn empty_reference_list_skips_scanning() {
        let input = "Known result [Smith 2020].";
        assert_eq!(
            parse(input, &[]),
            vec![Segment::Text {
                content: input.into()
            }]
        );
    }

    #[test]
    fn malformed_brackets_pass_through() {
        let refs = vec![work("Smith", "2020", None)];
        let input = "Unclosed [Smith 2020 and [no year] and [[2020]";
        let segments = parse(input, &refs);
        assert!(segments.iter().all(|s| matches!(s, Segment::Text { .. })));
        assert_eq!(rebuild(&segments), input);
    }

    #[test]
    fn matching_prefers_list_order() {
        let refs = vec![work("Garcia", "2018", None), work("Lee et al.", "2021", None)];
        assert_eq!(find_reference("Lee et al. 2021", &refs), Some(&refs[1]));
        assert_eq!(find_reference("Garcia and Lee 2021", &refs), Some(&refs[0]));
        assert_eq!(find_reference("LEE 2022", &refs), Some(&refs[1]));
        assert_eq!(find_reference("Okafor 2015", &refs), None);
    }

    #[test]
    fn legacy_urls_never_match() {
        let refs = vec![ReferenceRecord::LegacyUrl("https://example.org".into())];
        assert_eq!(find_reference("Smith 2020", &refs), None);
    }

    #[test]
    fn links_route_by_url_presence() {
        let refs = vec![
            work("Smith", "2020", Some("https://doi.org/10.1/x")),
            work("Lee", "2021", None),
        ];
        let segments = parse("[Smith 2020][Lee 2021][Park 2019]", &refs);
        let links: Vec<_> = segments.iter().filter_map(Segment::link).collect();
        assert_eq!(
            links,
            vec![
                CitationLink::External("https://doi.org/10.1/x".into()),
                CitationLink::Anchor(REFERENCES_ANCHOR.into()),
                CitationLink::Anchor(REFERENCES_ANCHOR.into()),
            ]
        );
    }

    #[test]
    fn stats_count_categories() {
        let mut journal = CitedWork::default();
        journal.category = Some("journal".into());
        let mut preprint = CitedWork::default();
        preprint.category = Some("Preprint".into());
        let refs = vec![
            ReferenceRecord::Structured(journal.clone()),
            ReferenceRecord::Structured(journal),
            ReferenceRecord::Structured(preprint),
            ReferenceRecord::LegacyUrl("https://example.org".into()),
        ];
        let stats = ReferenceStats::of(&refs);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_category.get(&ReferenceCategory::Journal), Some(&2));
        assert_eq!(stats.by_category.get(&ReferenceCategory::Preprint), Some(&1));
    }
}
