//! services/api/src/adapters/canned.rs
//!
//! An offline `ResearchService` that answers every query with a fixed analysis
//! after a short delay. Used for local development when no LLM key is configured.

use async_trait::async_trait;
use research_copilot_core::domain::{CitedWork, ReferenceRecord, Section};
use research_copilot_core::ports::{ResearchRequest, ResearchService};
use research_copilot_core::query::{QueryError, QueryResponse};
use std::time::Duration;

const SECTION_TITLES: &[&str] = &[
    "Introduction & Background",
    "Current Research Landscape",
    "Methodological Approaches",
    "Key Findings & Patterns",
    "Critical Analysis",
    "Future Directions",
    "Research Gaps",
    "Practical Applications",
    "Open Datasets & Tools",
];

#[derive(Clone)]
pub struct CannedResearchAdapter {
    delay: Duration,
}

impl CannedResearchAdapter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

fn reference(label: &str, year: u16, category: &str) -> ReferenceRecord {
    ReferenceRecord::Structured(CitedWork {
        citation_label: Some(label.to_string()),
        title: Some(format!("Placeholder study by {}", label)),
        venue: Some("Offline sample data".to_string()),
        year: Some(year.to_string()),
        category: Some(category.to_string()),
        ..CitedWork::default()
    })
}

#[async_trait]
impl ResearchService for CannedResearchAdapter {
    async fn research(&self, request: &ResearchRequest) -> Result<QueryResponse, QueryError> {
        tokio::time::sleep(self.delay).await;

        let topic: String = request.query.chars().take(60).collect();
        let sections = SECTION_TITLES
            .iter()
            .take(request.limits.sections as usize)
            .map(|title| Section {
                title: title.to_string(),
                content: format!(
                    "Sample discussion of {} for the \"{}\" section [Doe et al. 2021].",
                    topic, title
                ),
            })
            .collect();

        Ok(QueryResponse {
            summary: format!(
                "Comprehensive literature review completed for \"{}\". Research activity is growing, \
                 with emerging trends in methodology [Doe et al. 2021] and theory [Roe 2019].",
                topic
            ),
            sections,
            references: vec![
                reference("Doe et al. 2021", 2021, "journal"),
                reference("Roe 2019", 2019, "preprint"),
            ],
            key_terms: vec![topic.clone()],
            related_fields: Vec::new(),
            suggested_collaborations: Vec::new(),
        })
    }
}
