//! Rendering of resolved hits into tool output

use budget_rag_core::{format_bbox, ResolvedHit};

/// Separator placed between rendered results
pub const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// Suffixes stripped from file names in the plain tier, in order
const SOURCE_SUFFIXES: &[&str] = &["_grounding.json", ".json", ".md"];

/// How much visual grounding a result can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Chunk metadata plus a cropped image
    Full,
    /// Chunk metadata, no image
    Partial,
    /// Source and content only
    Plain,
}

impl Tier {
    pub fn of(hit: &ResolvedHit) -> Self {
        match (&hit.chunk_id, hit.page(), &hit.image_url) {
            (Some(_), Some(_), Some(_)) => Tier::Full,
            (Some(_), Some(_), None) => Tier::Partial,
            _ => Tier::Plain,
        }
    }
}

/// File name with the parser's suffixes removed
pub fn clean_source_label(file_name: &str) -> String {
    SOURCE_SUFFIXES
        .iter()
        .fold(file_name.to_string(), |label, suffix| label.replace(suffix, ""))
}

/// Render one result using the richest tier its fields allow
pub fn format_result(hit: &ResolvedHit) -> String {
    let score = hit.hit.score;
    let content = hit.display_content();

    match Tier::of(hit) {
        Tier::Full | Tier::Partial => {
            let chunk_id = hit.chunk_id.as_deref().unwrap_or_default();
            let page = hit.page().unwrap_or_default();
            let chunk_type = hit
                .chunk
                .as_ref()
                .map(|c| c.kind().to_string())
                .unwrap_or_else(|| "text".to_string());
            let grounding = match &hit.image_url {
                Some(url) => format!("**Cropped Chunk Image:** {}", url),
                None => format!("**Bbox:** {}", format_bbox(hit.bbox())),
            };

            format!(
                "**Source:** {} (Relevance: {:.2})\n\
                 **Chunk ID:** {}\n\
                 **Page:** {}\n\
                 **Chunk Type:** {}\n\
                 {}\n\
                 \n\
                 **Content:**\n\
                 {}",
                hit.source_label(),
                score,
                chunk_id,
                page,
                chunk_type,
                grounding,
                content
            )
        }
        Tier::Plain => format!(
            "**Source:** {} (Relevance: {:.2})\n**Content:**\n{}",
            clean_source_label(hit.hit.file_name()),
            score,
            content
        ),
    }
}

/// Render and join results
pub fn format_results(hits: &[ResolvedHit]) -> String {
    hits.iter()
        .map(format_result)
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use budget_rag_core::{ChunkRecord, ChunkType, RetrievalHit};

    fn record(page: Option<i64>, bbox: Option<Vec<f64>>) -> ChunkRecord {
        ChunkRecord {
            chunk_id: "c-9".into(),
            chunk_type: Some(ChunkType::Figure),
            page,
            bbox,
            source_document: "budget-2024".into(),
            text: Some("Chart 2.3: Real GDP growth".into()),
        }
    }

    fn resolved(page: Option<i64>, bbox: Option<Vec<f64>>) -> ResolvedHit {
        ResolvedHit::from_record(
            RetrievalHit::new("raw", 0.8765, "s3://b/output/budget_chunks/c-9.json"),
            record(page, bbox),
        )
    }

    #[test]
    fn test_full_tier() {
        let hit = resolved(Some(4), Some(vec![0.1, 0.2, 0.3, 0.4]))
            .with_image("https://img.example/c-9.png");

        assert_eq!(Tier::of(&hit), Tier::Full);
        let text = format_result(&hit);
        assert_eq!(
            text,
            "**Source:** budget-2024 (Relevance: 0.88)\n\
             **Chunk ID:** c-9\n\
             **Page:** 4\n\
             **Chunk Type:** figure\n\
             **Cropped Chunk Image:** https://img.example/c-9.png\n\
             \n\
             **Content:**\n\
             Chart 2.3: Real GDP growth"
        );
    }

    #[test]
    fn test_partial_tier() {
        let hit = resolved(Some(4), Some(vec![0.1, 0.2, 0.3, 0.4]));

        assert_eq!(Tier::of(&hit), Tier::Partial);
        let text = format_result(&hit);
        assert!(text.contains("**Bbox:** [0.1, 0.2, 0.3, 0.4]"));
        assert!(!text.contains("Cropped Chunk Image:"));
    }

    #[test]
    fn test_partial_tier_without_bbox() {
        let text = format_result(&resolved(Some(0), None));
        assert!(text.contains("**Bbox:** Not available"));
        assert!(text.contains("**Page:** 0"));
    }

    #[test]
    fn test_missing_page_is_plain() {
        let hit = resolved(None, None).with_image("https://img.example/x.png");
        assert_eq!(Tier::of(&hit), Tier::Plain);
    }

    #[test]
    fn test_plain_tier() {
        let hit = ResolvedHit::unresolved(RetrievalHit::new(
            "Carbon pricing returns",
            0.5,
            "s3://b/output/budget-2024_grounding.json",
        ));

        let text = format_result(&hit);
        assert_eq!(
            text,
            "**Source:** budget-2024 (Relevance: 0.50)\n**Content:**\nCarbon pricing returns"
        );
        assert!(!text.contains("Page:"));
        assert!(!text.contains("Chunk ID:"));
    }

    #[test]
    fn test_markdown_identity_alone_is_plain() {
        let hit = ResolvedHit::unresolved(RetrievalHit::new("x", 0.1, "s3://b/doc.md"))
            .with_chunk_id("md-1");
        assert_eq!(Tier::of(&hit), Tier::Plain);
        assert!(!format_result(&hit).contains("Chunk ID:"));
    }

    #[test]
    fn test_clean_source_label() {
        assert_eq!(clean_source_label("doc_grounding.json"), "doc");
        assert_eq!(clean_source_label("doc.json"), "doc");
        assert_eq!(clean_source_label("doc.md"), "doc");
        assert_eq!(clean_source_label("Unknown source"), "Unknown source");
    }

    #[test]
    fn test_format_results_joins_with_separator() {
        let hits = vec![
            ResolvedHit::unresolved(RetrievalHit::new("one", 0.9, "a.md")),
            ResolvedHit::unresolved(RetrievalHit::new("two", 0.8, "b.md")),
        ];
        let text = format_results(&hits);
        assert_eq!(text.matches(RESULT_SEPARATOR).count(), 1);
        assert!(text.find("one").unwrap() < text.find("two").unwrap());
    }
}
