//! Service-level tests against the in-memory store with hashing encoders.

use std::sync::Arc;

use research_folio::analysis::Analyzer;
use research_folio::config::TopicsConfig;
use research_folio::embedding::HashingEncoder;
use research_folio::models::{NewCategory, NewPaper, NewTag, PaperStatus, PaperUpdate};
use research_folio::registry::ModelRegistry;
use research_folio::service::{ResearchService, ServiceError};
use research_folio::store::memory::InMemoryStore;

fn service() -> ResearchService {
    let models = ModelRegistry::from_encoders(
        Arc::new(HashingEncoder::new(128)),
        Arc::new(HashingEncoder::new(128)),
        Arc::new(HashingEncoder::new(128)),
        TopicsConfig::default(),
    );
    ResearchService::new(
        Arc::new(InMemoryStore::new()),
        Analyzer::new(Arc::new(models)),
    )
}

fn paper(title: &str, abstract_text: &str, content: &str) -> NewPaper {
    NewPaper {
        title: title.to_string(),
        abstract_text: Some(abstract_text.to_string()),
        content: Some(content.to_string()),
        ..NewPaper::default()
    }
}

#[tokio::test]
async fn create_fills_analysis_embedding_and_topics() {
    let svc = service();
    let created = svc
        .create(paper(
            "Reinforcement learning for routing",
            "We propose a novel policy gradient method.",
            "Experiments used a simulation. The agent was trained with a neural policy.",
        ))
        .await
        .unwrap();

    assert_eq!(created.status, PaperStatus::Draft);
    assert!(created.analysis.is_some());
    assert_eq!(created.embedding.len(), 128);
    assert_eq!(created.topics.len(), 10);

    let fetched = svc.get(created.id).await.unwrap();
    assert_eq!(fetched.title, created.title);
    assert_eq!(fetched.analysis, created.analysis);
}

#[tokio::test]
async fn keyword_only_update_keeps_analysis() {
    let svc = service();
    let created = svc
        .create(paper("Sparse coding", "Dictionary learning.", "We ran experiments."))
        .await
        .unwrap();

    let updated = svc
        .update(
            created.id,
            PaperUpdate {
                keywords: Some(vec!["sparsity".into()]),
                ..PaperUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.keywords, vec!["sparsity"]);
    assert_eq!(updated.analysis, created.analysis);
    assert_eq!(updated.embedding, created.embedding);
}

#[tokio::test]
async fn title_update_recomputes_embedding() {
    let svc = service();
    let created = svc
        .create(paper("Sparse coding", "Dictionary learning.", "We ran experiments."))
        .await
        .unwrap();

    let updated = svc
        .update(
            created.id,
            PaperUpdate {
                title: Some("Quantum error correction".into()),
                ..PaperUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(updated.embedding, created.embedding);
}

#[tokio::test]
async fn similar_excludes_self_and_ranks_by_closeness() {
    let svc = service();
    let a = svc
        .create(paper("Ocean acidification", "Carbon uptake in seawater.", ""))
        .await
        .unwrap();
    let b = svc
        .create(paper("Ocean acidification trends", "Carbon uptake in seawater over decades.", ""))
        .await
        .unwrap();
    svc.create(paper("Baroque counterpoint", "Fugue analysis in Bach.", ""))
        .await
        .unwrap();

    let similar = svc.similar(a.id, 5).await.unwrap();
    assert_eq!(similar.len(), 2);
    assert_eq!(similar[0].id, b.id);
    assert!(similar.iter().all(|s| s.id != a.id));
    assert!(similar[0].similarity_score >= similar[1].similarity_score);
}

#[tokio::test]
async fn similar_accepts_the_largest_limit() {
    let svc = service();
    let a = svc
        .create(paper("Coral bleaching", "Heat stress on reefs.", ""))
        .await
        .unwrap();
    let b = svc
        .create(paper("Coral bleaching events", "Heat stress on reefs worldwide.", ""))
        .await
        .unwrap();

    let similar = svc.similar(a.id, i64::MAX).await.unwrap();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].id, b.id);
}

#[tokio::test]
async fn search_and_category_filters() {
    let svc = service();
    let ml = svc
        .create_category(NewCategory {
            name: "ML".into(),
            description: None,
        })
        .await
        .unwrap();

    svc.create(NewPaper {
        category_ids: vec![ml.id],
        ..paper("Kernel methods", "Support vector machines.", "")
    })
    .await
    .unwrap();
    svc.create(paper("Glacier retreat", "Alpine glaciers are shrinking.", ""))
        .await
        .unwrap();

    let in_ml = svc.list(0, 10, Some("ML".into()), None).await.unwrap();
    assert_eq!(in_ml.len(), 1);
    assert_eq!(in_ml[0].title, "Kernel methods");

    let hits = svc.list(0, 10, None, Some("glaciers".into())).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Glacier retreat");

    assert_eq!(svc.list(0, 10, None, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn tags_get_slugs_and_usage_counts() {
    let svc = service();
    let tag = svc
        .create_tag(NewTag {
            name: "Computer Vision".into(),
            slug: None,
            description: None,
            color: None,
        })
        .await
        .unwrap();
    assert_eq!(tag.slug, "computer-vision");
    assert_eq!(tag.usage_count, 0);

    svc.create(NewPaper {
        tag_ids: vec![tag.id],
        ..paper("Object detection", "", "")
    })
    .await
    .unwrap();

    let tags = svc.list_tags().await.unwrap();
    assert_eq!(tags[0].usage_count, 1);

    let dup = svc
        .create_tag(NewTag {
            name: "computer vision".into(),
            slug: None,
            description: None,
            color: None,
        })
        .await;
    assert!(matches!(dup, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn unknown_links_and_missing_papers() {
    let svc = service();

    let err = svc
        .create(NewPaper {
            category_ids: vec![42],
            ..paper("Orphan", "", "")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    assert!(matches!(svc.get(7).await, Err(ServiceError::NotFound(_))));
    assert!(matches!(svc.delete(7).await, Err(ServiceError::NotFound(_))));
    assert!(matches!(svc.delete_category(7).await, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn delete_removes_paper_from_search() {
    let svc = service();
    let created = svc
        .create(paper("Volcanic ash dispersion", "Plume modelling.", ""))
        .await
        .unwrap();
    svc.delete(created.id).await.unwrap();

    assert!(svc.list(0, 10, None, Some("volcanic".into())).await.unwrap().is_empty());
    assert!(matches!(svc.get(created.id).await, Err(ServiceError::NotFound(_))));
}
