//! Search E2E tests: parsed queries against an owner's documents.

use pretty_assertions::assert_eq;

use e2e_tests::{document, tagged, TestHarness};
use tagbot_query::ParsedQuery;
use tagbot_types::{DocumentAttribute, MediaFile, MediaKind, MediaShape};

const OWNER: i64 = 11;

fn parse(harness: &TestHarness, text: &str) -> ParsedQuery {
    let result = harness.parser.parse_query(text);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    result.query
}

#[tokio::test]
async fn test_type_and_tag_query_pages_by_recency() {
    let harness = TestHarness::new().await;
    for id in 0..50 {
        harness
            .seed(&document(OWNER, id, MediaKind::Photo, &["cute"], 100 + id))
            .await;
    }
    harness
        .seed(&document(OWNER, 900, MediaKind::Gif, &["cute"], 10_000))
        .await;
    harness
        .seed(&document(OWNER, 901, MediaKind::Photo, &["ugly"], 10_000))
        .await;
    harness
        .seed(&document(OWNER + 1, 0, MediaKind::Photo, &["cute"], 10_000))
        .await;

    let query = parse(&harness, "type:photo cute");
    let page = harness.search.search(OWNER, &query, 0).await.unwrap();

    assert_eq!(page.documents.len(), 50);
    assert_eq!(page.next_offset, Some(1));
    for doc in &page.documents {
        assert_eq!(doc.owner, OWNER);
        assert_eq!(doc.kind, MediaKind::Photo);
        assert!(doc.tags.contains("cute"));
    }
    let recency: Vec<i64> = page.documents.iter().map(|d| d.last_used).collect();
    let expected: Vec<i64> = (100..150).rev().collect();
    assert_eq!(recency, expected);

    let next = harness.search.search(OWNER, &query, 1).await.unwrap();
    assert!(next.documents.is_empty());
    assert_eq!(next.next_offset, None);
}

#[tokio::test]
async fn test_short_page_stops_pagination() {
    let harness = TestHarness::new().await;
    for id in 0..3 {
        harness
            .seed(&document(OWNER, id, MediaKind::Sticker, &["x"], id))
            .await;
    }
    let page = harness
        .search
        .search(OWNER, &parse(&harness, "x"), 0)
        .await
        .unwrap();
    assert_eq!(page.documents.len(), 3);
    assert_eq!(page.next_offset, None);
}

#[tokio::test]
async fn test_no_query_leaks_other_owners() {
    let harness = TestHarness::new().await;
    harness
        .seed(&document(OWNER, 1, MediaKind::Photo, &["shared"], 1))
        .await;
    harness
        .seed(&document(OWNER + 1, 2, MediaKind::Photo, &["shared"], 2))
        .await;

    for text in ["", "shared", "-shared", "type:photo", "-type:gif"] {
        let page = harness
            .search
            .search(OWNER, &parse(&harness, text), 0)
            .await
            .unwrap();
        assert!(
            page.documents.iter().all(|d| d.owner == OWNER),
            "query {:?} leaked documents",
            text
        );
    }
}

#[tokio::test]
async fn test_negated_predicates_exclude() {
    let harness = TestHarness::new().await;
    harness
        .seed(&document(OWNER, 1, MediaKind::Photo, &["cat", "blurry"], 1))
        .await;
    harness
        .seed(&document(OWNER, 2, MediaKind::Photo, &["cat"], 2))
        .await;
    harness
        .seed(&document(OWNER, 3, MediaKind::Gif, &["cat"], 3))
        .await;

    let page = harness
        .search
        .search(OWNER, &parse(&harness, "cat -blurry !type:gif"), 0)
        .await
        .unwrap();
    let ids: Vec<i64> = page.documents.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![2]);
}

#[tokio::test]
async fn test_tagged_audio_is_found_by_type() {
    let harness = TestHarness::new().await;
    let audio = MediaFile::new(
        1,
        10,
        MediaShape::Document {
            attributes: vec![DocumentAttribute::Audio { voice: false }],
        },
    );
    let stored = tagged(harness.tag(OWNER, &audio, "song").await);
    assert_eq!(stored.kind, MediaKind::Audio);
    harness
        .seed(&document(OWNER, 2, MediaKind::File, &["song"], 2))
        .await;

    let page = harness
        .search
        .search(OWNER, &parse(&harness, "type:audio song"), 0)
        .await
        .unwrap();
    let ids: Vec<i64> = page.documents.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(page.result_kind, Some(MediaKind::File));

    let page = harness
        .search
        .search(OWNER, &parse(&harness, "type:file song"), 0)
        .await
        .unwrap();
    let ids: Vec<i64> = page.documents.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![2]);
}

#[tokio::test]
async fn test_title_query_matches_words() {
    let harness = TestHarness::new().await;
    let mut doc = document(OWNER, 1, MediaKind::Audio, &[], 1);
    doc.title = Some("Alstroemeria - Bad Apple".to_string());
    harness.seed(&doc).await;

    let hit = harness
        .search
        .search(OWNER, &parse(&harness, "t:apple"), 0)
        .await
        .unwrap();
    assert_eq!(hit.documents.len(), 1);

    let miss = harness
        .search
        .search(OWNER, &parse(&harness, "t:orange"), 0)
        .await
        .unwrap();
    assert!(miss.documents.is_empty());
}

#[tokio::test]
async fn test_selection_moves_result_to_front() {
    let harness = TestHarness::new().await;
    harness
        .seed(&document(OWNER, 1, MediaKind::Photo, &["pick"], 1))
        .await;
    harness
        .seed(&document(OWNER, 2, MediaKind::Photo, &["pick"], 2))
        .await;

    assert!(harness.search.record_selection(OWNER, 1).await.unwrap());
    assert!(!harness.search.record_selection(OWNER + 1, 1).await.unwrap());

    let page = harness
        .search
        .search(OWNER, &parse(&harness, "pick"), 0)
        .await
        .unwrap();
    let ids: Vec<i64> = page.documents.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![1, 2]);
}
