//! Fixture Source Integration Tests
//!
//! Reading page source and revision history from a fixture directory and
//! attributing a comment against it.

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use talkmark::adapters::{FixtureSource, RevisionSource};
use talkmark::domain::{CommentFormat, DiffBody, DisplayedComment, RevisionDiff, RevisionRef};
use talkmark::{DiffMatcher, Engine};

const SOURCE: &str = "== Archive ==\nPlease move old threads. [[User:Eve|Eve]] 08:15, 2 February 2024 (UTC)\n";

fn revisions() -> Vec<RevisionDiff> {
    let html = r#"<tr><td class="diff-marker">+</td><td class="diff-addedline"><div>Please move old threads. [[User:Eve|Eve]] 08:15, 2 February 2024 (UTC)</div></td></tr>"#;
    vec![
        RevisionDiff {
            revision: RevisionRef {
                id: 502,
                timestamp: Utc.with_ymd_and_hms(2024, 2, 2, 9, 0, 0).unwrap(),
                user: Some("Bot".to_string()),
                comment: Some("tidy".to_string()),
            },
            diff: DiffBody::Html(
                r#"<tr><td class="diff-addedline"><div>{{archive box}}</div></td></tr>"#.to_string(),
            ),
        },
        RevisionDiff {
            revision: RevisionRef {
                id: 501,
                timestamp: Utc.with_ymd_and_hms(2024, 2, 2, 8, 15, 20).unwrap(),
                user: Some("Eve".to_string()),
                comment: Some("new section".to_string()),
            },
            diff: DiffBody::Html(html.to_string()),
        },
    ]
}

fn fixture_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("source.wiki"), SOURCE).unwrap();
    std::fs::write(
        temp.path().join("revisions.json"),
        serde_json::to_string_pretty(&revisions()).unwrap(),
    )
    .unwrap();
    temp
}

#[tokio::test]
async fn test_reads_source_and_revisions() {
    let temp = fixture_dir();
    let source = FixtureSource::new(temp.path());

    assert_eq!(source.name(), "fixtures");
    assert_eq!(source.fetch_source("Talk:Anything").await.unwrap(), SOURCE);

    let all = source.fetch_revisions("Talk:Anything", 50).await.unwrap();
    assert_eq!(all, revisions());

    let newest = source.fetch_revisions("Talk:Anything", 1).await.unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].revision.id, 502);
}

#[tokio::test]
async fn test_missing_history_is_empty() {
    let temp = TempDir::new().unwrap();
    let source = FixtureSource::new(temp.path());
    assert!(source.fetch_revisions("Talk:X", 10).await.unwrap().is_empty());
    assert!(source.fetch_source("Talk:X").await.is_err());
}

#[tokio::test]
async fn test_locate_and_attribute_from_fixtures() {
    let temp = fixture_dir();
    let source = FixtureSource::new(temp.path());
    let engine = Engine::default();

    let comments = vec![DisplayedComment {
        id: Some("c-eve-1".to_string()),
        author: "Eve".to_string(),
        timestamp: Some("08:15, 2 February 2024 (UTC)".to_string()),
        date: None,
        section_headline: Some("Archive".to_string()),
        follows_heading: true,
        text: "Please move old threads. Eve (talk) 08:15, 2 February 2024 (UTC)".to_string(),
        format: CommentFormat::Classic,
    }];
    let fingerprint = engine.fingerprints.build(&comments, 0).unwrap();

    let page = source.fetch_source("Talk:Anything").await.unwrap();
    let found = engine.matcher.locate(&fingerprint, &page).unwrap().into_result().unwrap();
    let (start, end) = found.span();
    assert!(page[start..end].starts_with("Please move old threads."));
    assert!(page[start..end].ends_with("(UTC)"));

    let diffs = source.fetch_revisions("Talk:Anything", 50).await.unwrap();
    let matches = engine.diffs.attribute(&fingerprint, &diffs, None).await;
    let revision = DiffMatcher::pick_best(&matches).into_result().unwrap();
    assert_eq!(revision.id, 501);
    assert_eq!(revision.user.as_deref(), Some("Eve"));
}
