//! End-to-end pipeline runs against in-memory stores and a scripted oracle.

use std::sync::Arc;

use chrono::Utc;
use pretty_assertions::assert_eq;

use userprofile::error::ValidationError;
use userprofile::llm::ChatMessage;
use userprofile::oracle::ProfileOracle;
use userprofile::profile::{
    AdditionalProfile, BasicInfoField, Degree, Evidence, FamilyEntry, PersonEntry, Profile,
    ProfileField, RelationGraph, RelationKey, TraitItem,
};
use userprofile::service::{FieldSource, GetProfileOptions, ProfileService};
use userprofile::testing::{MemoryBasicInfoStore, MemoryDocumentStore, StubLlm};

struct Harness {
    service: ProfileService,
    basic: Arc<MemoryBasicInfoStore>,
    docs: Arc<MemoryDocumentStore>,
    llm: Arc<StubLlm>,
}

fn harness(replies: &[&str]) -> Harness {
    let llm = Arc::new(StubLlm::scripted(replies.iter().copied()));
    let basic = Arc::new(MemoryBasicInfoStore::default());
    let docs = Arc::new(MemoryDocumentStore::default());
    let service = ProfileService::new(ProfileOracle::new(llm.clone()), basic.clone(), docs.clone());
    Harness {
        service,
        basic,
        docs,
        llm,
    }
}

fn trait_item(id: &str, name: &str, degree: i64) -> TraitItem {
    TraitItem {
        id: id.to_string(),
        name: name.to_string(),
        degree: Degree::clamped(degree),
        evidence: vec![Evidence::new("said so earlier", Utc::now())],
    }
}

async fn read_all(service: &ProfileService, user: &str) -> Profile {
    service
        .get_profile(
            user,
            &GetProfileOptions {
                evidence_limit: Some(-1),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn new_user_gets_an_interest_from_one_message() {
    let h = harness(&[
        r#"{"basic_info": {}, "additional_profile": {"interests": [{"name": "soccer", "degree": 4, "evidence": [{"text": "I like soccer"}]}]}}"#,
        r#"```json
{"basic_info": {}, "additional_profile": {"interests": [{"id": null, "event": "ADD", "name": "soccer", "degree": 4, "evidence": [{"text": "I like soccer"}]}]}}
```"#,
    ]);

    let outcome = h
        .service
        .set_profile("child-1", &[ChatMessage::user("I like soccer")])
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.errors);
    assert!(outcome.additional_profile_updated);
    assert!(!outcome.basic_info_updated);
    assert_eq!(outcome.operations_performed.added, 1);
    assert_eq!(h.llm.calls(), 2);

    let profile = read_all(&h.service, "child-1").await;
    let interests = &profile.additional_profile.interests;
    assert_eq!(interests.len(), 1);
    assert_eq!(interests[0].name, "soccer");
    assert!((1..=5).contains(&interests[0].degree.get()));
    assert_eq!(interests[0].evidence.len(), 1);
    assert!(!interests[0].id.is_empty());
}

#[tokio::test]
async fn adding_a_spouse_keeps_the_father() {
    let h = harness(&[
        r#"{"additional_profile": {"social_context": {"family": {"spouse": {"name": "Lin", "info": ["nurse"]}}}}}"#,
        r#"{"additional_profile": {"social_context": {"family": {"spouse": {"name": "Lin", "info": ["nurse"], "event": "ADD"}}}}}"#,
    ]);
    let mut graph = RelationGraph::default();
    graph.family.insert(
        RelationKey::Father,
        FamilyEntry::Single(PersonEntry::new(Some("Wang"), &["retired teacher"])),
    );
    h.docs.insert(
        "u2",
        &AdditionalProfile {
            social_context: Some(graph),
            ..Default::default()
        },
    );

    let outcome = h
        .service
        .set_profile("u2", &[ChatMessage::user("My wife Lin is a nurse")])
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.errors);

    let profile = read_all(&h.service, "u2").await;
    let graph = profile.additional_profile.social_context.unwrap();
    assert_eq!(
        graph.single(RelationKey::Father),
        Some(&PersonEntry::new(Some("Wang"), &["retired teacher"]))
    );
    assert_eq!(
        graph.single(RelationKey::Spouse).and_then(|p| p.name.as_deref()),
        Some("Lin")
    );
}

#[tokio::test]
async fn delete_then_everything_is_missing() {
    let h = harness(&["{}"]);
    h.docs.insert(
        "u3",
        &AdditionalProfile {
            interests: vec![trait_item("i-1", "chess", 3)],
            ..Default::default()
        },
    );

    let deleted = h.service.delete_profile("u3").await.unwrap();
    assert!(deleted.success);
    assert!(deleted.additional_profile_deleted);
    assert!(!deleted.basic_info_deleted);

    let missing = h
        .service
        .missing_fields("u3", FieldSource::Both)
        .await
        .unwrap();
    assert_eq!(
        missing.missing_fields.basic_info,
        Some(BasicInfoField::ALL.to_vec())
    );
    assert_eq!(
        missing.missing_fields.additional_profile,
        Some(ProfileField::ALL.to_vec())
    );

    let json = serde_json::to_value(&missing).unwrap();
    assert_eq!(json["user_id"], "u3");
    assert_eq!(json["missing_fields"]["basic_info"][0], "name");
    assert_eq!(
        json["missing_fields"]["additional_profile"]
            .as_array()
            .unwrap()
            .len(),
        ProfileField::ALL.len()
    );
}

#[tokio::test]
async fn unknown_surrogate_is_a_no_op_and_the_rest_applies() {
    let h = harness(&[
        r#"{"additional_profile": {"interests": [{"name": "chess", "degree": 3, "evidence": ["I play chess"]}]}}"#,
        r#"{"additional_profile": {"interests": [
            {"id": 42, "event": "UPDATE", "name": "ghost", "degree": 5, "evidence": ["nothing"]},
            {"id": 1, "event": "UPDATE", "degree": 5, "evidence": ["I love soccer now"]},
            {"id": null, "event": "ADD", "name": "chess", "degree": 3, "evidence": ["I play chess"]}
        ]}}"#,
    ]);
    h.docs.insert(
        "u4",
        &AdditionalProfile {
            interests: vec![trait_item("opaque-soccer", "soccer", 2)],
            ..Default::default()
        },
    );

    let outcome = h
        .service
        .set_profile("u4", &[ChatMessage::user("I love soccer and play chess")])
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.errors);
    assert_eq!(outcome.operations_performed.added, 1);
    assert_eq!(outcome.operations_performed.updated, 1);

    let decide_prompt = &h.llm.requests()[1].messages[0].content;
    assert!(!decide_prompt.contains("opaque-soccer"));

    let interests = read_all(&h.service, "u4").await.additional_profile.interests;
    assert_eq!(interests.len(), 2);
    assert_eq!(interests[0].id, "opaque-soccer");
    assert_eq!(interests[0].degree.get(), 5);
    assert_eq!(interests[0].evidence.len(), 2);
    assert_eq!(interests[1].name, "chess");
    assert!(interests.iter().all(|i| i.name != "ghost"));
}

#[tokio::test]
async fn basic_info_is_written_to_the_scalar_store() {
    let h = harness(&[
        r#"{"basic_info": {"name": "Xiao Ming", "school_name": "Sunshine Primary"}}"#,
        r#"{"basic_info": {"name": "Xiao Ming", "school_name": "Sunshine Primary"}}"#,
    ]);

    let outcome = h
        .service
        .set_profile("u5", &[ChatMessage::user("I'm Xiao Ming from Sunshine Primary")])
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.errors);
    assert!(outcome.basic_info_updated);
    assert!(!outcome.additional_profile_updated);

    let profile = read_all(&h.service, "u5").await;
    assert_eq!(profile.basic_info.get(BasicInfoField::Name), Some("Xiao Ming"));
    assert_eq!(
        profile.basic_info.get(BasicInfoField::SchoolName),
        Some("Sunshine Primary")
    );
}

#[tokio::test]
async fn scalar_failure_does_not_stop_document_writes() {
    let h = harness(&[
        r#"{"basic_info": {"name": "Ann"}, "additional_profile": {"skills": [{"name": "drawing", "degree": 2, "evidence": ["I draw"]}]}}"#,
        r#"{"basic_info": {"name": "Ann"}, "additional_profile": {"skills": [{"event": "ADD", "name": "drawing", "degree": 2, "evidence": ["I draw"]}]}}"#,
    ]);
    h.basic.fail_writes(true);

    let outcome = h
        .service
        .set_profile("u6", &[ChatMessage::user("I'm Ann and I draw")])
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(!outcome.basic_info_updated);
    assert!(outcome.additional_profile_updated);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("basic_info"));
}

#[tokio::test]
async fn oracle_failure_reports_without_writing() {
    let llm = Arc::new(StubLlm::failing());
    let docs = Arc::new(MemoryDocumentStore::default());
    let service = ProfileService::new(
        ProfileOracle::new(llm.clone()),
        Arc::new(MemoryBasicInfoStore::default()),
        docs.clone(),
    );

    let outcome = service
        .set_profile("u7", &[ChatMessage::user("I like soccer")])
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(llm.calls(), 1);
    assert!(read_all(&service, "u7").await.additional_profile.is_empty());
}

#[tokio::test]
async fn input_validation() {
    let h = harness(&["{}"]);
    assert_eq!(
        h.service
            .set_profile(" ", &[ChatMessage::user("hi")])
            .await
            .unwrap_err(),
        ValidationError::MissingUserId
    );
    assert_eq!(
        h.service.set_profile("u8", &[]).await.unwrap_err(),
        ValidationError::EmptyMessages
    );
    assert!("redis".parse::<FieldSource>().is_err());
    assert_eq!(h.llm.calls(), 0);
}
