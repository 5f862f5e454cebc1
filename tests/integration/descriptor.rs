//! Handoff file to deployment descriptor pull request.

use crate::common::TestRepo;
use crate::{config_for, publisher};
use jarflow::core::JarflowError;
use jarflow::descriptor::DescriptorOutcome;
use jarflow::handoff::Handoff;
use jarflow::image::ImageTag;
use jarflow::pipeline::descriptor_stage;
use jarflow::publisher::PublishOutcome;
use jarflow::test_utils::{MockHostingApi, fixtures};

const IMAGE: &str =
    "123456789012.dkr.ecr.ap-northeast-1.amazonaws.com/apache-nifi-with-custom-jars-repo";

#[tokio::test]
async fn test_handoff_tag_rewrites_descriptor_in_pull_request() {
    let repo = TestRepo::new().unwrap();
    let config = config_for(&repo);
    Handoff::write(&config.handoff_path, &ImageTag::parse("abc1234").unwrap()).unwrap();
    let api = MockHostingApi::new();

    let handoff = Handoff::read(&config.handoff_path).unwrap();
    let outcome = descriptor_stage(&config, handoff, &publisher(&api)).await.unwrap();

    match outcome {
        DescriptorOutcome::Published {
            previous_tag,
            outcome: PublishOutcome::Created { .. },
        } => assert_eq!(previous_tag, "latest"),
        other => panic!("expected a new pull request, got {other:?}"),
    }

    let pulls = api.open_pulls();
    assert_eq!(pulls.len(), 1);
    let pull = &pulls[0];
    assert_eq!(pull.title, "[Auto] Update NiFi Docker image to abc1234");
    assert_eq!(pull.head, "auto/update-task-def-abc1234");
    assert_eq!(pull.labels, vec!["automated", "infrastructure", "ecs"]);

    let expected = fixtures::TASK_DEFINITION
        .replace(&format!("{IMAGE}:latest"), &format!("{IMAGE}:abc1234"));
    assert_eq!(pull.files["ecs_task_definition.tf"], expected);

    // the local descriptor is left for the pull request to change
    assert_eq!(repo.read("ecs_task_definition.tf"), fixtures::TASK_DEFINITION);
}

#[tokio::test]
async fn test_descriptor_already_on_tag_needs_no_pull_request() {
    let repo = TestRepo::new().unwrap();
    repo.write_file(
        "ecs_task_definition.tf",
        &fixtures::TASK_DEFINITION.replace(":latest", ":abc1234"),
    )
    .unwrap();
    let config = config_for(&repo);
    let api = MockHostingApi::new();

    let tag = ImageTag::parse("abc1234").unwrap();
    let outcome = descriptor_stage(&config, Handoff::Present(tag), &publisher(&api)).await.unwrap();

    assert!(matches!(outcome, DescriptorOutcome::AlreadyCurrent { .. }));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_missing_handoff_fails_before_any_api_call() {
    let repo = TestRepo::new().unwrap();
    let config = config_for(&repo);
    let api = MockHostingApi::new();

    let handoff = Handoff::read(&config.handoff_path).unwrap();
    assert_eq!(handoff, Handoff::Absent);

    let err = descriptor_stage(&config, handoff, &publisher(&api)).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<JarflowError>(), Some(JarflowError::MissingImageTag { .. })));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_descriptor_without_image_reference_fails() {
    let repo = TestRepo::new().unwrap();
    repo.write_file("ecs_task_definition.tf", "resource \"aws_ecs_service\" \"nifi\" {}\n").unwrap();
    let config = config_for(&repo);
    let api = MockHostingApi::new();

    let tag = ImageTag::parse("abc1234").unwrap();
    let err = descriptor_stage(&config, Handoff::Present(tag), &publisher(&api)).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<JarflowError>(),
        Some(JarflowError::DescriptorFieldNotFound { .. })
    ));
    assert!(api.calls().is_empty());
}
