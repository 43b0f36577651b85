/*!
 * Tests for the Skeleton-of-Thought completion mode
 */

use sinoprompt::app_config::Config;
use sinoprompt::errors::{GatewayErrorKind, OptimizerError, ProviderError};
use sinoprompt::optimizer::CompletionRequest;
use sinoprompt::providers::mock::MockGateway;
use sinoprompt::providers::RetryPolicy;
use sinoprompt::sot::{SkeletonOfThought, SotSettings};
use std::time::Duration;

use crate::common::{init_test_logging, optimizer_with, scripted_translator, test_config};

fn sot_config(parallel: bool) -> Config {
    Config {
        sot: Some(SotSettings {
            parallel,
            max_concurrency: 2,
        }),
        translate_response: false,
        ..test_config()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(1, 1, Duration::from_secs(5))
}

#[tokio::test]
async fn test_sot_complete_shouldExpandEachPoint() {
    let gateway = MockGateway::replying("展开内容").with_script(vec![Ok("1. 定义\n2. 例子".to_string())]);
    let optimizer = optimizer_with(sot_config(true), &scripted_translator(), &gateway);

    let result = optimizer
        .complete(CompletionRequest::new("You are a tutor.", "Explain recursion."))
        .await
        .unwrap();

    assert_eq!(result.skeleton, Some(vec!["定义".to_string(), "例子".to_string()]));
    assert_eq!(result.response, "展开内容\n\n展开内容");
    assert_eq!(gateway.call_count(), 3);

    let calls = gateway.calls();
    let skeleton_user = calls[0].last_user().unwrap_or_default();
    assert!(skeleton_user.contains("Explain recursion."));
    assert!(calls[0]
        .system()
        .unwrap_or_default()
        .starts_with(result.target_system_prompt.as_str()));
    assert_eq!(calls[1].system(), Some(result.target_system_prompt.as_str()));
}

#[tokio::test]
async fn test_sot_sequential_shouldKeepOutlineOrder() {
    init_test_logging();
    let gateway = MockGateway::echo().with_script(vec![Ok("1. 第一\n2. 第二\n3. 第三".to_string())]);
    let sot = SkeletonOfThought::new(
        &gateway,
        "gpt-4o",
        "key",
        0.2,
        fast_retry(),
        SotSettings {
            parallel: false,
            max_concurrency: 4,
        },
    );

    let output = sot.complete("系统", "问题").await.unwrap();

    assert_eq!(output.skeleton, vec!["第一", "第二", "第三"]);
    assert_eq!(output.expanded_points.len(), 3);
    assert!(output.expanded_points[0].ends_with("第一"));
    assert!(output.expanded_points[2].ends_with("第三"));
}

#[tokio::test]
async fn test_sot_unparseableSkeleton_shouldUseRawTextAsOnePoint() {
    init_test_logging();
    let gateway = MockGateway::replying("展开").with_script(vec![Ok("   ".to_string())]);
    let sot = SkeletonOfThought::new(&gateway, "gpt-4o", "key", 0.2, fast_retry(), SotSettings::default());

    let output = sot.complete("系统", "问题").await.unwrap();

    assert_eq!(output.skeleton.len(), 1);
    assert_eq!(output.response, "展开");
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_sot_failedExpansion_shouldFailCompletion() {
    let gateway = MockGateway::failing(ProviderError::AuthenticationError("revoked".into()))
        .with_script(vec![Ok("1. 定义".to_string())]);
    let optimizer = optimizer_with(sot_config(false), &scripted_translator(), &gateway);

    let error = optimizer
        .complete(CompletionRequest::new("You are a tutor.", "Explain recursion."))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        OptimizerError::Gateway(ref e) if e.kind == GatewayErrorKind::Authentication
    ));
    assert_eq!(gateway.call_count(), 2);
}
