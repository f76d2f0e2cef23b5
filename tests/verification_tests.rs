mod common;

use common::{
    pipeline, registry, source, MockBackend, MockBackendFactory, MockConnector, MockNetwork,
    MockToolchain, ReceiptMode,
};
use contract_deploy::config::{ConfigError, Secret, SecretRef, SecretSource};
use contract_deploy::retry::{BackoffStrategy, RetryPolicy};
use contract_deploy::types::VerificationStatus;
use contract_deploy::verify::{
    BackendError, StatusOutcome, SubmitOutcome, VerificationDispatcher, VerificationRequest,
    VerificationTarget,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff: BackoffStrategy::Fixed,
    }
}

fn request(contract: &str) -> VerificationRequest {
    VerificationRequest {
        network_id: "sepolia".to_string(),
        contract_name: contract.to_string(),
        fully_qualified_name: format!("contracts/{contract}.sol:{contract}"),
        address: "0x00000000000000000000000000000000c0de0001".to_string(),
        compiler_version: "v0.8.16+commit.07a7930e".to_string(),
        standard_input: Arc::new(serde_json::json!({ "language": "Solidity" })),
        constructor_args: None,
    }
}

async fn dispatch_one(backend: Arc<MockBackend>, max_attempts: u32) -> contract_deploy::types::VerificationResult {
    let mut results = VerificationDispatcher::new(policy(max_attempts), 2)
        .dispatch(vec![VerificationTarget {
            network_id: "sepolia".to_string(),
            backend_id: "https://api-sepolia.etherscan.io/api".to_string(),
            backend,
            requests: vec![request("Token")],
        }])
        .await;
    assert_eq!(results.len(), 1);
    results.remove(0)
}

#[tokio::test]
async fn test_already_verified_is_success_every_time() {
    let backend = Arc::new(MockBackend::default());

    let first = dispatch_one(backend.clone(), 3).await;
    let second = dispatch_one(backend.clone(), 3).await;

    for result in [first, second] {
        assert_eq!(result.status, VerificationStatus::Verified);
        assert_eq!(result.message, None);
        assert_eq!(result.attempts, 1);
    }
    assert_eq!(backend.submit_calls(), 2);
    assert_eq!(backend.status_calls(), 0);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let backend = Arc::new(MockBackend::scripted(
        vec![
            Err(BackendError::Transient("Max rate limit reached".to_string())),
            Err(BackendError::Transient("503 Service Unavailable".to_string())),
            Ok(SubmitOutcome::Accepted {
                guid: "guid-1".to_string(),
            }),
        ],
        vec![Ok(StatusOutcome::Pending), Ok(StatusOutcome::Verified)],
    ));

    let result = dispatch_one(backend.clone(), 3).await;

    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(result.attempts, 5);
    assert_eq!(backend.submit_calls(), 3);
    assert_eq!(backend.status_calls(), 2);
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let backend = Arc::new(MockBackend::scripted(
        vec![Err(BackendError::Permanent("Invalid API Key".to_string()))],
        vec![],
    ));

    let result = dispatch_one(backend.clone(), 5).await;

    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(result.message.unwrap().contains("Invalid API Key"));
    assert_eq!(backend.submit_calls(), 1);
}

#[tokio::test]
async fn test_retries_stop_at_the_attempt_budget() {
    let transient = || Err(BackendError::Transient("timeout".to_string()));
    let backend = Arc::new(MockBackend::scripted(
        vec![transient(), transient(), transient(), transient(), transient()],
        vec![],
    ));

    let result = dispatch_one(backend.clone(), 3).await;

    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(result.message.unwrap().contains("gave up after 3 attempts"));
    assert_eq!(backend.submit_calls(), 3);
}

#[tokio::test]
async fn test_backend_rejection_after_polling() {
    let backend = Arc::new(MockBackend::scripted(
        vec![Ok(SubmitOutcome::Accepted {
            guid: "guid-2".to_string(),
        })],
        vec![Ok(StatusOutcome::Failed(
            "Fail - Unable to verify".to_string(),
        ))],
    ));

    let result = dispatch_one(backend, 3).await;

    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(result.message.unwrap().contains("Unable to verify"));
}

#[tokio::test]
async fn test_polling_exhaustion_leaves_result_pending() {
    let backend = Arc::new(MockBackend::scripted(
        vec![Ok(SubmitOutcome::Accepted {
            guid: "guid-3".to_string(),
        })],
        vec![Ok(StatusOutcome::Pending); 6],
    ));

    let result = dispatch_one(backend.clone(), 3).await;

    assert_eq!(result.status, VerificationStatus::Pending);
    assert!(result.message.is_some());
    assert_eq!(backend.status_calls(), 3);
}

fn target(network_id: &str, backend_id: &str, backend: Arc<MockBackend>) -> VerificationTarget {
    VerificationTarget {
        network_id: network_id.to_string(),
        backend_id: backend_id.to_string(),
        backend,
        requests: vec![request("A"), request("B")],
    }
}

#[tokio::test]
async fn test_networks_sharing_an_explorer_share_its_cap() {
    let explorer = "https://api.etherscan.io/v2/api";
    let backend = Arc::new(MockBackend {
        delay: Duration::from_millis(20),
        ..MockBackend::default()
    });

    let results = VerificationDispatcher::new(policy(3), 1)
        .dispatch(vec![
            target("mainnet", explorer, backend.clone()),
            target("base", explorer, backend.clone()),
        ])
        .await;

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.status == VerificationStatus::Verified));
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_distinct_explorers_run_side_by_side() {
    let backend = Arc::new(MockBackend {
        delay: Duration::from_millis(50),
        ..MockBackend::default()
    });

    let results = VerificationDispatcher::new(policy(3), 1)
        .dispatch(vec![
            target("mainnet", "https://api.etherscan.io/api", backend.clone()),
            target("polygon", "https://api.polygonscan.com/api", backend.clone()),
        ])
        .await;

    assert_eq!(results.len(), 4);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 2);
}

const VERIFIED_NETWORKS: &str = r#"
compilers:
  - id: main
    version: 0.8.16
named_accounts:
  deployer: 0
networks:
  - id: sepolia
    url: https://rpc.sepolia.example.org
    verify:
      api_url: https://api-sepolia.etherscan.io/api
      api_key:
        env: CONTRACT_DEPLOY_TEST_ETHERSCAN_KEY
  - id: hardhat
    live: false
    save_deployments: false
    verify:
      api_url: https://example.org/api
deployments:
  - contract: A
  - contract: B
settings:
  confirmation:
    max_attempts: 3
    initial_delay: 0
    max_delay: 0
  verification:
    max_attempts: 3
    initial_delay: 0
    max_delay: 0
"#;

#[tokio::test]
async fn test_deploy_verifies_live_networks_only() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(VERIFIED_NETWORKS);
    let backend = Arc::new(MockBackend::default());
    let connector = Arc::new(
        MockConnector::default()
            .with("sepolia", Arc::new(MockNetwork::new(ReceiptMode::Confirm)))
            .with("hardhat", Arc::new(MockNetwork::new(ReceiptMode::Confirm))),
    );
    let run = || {
        pipeline(
            &registry,
            vec![
                source("contracts/A.sol", "contract A {}"),
                source("contracts/B.sol", "contract B {}"),
            ],
            Arc::new(MockToolchain::default()),
            connector.clone(),
            dir.path(),
        )
        .with_verifiers(Arc::new(MockBackendFactory {
            backend: backend.clone(),
        }))
    };

    let networks = ["sepolia".to_string(), "hardhat".to_string()];
    let summary = run().deploy(&networks, true).await.unwrap();

    let verified: Vec<(&str, &str, VerificationStatus)> = summary
        .verifications
        .iter()
        .map(|v| (v.network_id.as_str(), v.contract_name.as_str(), v.status))
        .collect();
    assert_eq!(
        verified,
        vec![
            ("sepolia", "A", VerificationStatus::Verified),
            ("sepolia", "B", VerificationStatus::Verified),
        ]
    );

    // Unchanged contracts are submitted again and reported as verified.
    let records_before = std::fs::read(dir.path().join("sepolia.json")).unwrap();
    let summary = run().deploy(&networks[..1], true).await.unwrap();
    assert_eq!(summary.transactions(), 0);
    assert_eq!(summary.verifications.len(), 2);
    assert!(summary
        .verifications
        .iter()
        .all(|v| v.status == VerificationStatus::Verified && v.message.is_none()));
    assert_eq!(
        std::fs::read(dir.path().join("sepolia.json")).unwrap(),
        records_before
    );
    assert_eq!(backend.submit_calls(), 4);
}

#[tokio::test]
async fn test_no_verify_skips_backends() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(VERIFIED_NETWORKS);
    let backend = Arc::new(MockBackend::default());

    let summary = pipeline(
        &registry,
        vec![source("contracts/A.sol", "contract A {}"), source("contracts/B.sol", "contract B {}")],
        Arc::new(MockToolchain::default()),
        Arc::new(
            MockConnector::default().with("sepolia", Arc::new(MockNetwork::new(ReceiptMode::Confirm))),
        ),
        dir.path(),
    )
    .with_verifiers(Arc::new(MockBackendFactory {
        backend: backend.clone(),
    }))
    .deploy(&["sepolia".to_string()], false)
    .await
    .unwrap();

    assert!(summary.verifications.is_empty());
    assert_eq!(backend.submit_calls(), 0);
}

struct NoSecrets;

impl SecretSource for NoSecrets {
    fn resolve(&self, reference: &SecretRef) -> contract_deploy::config::Result<Secret> {
        let name = match reference {
            SecretRef::Env { env } => env.clone(),
            SecretRef::Literal(_) => "literal".to_string(),
        };
        Err(ConfigError::MissingSecret { name })
    }
}

#[tokio::test]
async fn test_missing_credentials_fail_verification_not_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(VERIFIED_NETWORKS);

    let summary = pipeline(
        &registry,
        vec![source("contracts/A.sol", "contract A {}"), source("contracts/B.sol", "contract B {}")],
        Arc::new(MockToolchain::default()),
        Arc::new(
            MockConnector::default().with("sepolia", Arc::new(MockNetwork::new(ReceiptMode::Confirm))),
        ),
        dir.path(),
    )
    .with_secrets(Arc::new(NoSecrets))
    .deploy(&["sepolia".to_string()], true)
    .await
    .unwrap();

    assert_eq!(summary.transactions(), 2);
    assert_eq!(summary.verifications.len(), 2);
    for result in &summary.verifications {
        assert_eq!(result.status, VerificationStatus::Failed);
        assert_eq!(result.attempts, 0);
        let message = result.message.as_deref().unwrap();
        assert!(message.contains("CONTRACT_DEPLOY_TEST_ETHERSCAN_KEY"));
    }
}

const TWO_COMPILERS: &str = r#"
compilers:
  - id: v1
    version: "0.7.6"
  - id: v2
    version: "0.8.16"
overrides:
  - pattern: "contracts/legacy/**"
    profile: v1
named_accounts:
  deployer: 0
networks:
  - id: sepolia
    url: https://rpc.sepolia.example.org
    verify:
      api_url: https://api-sepolia.etherscan.io/api
deployments:
  - contract: A
settings:
  confirmation:
    max_attempts: 3
    initial_delay: 0
    max_delay: 0
"#;

#[tokio::test]
async fn test_verification_input_includes_imports_from_other_batches() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(TWO_COMPILERS);
    let backend = Arc::new(MockBackend::default());

    let summary = pipeline(
        &registry,
        vec![
            source("contracts/A.sol", "import \"contracts/legacy/B.sol\";\ncontract A {}")
                .with_imports(vec!["contracts/legacy/B.sol".to_string()]),
            source("contracts/legacy/B.sol", "contract B {}"),
        ],
        Arc::new(MockToolchain::default()),
        Arc::new(
            MockConnector::default().with("sepolia", Arc::new(MockNetwork::new(ReceiptMode::Confirm))),
        ),
        dir.path(),
    )
    .with_verifiers(Arc::new(MockBackendFactory {
        backend: backend.clone(),
    }))
    .deploy(&["sepolia".to_string()], true)
    .await
    .unwrap();

    assert_eq!(summary.verifications.len(), 1);
    assert_eq!(summary.verifications[0].status, VerificationStatus::Verified);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let input = &requests[0].standard_input;
    let sources: Vec<&String> = input["sources"].as_object().unwrap().keys().collect();
    assert_eq!(sources, vec!["contracts/A.sol", "contracts/legacy/B.sol"]);
    let selected: Vec<&String> = input["settings"]["outputSelection"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(selected, vec!["contracts/A.sol"]);
}
