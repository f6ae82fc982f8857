//! End-to-end clone runs against the HTTP mock server.

use assert_matches::assert_matches;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s::WorkloadRef;
use k8s_mock::{HttpMockK8sServer, RunningHttpMockK8sServer};
use kclone::{
	clone::{
		CloneError, CloneOptions, CloneRequest, FailureKind, Orchestrator, RekeyOutcome,
		SecretOverrides, Stage,
	},
	cluster::{api::KubeCluster, apply::ApplyStrategy, client::ClusterConnection},
	prompt::ScriptedPrompt,
};
use serde_json::{json, Value};

fn namespace(name: &str) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "Namespace",
		"metadata": { "name": name }
	})
}

fn deployment(name: &str, secrets: &[&str]) -> Value {
	let env: Vec<_> = secrets
		.iter()
		.map(|secret| {
			json!({
				"name": format!("{}_PASSWORD", secret.to_uppercase()),
				"valueFrom": { "secretKeyRef": { "name": secret, "key": "password" } }
			})
		})
		.collect();
	json!({
		"apiVersion": "apps/v1",
		"kind": "Deployment",
		"metadata": {
			"name": name,
			"namespace": "ns1",
			"uid": "4b1d",
			"resourceVersion": "1024",
			"generation": 7,
			"labels": { "app": name }
		},
		"spec": {
			"replicas": 3,
			"selector": { "matchLabels": { "app": name } },
			"template": {
				"metadata": { "labels": { "app": name } },
				"spec": {
					"containers": [{
						"name": "app",
						"image": "registry.local:5000/app:1.0",
						"env": env
					}]
				}
			}
		},
		"status": { "availableReplicas": 3 }
	})
}

fn secret(name: &str) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "Secret",
		"type": "Opaque",
		"metadata": { "name": name, "namespace": "ns1", "uid": "77aa" },
		"data": { "password": STANDARD.encode(format!("{name}-password")) }
	})
}

fn decoded(secret: &Value, key: &str) -> String {
	let encoded = secret["data"][key].as_str().unwrap();
	String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap()
}

struct Harness {
	server: RunningHttpMockK8sServer,
	cluster: KubeCluster,
	scratch: tempfile::TempDir,
	options: CloneOptions,
}

impl Harness {
	async fn start(resources: Vec<Value>, failing_writes: Vec<String>) -> Self {
		let server = HttpMockK8sServer::builder()
			.resources(resources)
			.failing_writes(failing_writes)
			.build()
			.start()
			.await;
		let connection = ClusterConnection::from_kubeconfig(server.kubeconfig(), None)
			.await
			.expect("connection should succeed");
		let cluster = KubeCluster::new(connection, ApplyStrategy::Client, "kclone");
		let scratch = tempfile::tempdir().unwrap();
		let options = CloneOptions {
			scratch_dir: Some(scratch.path().to_path_buf()),
			..CloneOptions::default()
		};
		Self {
			server,
			cluster,
			scratch,
			options,
		}
	}

	fn deployment(&self, name: &str) -> Option<Value> {
		self.server
			.resource("apps/v1", "Deployment", Some("ns1"), name)
	}

	fn secret(&self, name: &str) -> Option<Value> {
		self.server.resource("v1", "Secret", Some("ns1"), name)
	}

	fn scratch_is_empty(&self) -> bool {
		std::fs::read_dir(self.scratch.path()).unwrap().count() == 0
	}
}

fn request(overrides: &str) -> CloneRequest {
	CloneRequest::new(WorkloadRef::new("ns1", "app").unwrap())
		.with_overrides(SecretOverrides::parse([overrides], ";").unwrap())
}

#[tokio::test]
async fn test_clone_single_replica_copy() {
	let harness = Harness::start(vec![namespace("ns1"), deployment("app", &[])], vec![]).await;
	let mut prompt = ScriptedPrompt::default();

	let mut orchestrator = Orchestrator::new(&harness.cluster, &harness.options);
	let request = CloneRequest::new(WorkloadRef::new("ns1", "app").unwrap())
		.with_image_tag(Some("debug".to_string()));
	let report = orchestrator.run(&request, &mut prompt).await.unwrap();

	assert_eq!(orchestrator.stage(), Stage::Done);
	assert_eq!(report.target.name(), "app-test-debug");
	assert!(prompt.asked().is_empty());

	let copy = harness.deployment("app-test-debug").unwrap();
	assert_eq!(copy["spec"]["replicas"], 1);
	assert_eq!(copy["spec"]["selector"]["matchLabels"]["app"], "app-test-debug");
	assert_eq!(
		copy["spec"]["template"]["metadata"]["labels"]["app"],
		"app-test-debug"
	);
	assert_eq!(
		copy["spec"]["template"]["spec"]["containers"][0]["image"],
		"registry.local:5000/app:debug"
	);
	assert!(copy.get("status").is_none());
	assert!(copy["metadata"].get("uid").is_none());
	assert!(copy["metadata"].get("resourceVersion").is_none());

	let source = harness.deployment("app").unwrap();
	assert_eq!(source["spec"]["replicas"], 3);
	assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_clone_asks_for_another_name_on_collision() {
	let harness = Harness::start(
		vec![
			namespace("ns1"),
			deployment("app", &[]),
			deployment("app-test-debug", &[]),
		],
		vec![],
	)
	.await;
	let mut prompt = ScriptedPrompt::new(["jane"]);

	let report = Orchestrator::new(&harness.cluster, &harness.options)
		.run(&request(""), &mut prompt)
		.await
		.unwrap();

	assert_eq!(report.target.name(), "app-test-debug-jane");
	assert_eq!(prompt.asked().len(), 1);
	assert!(harness.deployment("app-test-debug-jane").is_some());
}

#[tokio::test]
async fn test_clone_refuses_second_collision() {
	let harness = Harness::start(
		vec![
			namespace("ns1"),
			deployment("app", &[]),
			deployment("app-test-debug", &[]),
			deployment("app-test-debug-jane", &[]),
		],
		vec![],
	)
	.await;
	let mut prompt = ScriptedPrompt::new(["jane"]);

	let mut orchestrator = Orchestrator::new(&harness.cluster, &harness.options);
	let result = orchestrator.run(&request(""), &mut prompt).await;

	assert_matches!(&result, Err(err) if err.kind() == FailureKind::NameCollision);
	assert_eq!(
		orchestrator.stage(),
		Stage::Failed(FailureKind::NameCollision)
	);
	assert!(harness.server.write_requests().await.is_empty());
}

#[tokio::test]
async fn test_clone_missing_namespace_writes_nothing() {
	let harness = Harness::start(vec![deployment("app", &[])], vec![]).await;

	let result = Orchestrator::new(&harness.cluster, &harness.options)
		.run(&request(""), &mut ScriptedPrompt::default())
		.await;

	assert_matches!(result, Err(CloneError::NamespaceNotFound(ns)) if ns == "ns1");
	assert!(harness.server.write_requests().await.is_empty());
}

#[tokio::test]
async fn test_clone_rekeys_secrets() {
	let harness = Harness::start(
		vec![
			namespace("ns1"),
			deployment("app", &["db", "cache"]),
			secret("db"),
			secret("cache"),
		],
		vec![],
	)
	.await;

	let report = Orchestrator::new(&harness.cluster, &harness.options)
		.run(&request("password=debug;EXTRA=1"), &mut ScriptedPrompt::default())
		.await
		.unwrap();

	assert_eq!(report.rekey, RekeyOutcome::Rekeyed);
	assert_eq!(report.secrets.len(), 2);

	for old in ["cache", "db"] {
		let copy = harness.secret(&format!("{old}-app-test-debug")).unwrap();
		assert_eq!(decoded(&copy, "password"), "debug");
		assert_eq!(decoded(&copy, "EXTRA"), "1");
		assert!(copy["metadata"].get("uid").is_none());

		let original = harness.secret(old).unwrap();
		assert_eq!(decoded(&original, "password"), format!("{old}-password"));
	}

	let copy = harness.deployment("app-test-debug").unwrap();
	let refs: Vec<_> = copy["spec"]["template"]["spec"]["containers"][0]["env"]
		.as_array()
		.unwrap()
		.iter()
		.map(|env| env["valueFrom"]["secretKeyRef"]["name"].as_str().unwrap())
		.collect();
	assert_eq!(refs, vec!["db-app-test-debug", "cache-app-test-debug"]);
	assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_clone_rekey_failure_leaves_deployment_unapplied() {
	let harness = Harness::start(
		vec![
			namespace("ns1"),
			deployment("app", &["a", "b", "c"]),
			secret("a"),
			secret("b"),
			secret("c"),
		],
		vec!["b-app-test-debug".to_string()],
	)
	.await;

	let mut orchestrator = Orchestrator::new(&harness.cluster, &harness.options);
	let result = orchestrator
		.run(&request("password=debug"), &mut ScriptedPrompt::default())
		.await;

	assert_matches!(&result, Err(err) if err.kind() == FailureKind::Rekey);
	assert_eq!(orchestrator.stage(), Stage::Failed(FailureKind::Rekey));
	assert!(harness.secret("a-app-test-debug").is_some());
	assert!(harness.secret("b-app-test-debug").is_none());
	assert!(harness.secret("c-app-test-debug").is_none());
	assert!(harness.deployment("app-test-debug").is_none());
	assert!(harness.scratch_is_empty());
}
