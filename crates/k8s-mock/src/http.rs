//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This provides a real HTTP server that can be used with actual kubeconfig-based
//! connections, so tests exercise the same client code paths as a real cluster.

use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

use bon::Builder;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path, path_regex},
	Match, Mock, MockServer, Request, ResponseTemplate,
};

use super::{
	catalog::ResourceCatalog,
	helpers::{apply_patch, split_resource_path, status_body},
};

/// Shared mutable cluster state keyed by `(collection path, name)`.
pub type SharedResources = Arc<RwLock<HashMap<(String, String), serde_json::Value>>>;

const APPLY_PATCH_CONTENT_TYPE: &str = "application/apply-patch+yaml";

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Initial cluster state as raw manifests. API paths are derived from
	/// apiVersion/kind using the [`ResourceCatalog`].
	#[builder(default)]
	resources: Vec<serde_json::Value>,
	/// Object names whose PATCH and POST requests fail with a 500.
	#[builder(default)]
	failing_writes: Vec<String>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	resources: SharedResources,
	catalog: ResourceCatalog,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		let catalog = ResourceCatalog::default();

		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut resources = HashMap::new();
		for manifest in self.resources {
			if let Some(key) = catalog.locate(&manifest) {
				trace!(api_path = %key.0, name = %key.1, "Registered resource");
				resources.insert(key, manifest);
			}
		}
		resources
			.entry(("/api/v1/namespaces".to_string(), "default".to_string()))
			.or_insert_with(|| {
				serde_json::json!({
					"apiVersion": "v1",
					"kind": "Namespace",
					"metadata": { "name": "default" }
				})
			});

		let shared_resources = Arc::new(RwLock::new(resources));

		mount_version(&server).await;
		mount_failures(&server, &self.failing_writes).await;
		mount_resources(&server, &shared_resources).await;

		RunningHttpMockK8sServer {
			server,
			resources: shared_resources,
			catalog,
		}
	}
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}

	/// Current stored state of an object, if it exists.
	pub fn resource(
		&self,
		api_version: &str,
		kind: &str,
		namespace: Option<&str>,
		name: &str,
	) -> Option<serde_json::Value> {
		let entry = self.catalog.lookup(api_version, kind)?;
		let key = (entry.collection_path(namespace), name.to_string());
		self.resources
			.read()
			.expect("resource lock poisoned")
			.get(&key)
			.cloned()
	}

	/// `(method, path)` of every mutating request received so far.
	pub async fn write_requests(&self) -> Vec<(String, String)> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.filter(|req| matches!(req.method.as_str(), "POST" | "PUT" | "PATCH" | "DELETE"))
			.map(|req| (req.method.to_string(), req.url.path().to_string()))
			.collect()
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-08-13T00:00:00Z",
			"goVersion": "go1.22.5",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

/// Matches requests whose JSON body has the given `metadata.name`.
struct BodyNameIs(String);

impl Match for BodyNameIs {
	fn matches(&self, request: &Request) -> bool {
		serde_json::from_slice::<serde_json::Value>(&request.body)
			.ok()
			.and_then(|body| {
				body.pointer("/metadata/name")
					.and_then(|v| v.as_str())
					.map(|name| name == self.0)
			})
			.unwrap_or(false)
	}
}

fn injected_failure(name: &str) -> ResponseTemplate {
	ResponseTemplate::new(500).set_body_json(status_body(
		500,
		"InternalError",
		&format!("injected failure writing {name}"),
	))
}

async fn mount_failures(server: &MockServer, names: &[String]) {
	for name in names {
		let escaped = name.replace('.', r"\.");
		Mock::given(method("PATCH"))
			.and(path_regex(format!(r"^/api(s)?/.*/{escaped}$")))
			.respond_with(injected_failure(name))
			.with_priority(1)
			.mount(server)
			.await;

		Mock::given(method("POST"))
			.and(path_regex(r"^/api(s)?/.*"))
			.and(BodyNameIs(name.clone()))
			.respond_with(injected_failure(name))
			.with_priority(1)
			.mount(server)
			.await;
	}
}

fn not_found(name: &str) -> ResponseTemplate {
	ResponseTemplate::new(404).set_body_json(status_body(
		404,
		"NotFound",
		&format!("\"{name}\" not found"),
	))
}

async fn mount_resources(server: &MockServer, resources: &SharedResources) {
	let patch_resources = Arc::clone(resources);
	let post_resources = Arc::clone(resources);
	let get_resources = Arc::clone(resources);

	// PATCH merges into the stored object. Only server-side apply may create.
	Mock::given(method("PATCH"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let is_dry_run = req.url.query().unwrap_or("").contains("dryRun");
			let is_apply = req
				.headers
				.get("content-type")
				.and_then(|v| v.to_str().ok())
				.is_some_and(|v| v.starts_with(APPLY_PATCH_CONTENT_TYPE));

			let (api_path, name) = split_resource_path(req.url.path());
			let patch: serde_json::Value =
				serde_json::from_slice(&req.body).unwrap_or(serde_json::Value::Null);

			let existing = patch_resources
				.read()
				.expect("resource lock poisoned")
				.get(&(api_path.clone(), name.clone()))
				.cloned();
			let merged = match existing {
				Some(existing) => apply_patch(existing, patch),
				None if is_apply => apply_patch(serde_json::Value::Null, patch),
				None => return not_found(&name),
			};

			if !is_dry_run {
				patch_resources
					.write()
					.expect("resource lock poisoned")
					.insert((api_path, name), merged.clone());
			}

			ResponseTemplate::new(200).set_body_json(merged)
		})
		.mount(server)
		.await;

	// POST creates, refusing to overwrite.
	Mock::given(method("POST"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let is_dry_run = req.url.query().unwrap_or("").contains("dryRun");
			let body: serde_json::Value =
				serde_json::from_slice(&req.body).unwrap_or(serde_json::Value::Null);
			let name = body
				.pointer("/metadata/name")
				.and_then(|v| v.as_str())
				.unwrap_or("")
				.to_string();
			let key = (req.url.path().trim_end_matches('/').to_string(), name.clone());

			let mut resources = post_resources.write().expect("resource lock poisoned");
			if resources.contains_key(&key) {
				return ResponseTemplate::new(409).set_body_json(status_body(
					409,
					"AlreadyExists",
					&format!("\"{name}\" already exists"),
				));
			}
			if !is_dry_run && !name.is_empty() {
				resources.insert(key, body.clone());
			}

			ResponseTemplate::new(201).set_body_json(body)
		})
		.mount(server)
		.await;

	// GET returns a single object, or a list for collection paths.
	Mock::given(method("GET"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let path_str = req.url.path().trim_end_matches('/');
			let resources = get_resources.read().expect("resource lock poisoned");

			let (api_path, name) = split_resource_path(path_str);
			if let Some(resource) = resources.get(&(api_path, name.clone())) {
				return ResponseTemplate::new(200).set_body_json(resource.clone());
			}

			let items: Vec<_> = resources
				.iter()
				.filter(|((res_api_path, _), _)| res_api_path == path_str)
				.map(|(_, v)| v.clone())
				.collect();
			if !items.is_empty() {
				return ResponseTemplate::new(200).set_body_json(serde_json::json!({
					"kind": "List",
					"apiVersion": "v1",
					"metadata": {"resourceVersion": "1"},
					"items": items
				}));
			}

			not_found(&name)
		})
		.mount(server)
		.await;
}
