//! An in-memory stand-in for the management API.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::{Value, json};

use crate::client::{ApiPath, ApiRequest, ApiResponse, Transport, TransportError};

#[derive(Debug)]
enum Failure {
    Status(StatusCode),
    Transport,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ApiPath, Value>,
    vhosts: BTreeSet<String>,
    requests: Vec<ApiRequest>,
    failure: Option<Failure>,
}

/// Stores declared objects by path and serves them back the way the
/// management API does: with name and vhost filled in, passwords dropped,
/// and 404 for anything unknown.
#[derive(Debug)]
pub struct FakeBroker {
    state: Mutex<State>,
}

impl FakeBroker {
    /// A broker with the default vhost `/`.
    pub fn new() -> Self {
        let state = State {
            vhosts: BTreeSet::from(["/".to_owned()]),
            ..State::default()
        };

        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_vhost(self, vhost: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.vhosts.insert(vhost.to_owned());
            state
                .objects
                .insert(ApiPath::vhost(vhost), json!({"name": vhost, "tracing": false}));
        }
        self
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// The stored representation of an object.
    pub fn object(&self, path: &ApiPath) -> Option<Value> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    /// Stores an object as if it had been declared by someone else.
    pub fn insert(&self, path: ApiPath, value: Value) {
        self.state.lock().unwrap().objects.insert(path, value);
    }

    /// Deletes an object behind the back of the reconciler.
    pub fn remove(&self, path: &ApiPath) {
        self.state.lock().unwrap().objects.remove(path);
    }

    /// Answers the next request with `status`, without touching any object.
    pub fn fail_next_with(&self, status: StatusCode) {
        self.state.lock().unwrap().failure = Some(Failure::Status(status));
    }

    /// Fails the next request before it reaches the API.
    pub fn fail_next_with_transport_error(&self) {
        self.state.lock().unwrap().failure = Some(Failure::Transport);
    }
}

#[async_trait]
impl Transport for FakeBroker {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        match state.failure.take() {
            Some(Failure::Status(status)) => return Ok(ApiResponse::new(status)),
            Some(Failure::Transport) => return Err(TransportError::new("connection refused")),
            None => {}
        }

        Ok(state.handle(request))
    }
}

impl State {
    fn handle(&mut self, request: ApiRequest) -> ApiResponse {
        let ApiRequest { method, path, body } = request;
        let segments = path.segments().to_vec();
        let collection = segments[0].as_str();

        if let Some(vhost) = vhost_of(&segments) {
            if !self.vhosts.contains(vhost) {
                return ApiResponse::new(StatusCode::NOT_FOUND);
            }
        }

        match (method, collection, segments.len()) {
            (Method::POST, "bindings", 6) => self.create_binding(&path, body),
            (Method::PUT, "topic-permissions", _) => self.put_topic_permission(path, body),
            (Method::PUT, _, _) => self.put(path, body),
            (Method::GET, _, _) => match self.objects.get(&path) {
                Some(object) => ApiResponse::new(StatusCode::OK).with_body(object.clone()),
                None => ApiResponse::new(StatusCode::NOT_FOUND),
            },
            (Method::DELETE, "vhosts", _) => self.delete_vhost(&path, &segments[1]),
            (Method::DELETE, _, _) => match self.objects.remove(&path) {
                Some(_) => ApiResponse::new(StatusCode::NO_CONTENT),
                None => ApiResponse::new(StatusCode::NOT_FOUND),
            },
            _ => ApiResponse::new(StatusCode::METHOD_NOT_ALLOWED),
        }
    }

    fn put(&mut self, path: ApiPath, body: Option<Value>) -> ApiResponse {
        let segments = path.segments();
        let mut object = body.unwrap_or_else(|| json!({}));

        if let Some(fields) = object.as_object_mut() {
            match segments[0].as_str() {
                "exchanges" | "queues" | "policies" | "operator-policies" => {
                    fields.insert("vhost".to_owned(), json!(segments[1]));
                    fields.insert("name".to_owned(), json!(segments[2]));
                }
                "permissions" => {
                    fields.insert("vhost".to_owned(), json!(segments[1]));
                    fields.insert("user".to_owned(), json!(segments[2]));
                }
                "vhosts" => {
                    fields.insert("name".to_owned(), json!(segments[1]));
                    self.vhosts.insert(segments[1].clone());
                }
                "users" => {
                    fields.insert("name".to_owned(), json!(segments[1]));
                    fields.remove("password");
                    // Recent brokers return tags as a list
                    let tags: Vec<&str> = fields
                        .get("tags")
                        .and_then(Value::as_str)
                        .map(|tags| tags.split(',').filter(|tag| !tag.is_empty()).collect())
                        .unwrap_or_default();
                    let tags = json!(tags);
                    fields.insert("tags".to_owned(), tags);
                }
                _ => {}
            }
        }

        match self.objects.insert(path, object) {
            Some(_) => ApiResponse::new(StatusCode::NO_CONTENT),
            None => ApiResponse::new(StatusCode::CREATED),
        }
    }

    fn put_topic_permission(&mut self, path: ApiPath, body: Option<Value>) -> ApiResponse {
        let segments = path.segments();
        let mut permission = body.unwrap_or_else(|| json!({}));
        if let Some(fields) = permission.as_object_mut() {
            fields.insert("vhost".to_owned(), json!(segments[1]));
            fields.insert("user".to_owned(), json!(segments[2]));
        }

        let entry = self.objects.entry(path).or_insert_with(|| json!([]));
        if let Some(permissions) = entry.as_array_mut() {
            permissions.retain(|existing| existing["exchange"] != permission["exchange"]);
            permissions.push(permission);
        }

        ApiResponse::new(StatusCode::CREATED)
    }

    fn create_binding(&mut self, path: &ApiPath, body: Option<Value>) -> ApiResponse {
        let segments = path.segments();
        let body = body.unwrap_or_else(|| json!({}));
        let routing_key = body["routing_key"].as_str().unwrap_or_default().to_owned();
        let arguments = body.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let properties_key = match (routing_key.as_str(), arguments.as_object()) {
            ("", Some(arguments)) if arguments.is_empty() => "~".to_owned(),
            (key, Some(arguments)) if arguments.is_empty() => key.to_owned(),
            (key, _) => format!("{key}~{}", arguments.to_string().len()),
        };

        let destination_type = if segments[4] == "q" { "queue" } else { "exchange" };
        let binding = json!({
            "source": segments[3],
            "vhost": segments[1],
            "destination": segments[5],
            "destination_type": destination_type,
            "routing_key": routing_key,
            "arguments": arguments,
            "properties_key": properties_key,
        });

        let location = path
            .join(properties_key.as_str())
            .segments()
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        self.objects.insert(path.join(properties_key), binding);

        ApiResponse::new(StatusCode::CREATED).with_location(location)
    }

    fn delete_vhost(&mut self, path: &ApiPath, vhost: &str) -> ApiResponse {
        if !self.vhosts.remove(vhost) {
            return ApiResponse::new(StatusCode::NOT_FOUND);
        }

        self.objects.remove(path);
        self.objects
            .retain(|path, _| vhost_of(path.segments()) != Some(vhost));

        ApiResponse::new(StatusCode::NO_CONTENT)
    }
}

fn vhost_of(segments: &[String]) -> Option<&str> {
    let index = match segments.first()?.as_str() {
        "exchanges" | "queues" | "policies" | "operator-policies" | "permissions"
        | "topic-permissions" | "bindings" => 1,
        "parameters" => 2,
        _ => return None,
    };

    segments.get(index).map(String::as_str)
}
