use axum::{
	body::Body,
	http::{header, Method, Request, StatusCode},
	Router,
};
use book_catalog::{app, config::Config, sql, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> Router {
	let pool = sql::open_memory().await.unwrap();
	let config = Config{
		database_url: "sqlite::memory:".to_string(),
		bind_addr: "127.0.0.1:0".to_string(),
		token_secret: "integration-secret".to_string(),
		bcrypt_cost: 4,
	};
	app(AppState::new(pool, &config))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
	let mut req = Request::builder().method(method).uri(uri);
	if let Some(token) = token {
		req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
	}
	let req = match body {
		Some(body) => req
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(body.to_string())),
		None => req.body(Body::empty()),
	}.unwrap();

	let res = app.clone().oneshot(req).await.unwrap();
	let status = res.status();
	let bytes = res.into_body().collect().await.unwrap().to_bytes();
	let value = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).unwrap()
	};
	(status, value)
}

async fn register(app: &Router, username: &str) -> String {
	let (status, body) = send(app, Method::POST, "/auth/register", None,
		Some(json!({ "username": username, "password": "hunter22" }))).await;
	assert_eq!(status, StatusCode::OK, "{body}");
	assert_eq!(body["username"], username);
	body["token"].as_str().unwrap().to_string()
}

fn book(title: &str, year: i32) -> Value {
	json!({ "title": title, "publicationYear": year, "authorName": "Frank Herbert" })
}

#[tokio::test]
async fn register_then_login() {
	let app = test_app().await;
	register(&app, "alice").await;

	let (status, body) = send(&app, Method::POST, "/auth/login", None,
		Some(json!({ "username": "ALICE", "password": "hunter22" }))).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["username"], "alice");
	assert!(body["token"].as_str().is_some());

	let (status, _) = send(&app, Method::POST, "/auth/register", None,
		Some(json!({ "username": "Alice", "password": "hunter22" }))).await;
	assert_eq!(status, StatusCode::CONFLICT);

	let (status, body) = send(&app, Method::POST, "/auth/register", None,
		Some(json!({ "username": "bob", "password": "123" }))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error"], "Password must be at least 6 characters long");
}

#[tokio::test]
async fn bad_logins_look_the_same() {
	let app = test_app().await;
	register(&app, "alice").await;

	let wrong_pass = send(&app, Method::POST, "/auth/login", None,
		Some(json!({ "username": "alice", "password": "wrong-one" }))).await;
	let no_user = send(&app, Method::POST, "/auth/login", None,
		Some(json!({ "username": "nobody", "password": "hunter22" }))).await;

	assert_eq!(wrong_pass.0, StatusCode::UNAUTHORIZED);
	assert_eq!(wrong_pass, no_user);
	assert_eq!(no_user.1["error"], "Invalid username or password");
}

#[tokio::test]
async fn book_routes_require_a_valid_token() {
	let app = test_app().await;

	let (status, _) = send(&app, Method::GET, "/book", None, None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (status, _) = send(&app, Method::GET, "/book", Some("not.a.token"), None).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (status, _) = send(&app, Method::POST, "/book", None, Some(book("Dune", 1965))).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let token = register(&app, "alice").await;
	let (status, body) = send(&app, Method::GET, "/book", Some(&token), None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!([]));
}

#[tokio::test]
async fn book_lifecycle() {
	let app = test_app().await;
	let token = register(&app, "alice").await;
	let token = Some(token.as_str());

	let (status, created) = send(&app, Method::POST, "/book", token, Some(book("Dune", 1965))).await;
	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(created["viewsCount"], 0);
	let id = created["id"].as_i64().unwrap();

	let (status, _) = send(&app, Method::POST, "/book", token, Some(book("dune", 1965))).await;
	assert_eq!(status, StatusCode::CONFLICT);

	let (status, view) = send(&app, Method::GET, &format!("/book/{id}"), token, None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(view["viewsCount"], 1);
	assert_eq!(view["authorName"], "Frank Herbert");
	assert!(view["popularityScore"].as_f64().is_some());

	let (status, _) = send(&app, Method::PUT, &format!("/book/{id}"), token, Some(book("Dune Messiah", 1969))).await;
	assert_eq!(status, StatusCode::NO_CONTENT);

	let (_, list) = send(&app, Method::GET, "/book?page=1&pageSize=10", token, None).await;
	assert_eq!(list, json!([{ "id": id, "title": "Dune Messiah", "viewsCount": 1 }]));

	let (status, _) = send(&app, Method::DELETE, &format!("/book/{id}"), token, None).await;
	assert_eq!(status, StatusCode::NO_CONTENT);
	let (status, _) = send(&app, Method::DELETE, &format!("/book/{id}"), token, None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	let (status, _) = send(&app, Method::GET, &format!("/book/{id}"), token, None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
	let (status, _) = send(&app, Method::PUT, &format!("/book/{id}"), token, Some(book("X", 2000))).await;
	assert_eq!(status, StatusCode::NOT_FOUND);

	let (_, list) = send(&app, Method::GET, "/book", token, None).await;
	assert_eq!(list, json!([]));
}

#[tokio::test]
async fn create_sets_location_header() {
	let app = test_app().await;
	let token = register(&app, "alice").await;

	let req = Request::builder()
		.method(Method::POST)
		.uri("/book")
		.header(header::AUTHORIZATION, format!("Bearer {token}"))
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(book("Dune", 1965).to_string()))
		.unwrap();
	let res = app.oneshot(req).await.unwrap();
	assert_eq!(res.status(), StatusCode::CREATED);
	assert_eq!(res.headers()[header::LOCATION], "/book/1");
}

#[tokio::test]
async fn bulk_create_and_delete() {
	let app = test_app().await;
	let token = register(&app, "alice").await;
	let token = Some(token.as_str());

	send(&app, Method::POST, "/book", token, Some(book("Dune", 1965))).await;

	let (status, _) = send(&app, Method::POST, "/book/bulk", token,
		Some(json!([book("Emma", 1815), book("DUNE", 1965)]))).await;
	assert_eq!(status, StatusCode::CONFLICT);
	let (_, list) = send(&app, Method::GET, "/book", token, None).await;
	assert_eq!(list.as_array().unwrap().len(), 1);

	let (status, created) = send(&app, Method::POST, "/book/bulk", token,
		Some(json!([book("Emma", 1815), book("Ulysses", 1922)]))).await;
	assert_eq!(status, StatusCode::OK);
	let ids: Vec<i64> = created.as_array().unwrap().iter()
		.map(|b| b["id"].as_i64().unwrap())
		.collect();
	assert_eq!(ids.len(), 2);

	let (status, _) = send(&app, Method::DELETE, "/book/bulk", token,
		Some(json!([ids[0], ids[1], 4040]))).await;
	assert_eq!(status, StatusCode::NO_CONTENT);

	let (_, list) = send(&app, Method::GET, "/book", token, None).await;
	let titles: Vec<&str> = list.as_array().unwrap().iter()
		.map(|b| b["title"].as_str().unwrap())
		.collect();
	assert_eq!(titles, ["Dune"]);
}

#[tokio::test]
async fn list_is_ordered_by_views_and_paged() {
	let app = test_app().await;
	let token = register(&app, "alice").await;
	let token = Some(token.as_str());

	let mut ids = Vec::new();
	for n in 0..3 {
		let (_, created) = send(&app, Method::POST, "/book", token, Some(book(&format!("Book {n}"), 2000))).await;
		ids.push(created["id"].as_i64().unwrap());
	}
	// Book 2 gets two views, Book 1 one view
	for id in [ids[2], ids[2], ids[1]] {
		send(&app, Method::GET, &format!("/book/{id}"), token, None).await;
	}

	let (_, page) = send(&app, Method::GET, "/book?page=1&pageSize=2", token, None).await;
	assert_eq!(page, json!([
		{ "id": ids[2], "title": "Book 2", "viewsCount": 2 },
		{ "id": ids[1], "title": "Book 1", "viewsCount": 1 },
	]));
	let (_, page) = send(&app, Method::GET, "/book?page=2&pageSize=2", token, None).await;
	assert_eq!(page, json!([{ "id": ids[0], "title": "Book 0", "viewsCount": 0 }]));
}

#[tokio::test]
async fn malformed_input_is_a_json_400() {
	let app = test_app().await;
	let token = register(&app, "alice").await;
	let token = Some(token.as_str());

	let (status, body) = send(&app, Method::POST, "/book", token,
		Some(json!({ "title": "Dune", "authorName": "Frank Herbert" }))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].as_str().unwrap().contains("publicationYear"), "{body}");

	let (status, body) = send(&app, Method::POST, "/book/bulk", token,
		Some(json!([{ "title": "Dune", "publicationYear": "soon", "authorName": "F" }]))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].is_string());

	let (status, body) = send(&app, Method::GET, "/book?page=abc", token, None).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].is_string());

	let (status, body) = send(&app, Method::GET, "/book/abc", token, None).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].is_string());

	let (status, body) = send(&app, Method::DELETE, "/book/bulk", token, Some(json!({ "ids": [1] }))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].is_string());
}

#[tokio::test]
async fn bearer_scheme_ignores_case() {
	let app = test_app().await;
	let token = register(&app, "alice").await;

	let req = Request::builder()
		.method(Method::GET)
		.uri("/book")
		.header(header::AUTHORIZATION, format!("bearer {token}"))
		.body(Body::empty())
		.unwrap();
	let res = app.oneshot(req).await.unwrap();
	assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_ascii_titles_conflict_over_http() {
	let app = test_app().await;
	let token = register(&app, "alice").await;
	let token = Some(token.as_str());

	let (status, _) = send(&app, Method::POST, "/book", token, Some(book("Война и мир", 1869))).await;
	assert_eq!(status, StatusCode::CREATED);
	let (status, _) = send(&app, Method::POST, "/book", token, Some(book("ВОЙНА И МИР", 1869))).await;
	assert_eq!(status, StatusCode::CONFLICT);

	let (status, _) = send(&app, Method::POST, "/auth/register", None,
		Some(json!({ "username": "ÖDÖN", "password": "hunter22" }))).await;
	assert_eq!(status, StatusCode::OK);
	let (status, _) = send(&app, Method::POST, "/auth/register", None,
		Some(json!({ "username": "ödön", "password": "hunter22" }))).await;
	assert_eq!(status, StatusCode::CONFLICT);
}
