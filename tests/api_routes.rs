use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use recipe_ai_server::api::{create_api, AppState, USER_ID_HEADER};
use recipe_ai_server::config::GenerationSettings;
use recipe_ai_server::database::Database;
use recipe_ai_server::food::generation::RecipeAssembler;
use recipe_ai_server::providers::scripted::ScriptedProvider;
use recipe_ai_server::providers::{CompletionClient, CompletionRequest, TransportError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

const CLEAN_REPLY: &str = r#"{"name": "Egg Crepes", "ingredients": ["2 eggs", "1 cup flour", "1 cup milk"],
    "instructions": "Whisk, rest, cook thin.", "estimatedCalories": 320, "estimatedTime": 20, "servings": 4}"#;

const NO_CALORIES_REPLY: &str = "Here you go:\n{\"name\": \"Egg Crepes\", \"ingredients\": [\"2 eggs\", \"1 cup flour\"], \"instructions\": \"Whisk and cook.\"}\nEnjoy!";

async fn app_with(client: Arc<ScriptedProvider>) -> (Router, Database) {
    let db = Database::open_in_memory().await.unwrap();
    let assembler = RecipeAssembler::new(client, GenerationSettings::default());
    let state = AppState::new(assembler, db.clone(), None, Duration::from_secs(5));
    (create_api(state, 8), db)
}

fn generate_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/recipes/generate-ai")
        .header("content-type", "application/json")
        .header(USER_ID_HEADER, "user-7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header(USER_ID_HEADER, user)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(USER_ID_HEADER, user)
        .body(Body::empty())
        .unwrap()
}

/// Holds every completion until released.
#[derive(Default)]
struct GatedProvider {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl CompletionClient for GatedProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, TransportError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(CLEAN_REPLY.to_string())
    }

    fn model_name(&self) -> &str {
        "gated"
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn generate_with_model_calories_persists_recipe() {
    let client = Arc::new(ScriptedProvider::new().reply(CLEAN_REPLY));
    let (app, db) = app_with(client.clone()).await;

    let response = app
        .oneshot(generate_request(json!({ "ingredients": ["egg", "flour", "milk"] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["estimatedCalories"], 320.0);
    assert_eq!(body["data"]["ai_generated"], true);
    assert_eq!(body["data"]["createdBy"], "user-7");
    assert_eq!(body["data"]["diets"], json!([]));
    assert_eq!(client.call_count(), 1);

    let id = body["data"]["_id"].as_str().unwrap();
    assert!(db.get_recipe(id).await.unwrap().is_some());
}

#[tokio::test]
async fn generate_without_calories_asks_estimator_once() {
    let client = Arc::new(
        ScriptedProvider::new()
            .reply(NO_CALORIES_REPLY)
            .reply("Approximately 540 kcal"),
    );
    let (app, _db) = app_with(client.clone()).await;

    let response = app
        .oneshot(generate_request(json!({
            "ingredients": ["egg", "flour", "milk"],
            "preferences": "vegetarian"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["data"]["estimatedCalories"], 540.0);
    assert_eq!(body["data"]["estimatedTime"], "30 mins");
    assert_eq!(body["data"]["servings"], 4);
    assert_eq!(body["data"]["diets"], json!(["vegetarian"]));
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn empty_ingredients_rejected_before_model_call() {
    let client = Arc::new(ScriptedProvider::new().reply(CLEAN_REPLY));
    let (app, _db) = app_with(client.clone()).await;

    let response = app
        .clone()
        .oneshot(generate_request(json!({ "ingredients": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);

    let response = app
        .oneshot(generate_request(json!({ "ingredients": ["egg", "   "] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn transport_failure_maps_to_bad_gateway_without_leaking() {
    let client = Arc::new(
        ScriptedProvider::new().fail(TransportError::Auth("Incorrect API key provided: sk-secret".to_string())),
    );
    let (app, db) = app_with(client).await;

    let response = app
        .oneshot(generate_request(json!({ "ingredients": ["egg"] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());
    assert!(!body["message"].as_str().unwrap().contains("sk-secret"));

    let page = db.list_recipes(&Default::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn unusable_model_reply_is_bad_request() {
    let client = Arc::new(ScriptedProvider::new().reply("I cannot make a recipe from that."));
    let (app, _db) = app_with(client).await;

    let response = app
        .oneshot(generate_request(json!({ "ingredients": ["gravel"] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Failed to generate recipe: no JSON object found");
}

#[tokio::test]
async fn list_get_and_delete_recipes() {
    let client = Arc::new(ScriptedProvider::new().reply(CLEAN_REPLY));
    let (app, _db) = app_with(client).await;

    let created = json_body(
        app.clone()
            .oneshot(generate_request(json!({ "ingredients": ["egg"] })))
            .await
            .unwrap(),
    )
    .await;
    let id = created["data"]["_id"].as_str().unwrap().to_string();

    let listing = app.clone().oneshot(get("/api/recipes?search=crepe")).await.unwrap();
    assert_eq!(listing.status(), StatusCode::OK);
    let listing = json_body(listing).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["data"][0]["_id"], id.as_str());

    let fetched = app.clone().oneshot(get(&format!("/api/recipes/{}", id))).await.unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json_body(fetched).await["data"]["name"], "Egg Crepes");

    let delete = delete_as(&format!("/api/recipes/{}", id), "user-7");
    assert_eq!(app.clone().oneshot(delete).await.unwrap().status(), StatusCode::OK);

    let missing = app.oneshot(get(&format!("/api/recipes/{}", id))).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ingredient_search_unconfigured() {
    let (app, _db) = app_with(Arc::new(ScriptedProvider::new())).await;

    let response = app
        .oneshot(get("/api/ingredients/search?ingredients=egg,flour"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_reports_model() {
    let (app, _db) = app_with(Arc::new(ScriptedProvider::new())).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["model"], "scripted");
}

#[tokio::test]
async fn malformed_bodies_get_envelope_and_bad_request() {
    let client = Arc::new(ScriptedProvider::new().reply(CLEAN_REPLY));
    let (app, _db) = app_with(client.clone()).await;

    let bare_string = app
        .clone()
        .oneshot(generate_request(json!({ "ingredients": "egg" })))
        .await
        .unwrap();
    assert_eq!(bare_string.status(), StatusCode::BAD_REQUEST);
    let body = json_body(bare_string).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    let not_json = Request::builder()
        .method("POST")
        .uri("/api/recipes/generate-ai")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let not_json = app.clone().oneshot(not_json).await.unwrap();
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(not_json).await["success"], false);

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/api/recipes/generate-ai")
        .body(Body::from(json!({ "ingredients": ["egg"] }).to_string()))
        .unwrap();
    let no_content_type = app.oneshot(no_content_type).await.unwrap();
    assert_eq!(no_content_type.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(no_content_type).await["success"], false);

    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn concurrency_limit_is_shared_across_routes() {
    let client = Arc::new(GatedProvider::default());
    let db = Database::open_in_memory().await.unwrap();
    let assembler = RecipeAssembler::new(client.clone(), GenerationSettings::default());
    let state = AppState::new(assembler, db, None, Duration::from_secs(5));
    let app = create_api(state, 1);

    let in_flight = tokio::spawn(
        app.clone()
            .oneshot(generate_request(json!({ "ingredients": ["egg"] }))),
    );
    client.entered.notified().await;

    let listing = tokio::time::timeout(
        Duration::from_millis(200),
        app.clone().oneshot(get("/api/recipes")),
    )
    .await;
    assert!(listing.is_err(), "listing ran while the only permit was held");

    client.release.notify_one();
    let generated = in_flight.await.unwrap().unwrap();
    assert_eq!(generated.status(), StatusCode::CREATED);

    let listing = app.oneshot(get("/api/recipes")).await.unwrap();
    assert_eq!(listing.status(), StatusCode::OK);
}

#[tokio::test]
async fn user_authored_recipe_is_not_ai_generated() {
    let client = Arc::new(ScriptedProvider::new());
    let (app, _db) = app_with(client.clone()).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/recipes",
            "user-3",
            json!({
                "name": "Grandma's Stew",
                "ingredients": ["beef", "carrots"],
                "instructions": "Simmer for hours.",
                "servings": 6
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["data"]["ai_generated"], false);
    assert_eq!(body["data"]["createdBy"], "user-3");
    assert_eq!(body["data"]["servings"], 6);
    assert_eq!(body["data"]["estimatedTime"], "30 mins");
    assert_eq!(client.call_count(), 0);

    let missing_field = app
        .oneshot(json_request(
            "POST",
            "/api/recipes",
            "user-3",
            json!({ "name": "Stew", "ingredients": ["beef"] }),
        ))
        .await
        .unwrap();
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(missing_field).await["success"], false);
}

#[tokio::test]
async fn only_the_creator_updates_or_deletes() {
    let (app, db) = app_with(Arc::new(ScriptedProvider::new())).await;

    let created = json_body(
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/recipes",
                "owner",
                json!({ "name": "Toast", "ingredients": ["bread"], "instructions": "Toast it." }),
            ))
            .await
            .unwrap(),
    )
    .await;
    let uri = format!("/api/recipes/{}", created["data"]["_id"].as_str().unwrap());

    let foreign_update = app
        .clone()
        .oneshot(json_request("PUT", &uri, "intruder", json!({ "name": "Burnt Toast" })))
        .await
        .unwrap();
    assert_eq!(foreign_update.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(foreign_update).await["message"],
        "Not authorized to update this recipe"
    );

    let foreign_delete = app.clone().oneshot(delete_as(&uri, "intruder")).await.unwrap();
    assert_eq!(foreign_delete.status(), StatusCode::FORBIDDEN);

    let anonymous_delete = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.clone().oneshot(anonymous_delete).await.unwrap().status(),
        StatusCode::FORBIDDEN
    );

    let update = app
        .clone()
        .oneshot(json_request("PUT", &uri, "owner", json!({ "name": "Cinnamon Toast", "servings": 2 })))
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::OK);
    let updated = json_body(update).await;
    assert_eq!(updated["data"]["name"], "Cinnamon Toast");
    assert_eq!(updated["data"]["servings"], 2);
    assert_eq!(updated["data"]["instructions"], "Toast it.");
    assert_eq!(updated["data"]["ai_generated"], false);

    let id = created["data"]["_id"].as_str().unwrap();
    assert_eq!(db.get_recipe(id).await.unwrap().unwrap().recipe.name, "Cinnamon Toast");

    let delete = app.clone().oneshot(delete_as(&uri, "owner")).await.unwrap();
    assert_eq!(delete.status(), StatusCode::OK);

    let gone = app
        .oneshot(json_request("PUT", &uri, "owner", json!({ "name": "Toast" })))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
