mod common;

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use common::TestServer;
use tavern::config::AdminSeed;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 80, 40])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn image_form(filename: &str, mime: &str, bytes: Vec<u8>) -> Form {
    let part = Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime)
        .unwrap();
    Form::new().part("file", part)
}

#[tokio::test]
async fn character_crud() {
    let server = TestServer::start().await;
    let token = server.signup("alice").await;

    let created = server.create_character(&token, "Ada").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "Ada");
    assert_eq!(created["resourceStatus"], "ACTIVE");
    assert_eq!(created["customFields"]["mood"], "cheerful");

    let response = server.get(&token, &format!("/api/characters/{id}")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Value = response.json().await.unwrap();
    assert_eq!(fetched["systemPrompt"], "You are Ada.");

    let response = server
        .put(
            &token,
            &format!("/api/characters/{id}"),
            json!({ "name": "Ada Lovelace", "systemPrompt": "You are a mathematician." }),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["id"], id);
    assert_eq!(updated["name"], "Ada Lovelace");
    assert_eq!(updated["ownerId"], created["ownerId"]);

    let response = server.get(&token, "/api/characters").send().await.unwrap();
    let list: Vec<Value> = response.json().await.unwrap();
    assert_eq!(list.len(), 1);

    let response = server.delete(&token, &format!("/api/characters/{id}")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server.get(&token, "/api/characters").send().await.unwrap();
    let list: Vec<Value> = response.json().await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn create_requires_a_name() {
    let server = TestServer::start().await;
    let token = server.signup("alice").await;

    let response = server
        .post(&token, "/api/characters", json!({ "description": "nameless" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_users_cannot_touch_a_character() {
    let server = TestServer::start().await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    let ada = server.create_character(&alice, "Ada").await;
    let path = format!("/api/characters/{}", ada["id"].as_str().unwrap());

    let response = server.get(&bob, &path).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Access denied");

    let response = server.put(&bob, &path, json!({ "name": "Mine" })).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server.delete(&bob, &path).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server.get(&bob, "/api/characters").send().await.unwrap();
    let list: Vec<Value> = response.json().await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn admin_sees_everyone() {
    let server = TestServer::start_with(|config| {
        config.seed.admin = Some(AdminSeed {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: "rootpass".to_string(),
        });
    })
    .await;
    let alice = server.signup("alice").await;
    let bob = server.signup("bob").await;
    server.create_character(&alice, "Ada").await;
    let bea = server.create_character(&bob, "Bea").await;
    let admin = server.token_for("root", "rootpass").await;

    let response = server.get(&admin, "/api/characters").send().await.unwrap();
    let list: Vec<Value> = response.json().await.unwrap();
    assert_eq!(list.len(), 2);

    let response = server
        .get(&admin, &format!("/api/characters/{}", bea["id"].as_str().unwrap()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_character_is_not_found() {
    let server = TestServer::start().await;
    let token = server.signup("alice").await;
    let missing = "00000000-0000-4000-8000-000000000000";

    let response = server.get(&token, &format!("/api/characters/{missing}")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Character not found");

    let response = server
        .delete(&token, &format!("/api/characters/{missing}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_cascades_to_chats() {
    let server = TestServer::start().await;
    let token = server.signup("alice").await;
    let ada = server.create_character(&token, "Ada").await;
    let character_id = ada["id"].as_str().unwrap();

    let response = server
        .post(
            &token,
            "/api/chat/new",
            json!({
                "characterId": character_id,
                "messageList": [{ "role": "ASSISTANT", "content": "Greetings!" }],
            }),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let chat: Value = response.json().await.unwrap();
    let chat_path = format!("/api/chat/{}", chat["id"].as_str().unwrap());

    let response = server
        .delete(&token, &format!("/api/characters/{character_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .get(&token, &format!("/api/chat?characterId={character_id}"))
        .send()
        .await
        .unwrap();
    let chats: Vec<Value> = response.json().await.unwrap();
    assert!(chats.is_empty());

    let response = server.get(&token, &chat_path).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let chat: Value = response.json().await.unwrap();
    assert_eq!(chat["resourceStatus"], "DELETED");
    assert_eq!(chat["messageList"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn profile_image_upload_and_removal() {
    let server = TestServer::start().await;
    let token = server.signup("alice").await;
    let ada = server.create_character(&token, "Ada").await;
    let id = ada["id"].as_str().unwrap().to_string();
    let path = format!("/api/characters/{id}/profile-image");

    let response = server
        .client
        .post(server.url(&path))
        .bearer_auth(&token)
        .multipart(image_form("avatar.png", "image/png", png_bytes(800, 600)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let character: Value = response.json().await.unwrap();
    let small = character["profileImageSmall"].as_str().unwrap().to_string();
    let large = character["profileImageLarge"].as_str().unwrap().to_string();
    assert_eq!(small, format!("/uploads/characters/{id}-small.png"));

    let response = server.client.get(server.url(&large)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.bytes().await.unwrap();
    let served = image::load_from_memory(&bytes).unwrap();
    assert_eq!(served.width(), 512);
    assert_eq!(served.height(), 384);

    let response = server
        .put(&token, &format!("/api/characters/{id}"), json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["profileImageSmall"], small.as_str());

    let response = server.delete(&token, &path).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let character: Value = response.json().await.unwrap();
    assert!(character.get("profileImageSmall").is_none());

    let response = server.client.get(server.url(&small)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_image_validation() {
    let server = TestServer::start().await;
    let token = server.signup("alice").await;
    let ada = server.create_character(&token, "Ada").await;
    let path = format!("/api/characters/{}/profile-image", ada["id"].as_str().unwrap());

    let cases = [
        (image_form("avatar.gif", "image/gif", png_bytes(10, 10)), "Invalid file type"),
        (image_form("avatar.png", "text/plain", png_bytes(10, 10)), "File must be an image"),
        (image_form("avatar.png", "image/png", b"not an image".to_vec()), "readable image"),
        (image_form("avatar.png", "image/png", Vec::new()), "File is empty"),
    ];

    for (form, expected) in cases {
        let response = server
            .client
            .post(server.url(&path))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert!(
            body["error"].as_str().unwrap().contains(expected),
            "expected '{expected}' in {body}"
        );
    }

    let bob = server.signup("bob").await;
    let response = server
        .client
        .post(server.url(&path))
        .bearer_auth(&bob)
        .multipart(image_form("avatar.png", "image/png", png_bytes(10, 10)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
