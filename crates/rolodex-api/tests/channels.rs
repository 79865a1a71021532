mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::app;

#[tokio::test]
async fn channel_crud() {
    let app = app();
    let token = app.user("ada@x.com").await;
    let email = app.channel(&token, "email").await;
    app.channel(&token, "phone").await;

    let (status, list) = app.send(Method::GET, "/channels", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, renamed) = app
        .send(
            Method::PUT,
            &format!("/channels/{}", email),
            Some(&token),
            Some(json!({ "name": "e-mail" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "e-mail");

    let (status, fetched) = app
        .send(Method::GET, &format!("/channels/{}", email), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, renamed);

    let (status, _) = app
        .send(Method::DELETE, &format!("/channels/{}", email), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::GET, &format!("/channels/{}", email), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Channel not found");
}

#[tokio::test]
async fn channel_names_are_unique() {
    let app = app();
    let token = app.user("ada@x.com").await;
    app.channel(&token, "email").await;
    let phone = app.channel(&token, "phone").await;

    let (status, body) = app
        .send(Method::POST, "/channels", Some(&token), Some(json!({ "name": "email" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Channel with the name 'email' already exists");

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/channels/{}", phone),
            Some(&token),
            Some(json!({ "name": "email" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(Method::PUT, "/channels/999", Some(&token), Some(json!({ "name": "fax" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn channel_name_limit_counts_characters() {
    let app = app();
    let token = app.user("ada@x.com").await;

    let (status, _) = app
        .send(Method::POST, "/channels", Some(&token), Some(json!({ "name": "т".repeat(50) })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send(Method::POST, "/channels", Some(&token), Some(json!({ "name": "т".repeat(51) })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn contact_channel_links() {
    let app = app();
    let ada = app.user("ada@x.com").await;
    let alan = app.user("alan@x.com").await;
    let email = app.channel(&ada, "email").await;
    let phone = app.channel(&ada, "phone").await;

    let (_, contact) = app
        .send(
            Method::POST,
            "/contacts",
            Some(&ada),
            Some(json!({ "first_name": "Charles", "last_name": "Babbage" })),
        )
        .await;
    let contact_id = contact["id"].as_i64().unwrap();

    let (status, link) = app
        .send(
            Method::POST,
            "/contactsChannels",
            Some(&ada),
            Some(json!({ "contact_id": contact_id, "channel_id": email, "channel_value": "c@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", link);
    let link_path = format!("/contactsChannels/{}", link["id"]);

    // Duplicate value, whatever the target.
    let (status, body) = app
        .send(
            Method::POST,
            "/contactsChannels",
            Some(&ada),
            Some(json!({ "contact_id": contact_id, "channel_id": phone, "channel_value": "c@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Such channel value already exists in the DB");

    // Someone else's contact looks missing.
    let (status, _) = app
        .send(
            Method::POST,
            "/contactsChannels",
            Some(&alan),
            Some(json!({ "contact_id": contact_id, "channel_id": phone, "channel_value": "new" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = app.send(Method::GET, "/contactsChannels", Some(&ada), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, theirs) = app.send(Method::GET, "/contactsChannels", Some(&alan), None).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let (status, updated) = app
        .send(
            Method::PUT,
            &link_path,
            Some(&ada),
            Some(json!({ "contact_id": contact_id, "channel_id": phone, "channel_value": "+44" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["channel_name"], "phone");

    // The contact shows its links.
    let (_, contact) = app
        .send(Method::GET, &format!("/contacts/{}", contact_id), Some(&ada), None)
        .await;
    assert_eq!(contact["channels"][0]["channel_value"], "+44");

    let (status, _) = app.send(Method::DELETE, &link_path, Some(&alan), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, deleted) = app.send(Method::DELETE, &link_path, Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, updated);

    let (status, _) = app.send(Method::GET, &link_path, Some(&ada), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
