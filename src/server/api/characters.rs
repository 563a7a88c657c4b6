use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::run_blocking;
use crate::auth::{Actor, RequireUser};
use crate::media::ImageUpload;
use crate::server::AppState;
use crate::server::dto::CharacterRequest;
use crate::server::response::{ApiError, OptionExt};
use crate::service::CharacterService;
use crate::types::Character;

pub async fn list_characters(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let characters = CharacterService::new(state.store.as_ref()).get_all_characters(&auth.actor)?;
    Ok::<_, ApiError>(Json(characters))
}

pub async fn get_character(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let character = CharacterService::new(state.store.as_ref()).get_character(&auth.actor, &id)?;
    Ok::<_, ApiError>(Json(character))
}

pub async fn create_character(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CharacterRequest>,
) -> impl IntoResponse {
    let character = CharacterService::new(state.store.as_ref())
        .create_character(&auth.actor, req.into_character()?)?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(character)))
}

pub async fn update_character(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CharacterRequest>,
) -> impl IntoResponse {
    let character = CharacterService::new(state.store.as_ref()).update_character(
        &auth.actor,
        &id,
        req.into_character()?,
    )?;
    Ok::<_, ApiError>(Json(character))
}

pub async fn delete_character(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    CharacterService::new(state.store.as_ref())
        .delete_character(&auth.actor, &id)?
        .or_not_found("Character not found")?;
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

/// Accepts a multipart form with a `file` field and stores resized
/// derivatives, replacing any previous ones.
pub async fn upload_profile_image(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    CharacterService::new(state.store.as_ref()).get_character(&auth.actor, &id)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
        upload = Some(ImageUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }
    let upload = upload.ok_or_else(|| ApiError::bad_request("Missing 'file' field in multipart form"))?;

    let character = replace_profile_images(&state, &auth.actor, &id, upload).await?;
    Ok::<_, ApiError>(Json(character))
}

pub async fn delete_profile_image(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let service = CharacterService::new(state.store.as_ref());
    service.get_character(&auth.actor, &id)?;

    remove_profile_images(&state, &id).await?;
    let character = service.set_profile_images(&auth.actor, &id, None)?;
    Ok::<_, ApiError>(Json(character))
}

/// Writes the derivatives, then records them on the character. Files from an
/// update that fails are removed again.
async fn replace_profile_images(
    state: &Arc<AppState>,
    actor: &Actor,
    id: &str,
    upload: ImageUpload,
) -> Result<Character, ApiError> {
    let images = state.images.clone();
    let character_id = id.to_string();
    let stored = run_blocking(move || images.store_profile_images(&character_id, &upload)).await?;

    let result =
        CharacterService::new(state.store.as_ref()).set_profile_images(actor, id, Some(stored));
    match result {
        Ok(character) => Ok(character),
        Err(e) => {
            if remove_profile_images(state, id).await.is_err() {
                tracing::warn!("Could not clean up profile images for character {id}");
            }
            Err(e.into())
        }
    }
}

async fn remove_profile_images(state: &Arc<AppState>, id: &str) -> Result<(), ApiError> {
    let images = state.images.clone();
    let character_id = id.to_string();
    run_blocking(move || {
        images.delete_profile_images(&character_id);
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::store::{SqliteStore, Store};
    use crate::types::Role;

    fn png_upload() -> ImageUpload {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, image::Rgb([10, 120, 200])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        ImageUpload {
            filename: Some("face.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes,
        }
    }

    fn state_in(temp: &TempDir) -> Arc<AppState> {
        let mut config = Config::default();
        config.server.data_dir = temp.path().to_path_buf();
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.initialize().unwrap();
        Arc::new(AppState::new(config, store.clone(), store).unwrap())
    }

    fn files_in(state: &AppState) -> usize {
        std::fs::read_dir(state.images.dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_failed_update_removes_written_images() {
        let temp = TempDir::new().unwrap();
        let state = state_in(&temp);
        let actor = Actor::new("u-1", Role::User);

        let result = replace_profile_images(
            &state,
            &actor,
            "00000000-0000-4000-8000-000000000000",
            png_upload(),
        )
        .await;

        let Err(err) = result else {
            panic!("update of a missing character succeeded");
        };
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(files_in(&state), 0);
    }
}
