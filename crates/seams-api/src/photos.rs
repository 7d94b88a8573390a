use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::{Extension, Json, extract::State, response::IntoResponse};
use bytes::{Bytes, BytesMut};
use image::{ImageFormat, Rgb, RgbImage};
use tracing::{error, info, warn};

use seams_db::queries::users;
use seams_types::api::UploadPhotoRequest;

use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

const DEFAULT_IMAGE: &str = "default.jpg";
const DEFAULT_IMAGE_SIZE: u32 = 200;

/// Largest photo download accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Cropped profile images on disk, served under `/imgurl`.
pub struct ImageStore {
    dir: PathBuf,
    public_url: String,
}

/// Pixel bounds of a crop, end-exclusive.
#[derive(Debug, Clone, Copy)]
pub struct CropBox {
    pub x_start: i64,
    pub y_start: i64,
    pub x_end: i64,
    pub y_end: i64,
}

impl CropBox {
    fn check_order(&self) -> Result<(), ApiError> {
        if self.x_start < 0 || self.y_start < 0 {
            return Err(ApiError::input("Crop coordinates cannot be negative"));
        }
        if self.x_end <= self.x_start || self.y_end <= self.y_start {
            return Err(ApiError::input("Crop end must be after crop start"));
        }
        Ok(())
    }
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn default_url(&self) -> String {
        format!("{}/imgurl/{}", self.public_url, DEFAULT_IMAGE)
    }

    pub fn url_for(&self, user_id: i64) -> String {
        format!("{}/imgurl/{}.jpg", self.public_url, user_id)
    }

    /// Create the image directory and a plain placeholder picture if missing.
    pub fn ensure_default(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create image dir {}", self.dir.display()))?;

        let path = self.dir.join(DEFAULT_IMAGE);
        if !path.exists() {
            RgbImage::from_pixel(DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE, Rgb([200, 200, 200]))
                .save_with_format(&path, ImageFormat::Jpeg)
                .context("cannot write default profile image")?;
            info!("Wrote default profile image to {}", path.display());
        }
        Ok(())
    }

    /// Decode a JPEG, cut out `crop` and store it as the user's picture.
    /// Returns the public URL of the stored file.
    pub fn crop_and_store(&self, user_id: i64, data: &[u8], crop: CropBox) -> Result<String, ApiError> {
        crop.check_order()?;
        if image::guess_format(data).ok() != Some(ImageFormat::Jpeg) {
            return Err(ApiError::input("Image must be a JPEG"));
        }
        let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|_| ApiError::input("Image could not be decoded"))?;

        let (width, height) = (i64::from(img.width()), i64::from(img.height()));
        if crop.x_end > width || crop.y_end > height {
            return Err(ApiError::input("Crop lies outside the image"));
        }

        let cropped = img
            .crop_imm(
                crop.x_start as u32,
                crop.y_start as u32,
                (crop.x_end - crop.x_start) as u32,
                (crop.y_end - crop.y_start) as u32,
            )
            .to_rgb8();

        let path = self.dir.join(format!("{user_id}.jpg"));
        cropped
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("cannot write {}", path.display()))?;

        Ok(self.url_for(user_id))
    }
}

async fn fetch_image(http: &reqwest::Client, url: &str) -> Result<Bytes, ApiError> {
    let mut response = http.get(url).send().await.map_err(|e| {
        warn!("Photo fetch from {} failed: {}", url, e);
        ApiError::input("Could not fetch image")
    })?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(ApiError::input(format!(
            "Image URL returned {}",
            response.status()
        )));
    }
    if response.content_length().is_some_and(|len| len > MAX_IMAGE_BYTES as u64) {
        return Err(ApiError::input("Image is too large"));
    }

    let mut data = BytesMut::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|_| ApiError::input("Could not read image"))?
    {
        if data.len() + chunk.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::input("Image is too large"));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

pub async fn uploadphoto(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<UploadPhotoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let crop = CropBox {
        x_start: req.x_start,
        y_start: req.y_start,
        x_end: req.x_end,
        y_end: req.y_end,
    };
    crop.check_order()?;

    let data = fetch_image(&state.http, &req.img_url).await?;

    let store = state.clone();
    let url = tokio::task::spawn_blocking(move || store.images.crop_and_store(session.user_id, &data, crop))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("image task failed"))
        })??;

    run_blocking(&state, move |conn| {
        users::set_profile_img_url(conn, session.user_id, &url)?;
        Ok(())
    })
    .await?;

    info!("User {} uploaded a profile photo", session.user_id);
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::from_pixel(width, height, Rgb([10, 120, 200]))
            .write_to(&mut out, ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    fn crop(x_start: i64, y_start: i64, x_end: i64, y_end: i64) -> CropBox {
        CropBox {
            x_start,
            y_start,
            x_end,
            y_end,
        }
    }

    #[test]
    fn crops_within_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://localhost:3000/");

        let url = store.crop_and_store(7, &jpeg(100, 80), crop(10, 10, 60, 50)).unwrap();
        assert_eq!(url, "http://localhost:3000/imgurl/7.jpg");

        let saved = image::open(dir.path().join("7.jpg")).unwrap();
        assert_eq!((saved.width(), saved.height()), (50, 40));
    }

    #[test]
    fn rejects_bad_crops_and_formats() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://localhost:3000");
        let data = jpeg(100, 80);

        for bad in [crop(0, 0, 101, 80), crop(0, 0, 100, 81), crop(50, 0, 50, 80), crop(-1, 0, 10, 10)] {
            assert!(matches!(store.crop_and_store(1, &data, bad), Err(ApiError::Input(_))));
        }
        assert!(matches!(
            store.crop_and_store(1, b"\x89PNG\r\n\x1a\nnot really", crop(0, 0, 1, 1)),
            Err(ApiError::Input(_))
        ));
        store.crop_and_store(1, &data, crop(0, 0, 100, 80)).unwrap();
    }

    #[test]
    fn default_image_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("images"), "http://localhost:3000");
        store.ensure_default().unwrap();
        store.ensure_default().unwrap();
        assert!(dir.path().join("images").join(DEFAULT_IMAGE).exists());
        assert_eq!(store.default_url(), "http://localhost:3000/imgurl/default.jpg");
    }
}
