use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::{body::Bytes, extract::Multipart};
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const IMAGE_TYPES: [&str; 4] = ["jpeg", "jpg", "png", "gif"];

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Text fields of a multipart form plus the single file part, if one was sent.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> AppResult<&str> {
        self.text(name)
            .ok_or_else(|| AppError::bad_request(format!("{name} is required")))
    }

    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> AppResult<T> {
        self.required(name)?
            .parse::<T>()
            .map_err(|_| AppError::bad_request(format!("{name} is invalid")))
    }
}

/// Drain a multipart body. Only the part named `file_field` is kept as a file; an
/// empty file part (no file chosen in the form) is treated as absent.
pub async fn read_form(multipart: &mut Multipart, file_field: &str) -> AppResult<FormData> {
    let mut form = FormData::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            if !bytes.is_empty() {
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Returns the normalized extension when the file is an accepted image.
pub fn validate_image(file: &UploadedFile, max_bytes: usize) -> AppResult<String> {
    if file.bytes.len() > max_bytes {
        return Err(AppError::bad_request(format!(
            "File too large: limit is {max_bytes} bytes"
        )));
    }

    let extension = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let mime_ok = file
        .content_type
        .as_deref()
        .and_then(|ct| ct.strip_prefix("image/"))
        .is_some_and(|sub| IMAGE_TYPES.contains(&sub));

    if !IMAGE_TYPES.contains(&extension.as_str()) || !mime_ok {
        return Err(AppError::bad_request(
            "Only images (jpeg, jpg, png, gif) are allowed",
        ));
    }
    Ok(extension)
}

pub fn unique_file_name(extension: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "image-{}-{}.{}",
        Utc::now().timestamp_millis(),
        &suffix[..12],
        extension
    )
}

/// Validate and write an image into `dir`; returns the stored file name.
pub async fn store_image(dir: &Path, file: &UploadedFile, max_bytes: usize) -> AppResult<String> {
    let extension = validate_image(file, max_bytes)?;
    let name = unique_file_name(&extension);
    let path: PathBuf = dir.join(&name);
    tokio::fs::write(&path, &file.bytes).await?;
    tracing::debug!(file = %name, bytes = file.bytes.len(), "stored upload");
    Ok(name)
}

/// Remove a previously stored file. Missing files are ignored.
pub async fn discard(dir: &Path, name: &str) {
    if let Err(err) = tokio::fs::remove_file(dir.join(name)).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %err, file = %name, "failed to remove upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: Option<&str>, len: usize) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn accepts_common_image_types() {
        for (name, ct) in [
            ("receipt.PNG", "image/png"),
            ("scan.jpg", "image/jpeg"),
            ("scan.jpeg", "image/jpeg"),
            ("anim.gif", "image/gif"),
        ] {
            assert!(validate_image(&file(name, Some(ct), 10), 100).is_ok(), "{name}");
        }
        assert_eq!(
            validate_image(&file("receipt.PNG", Some("image/png"), 10), 100).unwrap(),
            "png"
        );
    }

    #[test]
    fn rejects_non_images_and_mismatched_types() {
        assert!(validate_image(&file("notes.pdf", Some("application/pdf"), 10), 100).is_err());
        assert!(validate_image(&file("fake.png", Some("text/plain"), 10), 100).is_err());
        assert!(validate_image(&file("noext", Some("image/png"), 10), 100).is_err());
        assert!(validate_image(&file("scan.png", None, 10), 100).is_err());
    }

    #[test]
    fn rejects_files_over_the_limit() {
        let err = validate_image(&file("big.png", Some("image/png"), 101), 100).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn generated_names_are_unique_and_keep_extension() {
        let a = unique_file_name("png");
        let b = unique_file_name("png");
        assert_ne!(a, b);
        assert!(a.starts_with("image-"));
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn blank_form_fields_count_as_missing() {
        let mut form = FormData::default();
        form.fields.insert("address".into(), "   ".into());
        form.fields.insert("total_price".into(), "30".into());
        assert!(form.required("address").is_err());
        assert_eq!(form.parse::<i64>("total_price").unwrap(), 30);
        assert!(form.parse::<i64>("missing").is_err());
    }

    #[tokio::test]
    async fn stores_and_discards_files() {
        let dir = std::env::temp_dir().join(format!("storefront-upload-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let name = store_image(&dir, &file("r.png", Some("image/png"), 16), 100)
            .await
            .unwrap();
        assert!(dir.join(&name).exists());

        discard(&dir, &name).await;
        assert!(!dir.join(&name).exists());
        discard(&dir, &name).await;

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
