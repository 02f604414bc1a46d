//! Multipart decoding for the item create and edit forms.

use axum::extract::multipart::{Field, Multipart, MultipartError};

use crate::api::error::ApiError;
use crate::db::{ItemForm, Upload};

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid form data: {}", err.body_text())).with_status(err.status())
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

/// Collect the submitted fields. Unknown fields are ignored; `desc` and
/// `description` are accepted for the description.
pub async fn read_item_form(mut multipart: Multipart) -> Result<ItemForm, ApiError> {
    let mut form = ItemForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = text(field).await?,
            "desc" | "description" => form.description = text(field).await?,
            "contact" => form.contact = text(field).await?,
            "status" => form.status = Some(text(field).await?),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.image = Upload::new(&file_name, bytes);
            }
            _ => {}
        }
    }

    Ok(form)
}
