//! Membership application form: raw input, parsing and the validated shape
//! handed to the backend.

pub mod validation;

use super::backend::{NewProfile, PaymentMethod};
use axum::extract::{Multipart, multipart::MultipartError};
use serde::Deserialize;

pub use validation::{ValidationError, validate};

/// The form exactly as submitted; every field is free text until validated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MembershipForm {
    pub title: String,
    pub first_name_latin: String,
    pub last_name_latin: String,
    pub first_name_ar: String,
    pub last_name_ar: String,
    pub date_of_birth: String,
    pub marital_status: String,
    pub children_count: String,
    pub spouse_first_name: String,
    pub spouse_last_name: String,
    pub children_names: Vec<String>,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub phone_country: String,
    pub phone_number: String,
    pub password: String,
    pub payment_method: String,
}

const RECEIPT_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/heic",
    "image/heif",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Receipt {
    /// PDF or a raster image; SVG can carry scripts and is refused.
    pub fn is_pdf_or_image(&self) -> bool {
        RECEIPT_TYPES.contains(&self.content_type.trim().to_ascii_lowercase().as_str())
    }

    /// File extension derived from the declared content type.
    pub fn extension(&self) -> String {
        match self.content_type.as_str() {
            "application/pdf" => "pdf".to_string(),
            "image/jpeg" => "jpg".to_string(),
            other => other
                .rsplit('/')
                .next()
                .map(|subtype| {
                    subtype
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric())
                        .collect::<String>()
                })
                .filter(|ext| !ext.is_empty())
                .unwrap_or_else(|| "bin".to_string()),
        }
    }
}

/// An application that passed every rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub profile: NewProfile,
    pub password: Option<String>,
    pub payment_method: PaymentMethod,
    pub receipt: Option<Receipt>,
}

impl MembershipForm {
    /// Reads the multipart body; `receipt` is the only file field.
    pub async fn from_multipart(
        mut multipart: Multipart,
    ) -> Result<(Self, Option<Receipt>), MultipartError> {
        let mut form = Self::default();
        let mut receipt = None;

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "receipt" {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    receipt = Some(Receipt {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await?;
            form.set(&name, value);
        }

        Ok((form, receipt))
    }

    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "first_name_latin" => &mut self.first_name_latin,
            "last_name_latin" => &mut self.last_name_latin,
            "first_name_ar" => &mut self.first_name_ar,
            "last_name_ar" => &mut self.last_name_ar,
            "date_of_birth" => &mut self.date_of_birth,
            "marital_status" => &mut self.marital_status,
            "children_count" => &mut self.children_count,
            "spouse_first_name" => &mut self.spouse_first_name,
            "spouse_last_name" => &mut self.spouse_last_name,
            "street" => &mut self.street,
            "postal_code" => &mut self.postal_code,
            "city" => &mut self.city,
            "country" => &mut self.country,
            "email" => &mut self.email,
            "phone_country" => &mut self.phone_country,
            "phone_number" => &mut self.phone_number,
            "password" => &mut self.password,
            "payment_method" => &mut self.payment_method,
            "children_names" | "children_names[]" => {
                self.children_names.push(value);
                return;
            }
            _ => return,
        };
        *slot = value;
    }
}
