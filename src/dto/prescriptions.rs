use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PrescriptionRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
}
