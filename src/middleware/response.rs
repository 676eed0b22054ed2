use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::database::models::{Drink, ShortDrink};

/// Success envelope: `{"success": true, <key>: <data>}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub key: &'static str,
    pub data: T,
}

impl ApiResponse<Vec<ShortDrink>> {
    pub fn short_drinks(drinks: &[Drink]) -> Self {
        Self {
            key: "drinks",
            data: drinks.iter().map(Drink::short).collect(),
        }
    }
}

impl ApiResponse<Vec<Drink>> {
    pub fn long_drinks(drinks: Vec<Drink>) -> Self {
        Self { key: "drinks", data: drinks }
    }
}

impl ApiResponse<i32> {
    pub fn deleted(id: i32) -> Self {
        Self { key: "delete", data: id }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "internal_server_error",
                        "message": "Internal Server Error. Please try again later."
                    })),
                )
                    .into_response();
            }
        };

        let mut envelope = json!({ "success": true });
        envelope[self.key] = data_value;

        (StatusCode::OK, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
