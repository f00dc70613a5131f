use axum::Json;
use serde_json::{Value, json};

use super::health::SERVICE_NAME;

pub async fn index() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Certificate revocation status service backed by CRLs",
        "endpoints": {
            "health": "/api/v1/health",
            "stats": "/api/v1/stats",
            "check_certificate": "/api/v1/certificates/check/{serial}",
            "valid_certificate": "/api/v1/certificates/valid/{serial}",
            "certificate_details": "/api/v1/certificates/details/{serial}",
            "force_refresh": "/api/v1/admin/refresh",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let Json(body) = index().await;
        assert_eq!(body["service"], SERVICE_NAME);
        assert_eq!(body["endpoints"]["health"], "/api/v1/health");
    }
}
