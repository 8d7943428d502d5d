use utoipa::openapi::{Info, OpenApi};

pub const API_VERSION_TAG: &str = "v1";

/// Stamps the merged router document with the service title and version.
pub fn with_service_info(mut api: OpenApi, title: &str, version: &str) -> OpenApi {
    api.info = Info::new(title, version);
    api
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn test_with_service_info() {
            let api = with_service_info(OpenApi::default(), "community-bot", "0.1.0");
            assert_eq!(api.info.title, "community-bot");
            assert_eq!(api.info.version, "0.1.0");
        }
    }
}
