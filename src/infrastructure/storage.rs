use crate::config::ServiceConfig;
use crate::services::storage::S3StorageService;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the S3 client once at startup. Static credentials are used when an
/// explicit endpoint and keys are configured, the AWS default chain otherwise.
pub async fn setup_storage(config: &ServiceConfig) -> Arc<S3StorageService> {
    let s3 = &config.s3;
    let bucket = config.bucket_name.clone();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(s3.region.clone()));

    if let Some(endpoint_url) = &s3.endpoint {
        info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);
        loader = loader.endpoint_url(endpoint_url);
    } else {
        info!("☁️  S3 Storage: AWS default endpoint (Bucket: {})", bucket);
    }

    if let (Some(access_key), Some(secret_key)) = (&s3.access_key, &s3.secret_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(s3.force_path_style)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Sources must already exist, so a missing bucket is reported, not created
    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is reachable", bucket),
        Err(e) => warn!("⚠️  Bucket '{}' is not reachable yet: {}", bucket, e),
    }

    Arc::new(S3StorageService::new(s3_client, bucket))
}
