//! Streaming batch API: emit results as each asset finishes.
//!
//! Unlike [`crate::Enhancer::enhance_batch`], which returns only after every
//! asset is done, [`enhance_stream`] yields [`BatchItem`]s through a `Stream`
//! in completion order. Use `BatchItem::index` to restore input order.

use crate::asset::ImageAsset;
use crate::config::EnhanceOptions;
use crate::enhance::Enhancer;
use crate::output::BatchItem;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-asset results.
pub type EnhanceStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Enhance `assets` with up to `config.concurrency` calls in flight,
/// yielding each result as soon as it is ready.
///
/// # Example
/// ```rust,no_run
/// use superres_client::{enhance_stream, EnhanceConfig, EnhanceOptions, Enhancer, ImageAsset};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let enhancer = Enhancer::from_config(EnhanceConfig::builder().api_key("k").build()?)?;
/// let assets = vec![
///     ImageAsset::new("a.png", std::fs::read("a.png")?),
///     ImageAsset::new("b.jpg", std::fs::read("b.jpg")?),
/// ];
/// let mut results = enhance_stream(&enhancer, assets, EnhanceOptions::default());
/// while let Some(item) = results.next().await {
///     match item.result {
///         Ok(out) => println!("{}: {}", item.name, out.image_url),
///         Err(e) => eprintln!("{}: {e}", item.name),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn enhance_stream(
    enhancer: &Enhancer,
    assets: Vec<ImageAsset>,
    options: EnhanceOptions,
) -> EnhanceStream {
    let concurrency = enhancer.config().in_flight_limit();
    info!(
        "Streaming {} asset(s), concurrency {}",
        assets.len(),
        concurrency
    );

    let enhancer = enhancer.clone();
    let s = stream::iter(assets.into_iter().enumerate().map(move |(index, asset)| {
        let enhancer = enhancer.clone();
        let options = options.clone();
        async move {
            let result = enhancer.enhance(&asset, &options).await;
            BatchItem {
                index,
                name: asset.name().to_string(),
                result,
            }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnhanceConfig;
    use crate::service::EnhanceService;
    use crate::task::TaskStatus;
    use crate::testing::ScriptedService;
    use std::sync::Arc;

    #[tokio::test]
    async fn yields_every_asset_once() {
        let svc: Arc<dyn EnhanceService> = Arc::new(
            ScriptedService::new()
                .submit_ok("t")
                .status_ok(TaskStatus::done("https://x/y.png", 8, 8)),
        );
        let config = EnhanceConfig::builder()
            .poll_interval_ms(1)
            .concurrency(3)
            .build()
            .unwrap();
        let enhancer = Enhancer::new(svc, config);
        let assets = (0..5)
            .map(|i| ImageAsset::new(format!("{i}.png"), vec![1u8; 4]))
            .collect();

        let mut items: Vec<BatchItem> = enhance_stream(&enhancer, assets, EnhanceOptions::default())
            .collect()
            .await;
        items.sort_by_key(|i| i.index);
        assert_eq!(items.len(), 5);
        assert!(items.iter().all(BatchItem::is_ok));
        assert_eq!(items[4].name, "4.png");
    }

    #[tokio::test]
    async fn zero_concurrency_still_drains_the_stream() {
        let svc: Arc<dyn EnhanceService> = Arc::new(
            ScriptedService::new()
                .submit_ok("t")
                .status_ok(TaskStatus::done("https://x/y.png", 8, 8)),
        );
        let config = EnhanceConfig {
            concurrency: 0,
            poll_interval_ms: 1,
            ..Default::default()
        };
        let enhancer = Enhancer::new(svc, config);
        let assets = vec![ImageAsset::new("0.png", vec![1u8; 4])];

        let items: Vec<BatchItem> = tokio::time::timeout(
            std::time::Duration::from_secs(3),
            enhance_stream(&enhancer, assets, EnhanceOptions::default()).collect(),
        )
        .await
        .expect("stream must not stall on concurrency 0");
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_stream() {
        let svc: Arc<dyn EnhanceService> = Arc::new(ScriptedService::new());
        let enhancer = Enhancer::new(svc, EnhanceConfig::default());
        let items: Vec<BatchItem> = enhance_stream(&enhancer, Vec::new(), EnhanceOptions::default())
            .collect()
            .await;
        assert!(items.is_empty());
    }
}
