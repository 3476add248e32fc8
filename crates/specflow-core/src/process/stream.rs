use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::cache::NormalizationCache;
use super::process_item;
use crate::error::ProcessError;
use crate::model::{SpecItem, UnifiedSpec};

/// Yield every endpoint, then every named model, without materializing a
/// second collection. The stream owns the spec, so it can be walked once.
pub fn item_stream(spec: UnifiedSpec) -> impl Stream<Item = SpecItem> {
    stream! {
        for endpoint in spec.endpoints {
            yield SpecItem::Endpoint(endpoint);
        }
        for (name, schema) in spec.schemas {
            yield SpecItem::Model { name, schema };
        }
    }
}

/// Normalize items as they are pulled. Cancellation is checked before each
/// item; once seen, the stream yields `Cancelled` and ends.
pub fn normalized_stream(
    spec: UnifiedSpec,
    cache: Option<NormalizationCache>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<SpecItem, ProcessError>> {
    stream! {
        let items = item_stream(spec);
        futures::pin_mut!(items);
        while let Some(item) = items.next().await {
            if cancel.is_cancelled() {
                yield Err(ProcessError::Cancelled);
                return;
            }
            yield Ok(process_item(item, cache.as_ref()));
        }
    }
}
