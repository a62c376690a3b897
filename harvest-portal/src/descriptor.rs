//! Assembly of the acquisition pipeline from configuration.

use std::collections::HashSet;

use harvest_core::PortalDescriptor;
use harvest_fetch::{AcquisitionPipeline, AcquisitionStrategy};
use tracing::debug;

use crate::error::PortalError;
use crate::strategies::{
    AuthenticatedReplayStrategy, DirectRequestStrategy, DownloadWatchStrategy,
    ResourceCaptureStrategy,
};

/// Strategy ids in the order they run unless configured otherwise.
pub const DEFAULT_STRATEGY_ORDER: [&str; 4] = [
    DownloadWatchStrategy::ID,
    ResourceCaptureStrategy::ID,
    AuthenticatedReplayStrategy::ID,
    DirectRequestStrategy::ID,
];

/// Every known strategy id.
pub fn strategy_ids() -> Vec<&'static str> {
    DEFAULT_STRATEGY_ORDER.to_vec()
}

/// Builds a pipeline running `order` against `portal`.
///
/// Strategies run in the order given. An empty order, an unknown id, or an
/// id listed twice is rejected.
pub fn build_pipeline(
    portal: &PortalDescriptor,
    order: &[String],
) -> Result<AcquisitionPipeline, PortalError> {
    if order.is_empty() {
        return Err(PortalError::NoStrategies);
    }

    let mut seen = HashSet::new();
    let mut pipeline = AcquisitionPipeline::new();
    for id in order {
        let id = id.trim();
        if !seen.insert(id.to_string()) {
            return Err(PortalError::DuplicateStrategy(id.to_string()));
        }
        pipeline.add_strategy(strategy_for(portal, id)?);
    }

    debug!(strategies = ?pipeline.strategy_ids(), "Acquisition pipeline built");
    Ok(pipeline)
}

fn strategy_for(
    portal: &PortalDescriptor,
    id: &str,
) -> Result<Box<dyn AcquisitionStrategy>, PortalError> {
    let strategy: Box<dyn AcquisitionStrategy> = match id {
        DownloadWatchStrategy::ID => {
            Box::new(DownloadWatchStrategy::new(portal.download_control.clone()))
        }
        ResourceCaptureStrategy::ID => {
            Box::new(ResourceCaptureStrategy::new(portal.download_control.clone()))
        }
        AuthenticatedReplayStrategy::ID => Box::new(AuthenticatedReplayStrategy::new(
            portal.download_keywords.clone(),
        )),
        DirectRequestStrategy::ID => Box::new(DirectRequestStrategy::new(
            portal.download_keywords.clone(),
            portal.endpoint_suffixes.clone(),
            portal.csrf_selectors.clone(),
            portal.query_params.clone(),
        )),
        other => return Err(PortalError::UnknownStrategy(other.to_string())),
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal() -> PortalDescriptor {
        PortalDescriptor::new("https://portal.example/login", "https://portal.example/reporte")
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_default_order() {
        let pipeline = build_pipeline(&portal(), &ids(&DEFAULT_STRATEGY_ORDER)).unwrap();
        assert_eq!(
            pipeline.strategy_ids(),
            vec!["download_watch", "resource_capture", "authenticated_replay", "direct_request"]
        );
    }

    #[test]
    fn test_custom_order_and_subset() {
        let pipeline =
            build_pipeline(&portal(), &ids(&["direct_request", "download_watch"])).unwrap();
        assert_eq!(pipeline.strategy_ids(), vec!["direct_request", "download_watch"]);
    }

    #[test]
    fn test_rejects_bad_orders() {
        assert!(matches!(
            build_pipeline(&portal(), &[]),
            Err(PortalError::NoStrategies)
        ));
        assert!(matches!(
            build_pipeline(&portal(), &ids(&["download_watch", "carrier_pigeon"])),
            Err(PortalError::UnknownStrategy(id)) if id == "carrier_pigeon"
        ));
        assert!(matches!(
            build_pipeline(&portal(), &ids(&["download_watch", "download_watch"])),
            Err(PortalError::DuplicateStrategy(_))
        ));
    }
}
