//! Model-to-provider dispatch.

use gateway_core::{GatewayError, GatewayResult, ProviderAdapter};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolve `model` to the first adapter in `active` that serves it.
///
/// `active` must be in catalog order; that order is the tie-break when more
/// than one adapter claims the same model.
///
/// # Errors
/// Returns `ModelNotSupported` when no active adapter serves `model`
pub fn resolve(
    model: &str,
    active: &[Arc<dyn ProviderAdapter>],
) -> GatewayResult<Arc<dyn ProviderAdapter>> {
    match active.iter().find(|adapter| adapter.supports_model(model)) {
        Some(adapter) => {
            debug!(model = %model, provider = %adapter.name(), "Resolved model");
            Ok(Arc::clone(adapter))
        }
        None => {
            debug!(model = %model, active = active.len(), "No active provider for model");
            Err(GatewayError::model_not_supported(model))
        }
    }
}

/// A model id claimed by more than one adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOverlap {
    /// The contested model id
    pub model: String,
    /// Adapter that wins dispatch (earliest in catalog order)
    pub winner: String,
    /// Adapters whose claim is never reached
    pub shadowed: Vec<String>,
}

/// List every model claimed by more than one adapter, in catalog order.
#[must_use]
pub fn find_overlaps(adapters: &[Arc<dyn ProviderAdapter>]) -> Vec<ModelOverlap> {
    let mut overlaps: Vec<ModelOverlap> = Vec::new();

    for (index, adapter) in adapters.iter().enumerate() {
        for model in adapter.supported_models() {
            if overlaps.iter().any(|o| &o.model == model) {
                continue;
            }
            let earlier = adapters[..index].iter().any(|a| a.supports_model(model));
            if earlier {
                continue;
            }
            let shadowed: Vec<String> = adapters[index + 1..]
                .iter()
                .filter(|a| a.supports_model(model))
                .map(|a| a.name().to_string())
                .collect();
            if !shadowed.is_empty() {
                overlaps.push(ModelOverlap {
                    model: model.clone(),
                    winner: adapter.name().to_string(),
                    shadowed,
                });
            }
        }
    }

    overlaps
}

/// Log a warning for every overlapping model claim.
pub fn warn_overlaps(adapters: &[Arc<dyn ProviderAdapter>]) -> usize {
    let overlaps = find_overlaps(adapters);
    for overlap in &overlaps {
        warn!(
            model = %overlap.model,
            winner = %overlap.winner,
            shadowed = ?overlap.shadowed,
            "Model claimed by several providers; first in catalog order wins"
        );
    }
    overlaps.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::testing::MockAdapter;

    fn adapter(name: &str, models: &[&str]) -> Arc<dyn ProviderAdapter> {
        Arc::new(MockAdapter::new(name, &[], models))
    }

    #[test]
    fn test_resolve_unique_claimant() {
        let active = vec![adapter("a", &["a-1", "a-2"]), adapter("b", &["b-1"])];

        assert_eq!(resolve("a-2", &active).unwrap().name(), "a");
        assert_eq!(resolve("b-1", &active).unwrap().name(), "b");
    }

    #[test]
    fn test_resolve_unknown_model() {
        let active = vec![adapter("a", &["a-1"])];

        let err = resolve("b-1", &active).unwrap_err();
        assert!(matches!(err, GatewayError::ModelNotSupported { ref model } if model == "b-1"));
        assert_eq!(err.to_string(), "Model b-1 not supported");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_resolve_empty_active_set() {
        assert!(resolve("a-1", &[]).is_err());
    }

    #[test]
    fn test_overlap_resolves_to_catalog_order() {
        let active = vec![
            adapter("first", &["shared", "x"]),
            adapter("second", &["shared"]),
        ];
        for _ in 0..10 {
            assert_eq!(resolve("shared", &active).unwrap().name(), "first");
        }

        let reversed = vec![Arc::clone(&active[1]), Arc::clone(&active[0])];
        assert_eq!(resolve("shared", &reversed).unwrap().name(), "second");
    }

    #[test]
    fn test_find_overlaps() {
        let adapters = vec![
            adapter("a", &["m-1", "m-2"]),
            adapter("b", &["m-2", "m-3"]),
            adapter("c", &["m-2", "m-3"]),
        ];

        let overlaps = find_overlaps(&adapters);
        assert_eq!(
            overlaps,
            vec![
                ModelOverlap {
                    model: "m-2".to_string(),
                    winner: "a".to_string(),
                    shadowed: vec!["b".to_string(), "c".to_string()],
                },
                ModelOverlap {
                    model: "m-3".to_string(),
                    winner: "b".to_string(),
                    shadowed: vec!["c".to_string()],
                },
            ]
        );
        assert_eq!(warn_overlaps(&adapters), 2);
    }

    #[test]
    fn test_no_overlaps() {
        let adapters = vec![adapter("a", &["a-1"]), adapter("b", &["b-1"])];
        assert!(find_overlaps(&adapters).is_empty());
    }
}
