//! Pre-flight checks before a graph is sent for execution

use graph_engine::{BlockCategory, GraphStore, MODEL_PATH_PARAM};

use crate::error::{Result, RunError};

/// Refuse graphs the execution service could not run
///
/// Checks, in order: a simulator block exists, every simulator has a
/// non-blank model path, and at least one edge exists.
pub fn check_runnable(store: &GraphStore) -> Result<()> {
    let simulators: Vec<_> = store
        .nodes()
        .iter()
        .filter(|n| store.catalog().category_of(&n.block_type) == BlockCategory::Simulator)
        .collect();

    if simulators.is_empty() {
        return Err(RunError::validation("No simulator block in graph"));
    }

    for sim in &simulators {
        let has_model = sim
            .params
            .get(MODEL_PATH_PARAM)
            .and_then(|v| v.as_str())
            .is_some_and(|path| !path.trim().is_empty());
        if !has_model {
            return Err(RunError::validation(format!(
                "Simulator '{}' has no {}",
                sim.id, MODEL_PATH_PARAM
            )));
        }
    }

    if store.edges().is_empty() {
        return Err(RunError::validation("No connections yet"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use graph_engine::{BlockCatalog, ParamValue, Position};

    use super::*;

    fn reason(store: &GraphStore) -> String {
        match check_runnable(store) {
            Err(RunError::ValidationFailed(reason)) => reason,
            other => panic!("expected a validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_requires_simulator() {
        let mut store = GraphStore::new(Arc::new(BlockCatalog::builtin()));
        store.add_node("logger", Position::default()).unwrap();
        assert_eq!(reason(&store), "No simulator block in graph");
    }

    #[test]
    fn test_requires_model_path() {
        let mut store = GraphStore::with_starter_graph(Arc::new(BlockCatalog::builtin())).unwrap();
        assert_eq!(reason(&store), "Simulator 'n1' has no model_path");

        store
            .set_param("n1", MODEL_PATH_PARAM, ParamValue::from("   "))
            .unwrap();
        assert_eq!(reason(&store), "Simulator 'n1' has no model_path");

        store
            .set_param("n1", MODEL_PATH_PARAM, ParamValue::from("arm.xml"))
            .unwrap();
        assert!(check_runnable(&store).is_ok());
    }

    #[test]
    fn test_requires_an_edge() {
        let mut store = GraphStore::new(Arc::new(BlockCatalog::builtin()));
        let id = store
            .add_node("mujoco_sim", Position::default())
            .unwrap()
            .id
            .clone();
        store
            .set_param(&id, MODEL_PATH_PARAM, ParamValue::from("arm.xml"))
            .unwrap();
        assert_eq!(reason(&store), "No connections yet");
    }
}
