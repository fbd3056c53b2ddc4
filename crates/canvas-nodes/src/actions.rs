//! Connection actions
//!
//! An action takes two selected nodes and wires them into a new downstream
//! node, e.g. a model photo and a garment into a virtual try-on. Each side of
//! the action needs an image; [`ConnectionAction::can_execute`] reports which
//! side is missing one before anything is created.

use canvas_engine::{
    constants, is_valid_value, BoardSession, ConnectionCandidate, EngineError, Node, PortType,
    Position, Result, ValueMap,
};
use serde::{Deserialize, Serialize};

use crate::fashion::VirtualTryOn;
use crate::generation::ImageGeneration;

/// Keys under which a node may carry an image
const IMAGE_KEYS: &[&str] = &["image", "images", "imageUrl", "imageUrls", "sheet"];

/// Actions offered when two nodes are selected together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionAction {
    /// Model photo + garment image → virtual try-on
    VirtualTryOn,
    /// Content image + style image → image generation
    StyleTransfer,
}

/// Whether an action can run, and why not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCheck {
    pub can_execute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionCheck {
    fn ok() -> Self {
        Self {
            can_execute: true,
            reason: None,
        }
    }

    fn blocked(reason: String) -> Self {
        Self {
            can_execute: false,
            reason: Some(reason),
        }
    }
}

impl ConnectionAction {
    pub const ALL: &'static [ConnectionAction] =
        &[ConnectionAction::VirtualTryOn, ConnectionAction::StyleTransfer];

    pub fn label(&self) -> &'static str {
        match self {
            Self::VirtualTryOn => "Virtual try-on",
            Self::StyleTransfer => "Style transfer",
        }
    }

    /// Node type the action creates
    pub fn target_node_type(&self) -> &'static str {
        match self {
            Self::VirtualTryOn => VirtualTryOn::NODE_TYPE,
            Self::StyleTransfer => ImageGeneration::NODE_TYPE,
        }
    }

    /// `(side name, target port)` for the first and second selected node
    fn sides(&self) -> [(&'static str, &'static str); 2] {
        match self {
            Self::VirtualTryOn => [
                ("model photo", VirtualTryOn::PORT_MODEL),
                ("garment", VirtualTryOn::PORT_GARMENT),
            ],
            Self::StyleTransfer => [
                ("content image", ImageGeneration::PORT_REFERENCE),
                ("style image", ImageGeneration::PORT_STYLE),
            ],
        }
    }

    /// Check that both selected nodes carry an image
    pub fn can_execute(&self, first: &Node, second: &Node) -> ActionCheck {
        let [(first_side, _), (second_side, _)] = self.sides();
        let missing: Vec<&str> = [(first, first_side), (second, second_side)]
            .iter()
            .filter(|(node, _)| !has_image(node))
            .map(|(_, side)| *side)
            .collect();

        match missing.as_slice() {
            [] => ActionCheck::ok(),
            [side] => ActionCheck::blocked(format!(
                "{} needs an image on the {}",
                self.label(),
                side
            )),
            _ => ActionCheck::blocked(format!(
                "{} needs an image on both the {} and the {}",
                self.label(),
                first_side,
                second_side
            )),
        }
    }

    /// Create the downstream node and connect both selected nodes to it
    ///
    /// The new node is placed to the right of the selection. Returns the
    /// created node; executing it is left to the caller.
    pub async fn perform(
        &self,
        session: &BoardSession,
        first_id: &str,
        second_id: &str,
    ) -> Result<Node> {
        let (first, second) = {
            let store = session.store().read().await;
            let first = store
                .node(first_id)
                .cloned()
                .ok_or_else(|| EngineError::NodeNotFound(first_id.to_string()))?;
            let second = store
                .node(second_id)
                .cloned()
                .ok_or_else(|| EngineError::NodeNotFound(second_id.to_string()))?;
            (first, second)
        };

        let check = self.can_execute(&first, &second);
        if let Some(reason) = check.reason {
            return Err(EngineError::precondition(reason));
        }

        let target = session
            .add_node(self.target_node_type(), placement(&first, &second))
            .await?;

        for (source, (_, target_port)) in [&first, &second].into_iter().zip(self.sides()) {
            let source_port = image_output(source).ok_or_else(|| {
                EngineError::precondition(format!("'{}' has no output to connect", source.id))
            })?;
            session
                .connect(ConnectionCandidate::new(
                    &source.id,
                    source_port,
                    &target.id,
                    target_port,
                ))
                .await?;
        }

        log::debug!(
            "{} created '{}' from '{}' and '{}'",
            self.label(),
            target.id,
            first.id,
            second.id
        );
        Ok(target)
    }
}

fn carries_image(map: &ValueMap) -> bool {
    IMAGE_KEYS
        .iter()
        .any(|key| map.get(*key).map_or(false, is_valid_value))
}

/// Whether a node has an image in its output or parameters
fn has_image(node: &Node) -> bool {
    node.non_empty_output().map_or(false, carries_image) || carries_image(&node.parameters)
}

/// First image output of a node, or its first output of any type
fn image_output(node: &Node) -> Option<&str> {
    node.outputs
        .iter()
        .find(|p| p.port_type == PortType::Image)
        .or_else(|| node.outputs.first())
        .map(|p| p.id.as_str())
}

/// One rank to the right of the selection, vertically centred
fn placement(first: &Node, second: &Node) -> Position {
    let right = (first.position.x + first.dimensions.width)
        .max(second.position.x + second.dimensions.width);
    let y = (first.position.y + second.position.y) / 2.0;
    Position::new(right + constants::layout::RANK_SPACING, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{builtin_adapters, builtin_registry, NodeDescriptor};
    use crate::input::{GarmentImage, ModelPhoto};
    use canvas_engine::{
        BoardBuilder, EngineConfig, ExecutionOutcome, InMemoryPersistence, ProviderResponse,
        ScriptedProvider, SessionServices,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn pair(model_image: &str, garment_image: &str) -> (Node, Node) {
        let mut board = BoardBuilder::new("b")
            .add_defined("model", &ModelPhoto::definition(), (0.0, 0.0))
            .with_parameters(json!({ "image": model_image }))
            .add_defined("garment", &GarmentImage::definition(), (0.0, 300.0))
            .with_parameters(json!({ "image": garment_image }))
            .build();
        let second = board.nodes.remove(1);
        let first = board.nodes.remove(0);
        (first, second)
    }

    #[test]
    fn test_can_execute_names_both_missing_sides() {
        let (model, garment) = pair("", "");
        let check = ConnectionAction::VirtualTryOn.can_execute(&model, &garment);
        assert!(!check.can_execute);
        let reason = check.reason.unwrap();
        assert!(reason.contains("model photo"));
        assert!(reason.contains("garment"));
    }

    #[test]
    fn test_can_execute_names_single_missing_side() {
        let (model, garment) = pair("m.png", "");
        let check = ConnectionAction::VirtualTryOn.can_execute(&model, &garment);
        assert_eq!(
            check.reason.as_deref(),
            Some("Virtual try-on needs an image on the garment")
        );

        let (model, garment) = pair("m.png", "g.png");
        assert_eq!(
            ConnectionAction::VirtualTryOn.can_execute(&model, &garment),
            ActionCheck::ok()
        );
    }

    #[test]
    fn test_generated_output_counts_as_image() {
        let board = BoardBuilder::new("b")
            .add_node("a", "image-generation", (0.0, 0.0))
            .with_output(json!({ "images": ["u1", "u2"] }))
            .add_node("b", "image-upload", (0.0, 0.0))
            .with_parameters(json!({ "image": "s.png" }))
            .build();
        let check = ConnectionAction::StyleTransfer.can_execute(&board.nodes[0], &board.nodes[1]);
        assert!(check.can_execute);
    }

    #[tokio::test]
    async fn test_perform_wires_try_on_and_runs() {
        let provider = Arc::new(ScriptedProvider::new());
        let services = SessionServices::new(
            Arc::new(builtin_registry()),
            Arc::new(InMemoryPersistence::new()),
            provider.clone(),
        )
        .with_adapters(builtin_adapters());
        let session = BoardSession::new("b", services, EngineConfig::default());

        let model = session
            .add_node(ModelPhoto::NODE_TYPE, Position::new(0.0, 0.0))
            .await
            .unwrap();
        let garment = session
            .add_node(GarmentImage::NODE_TYPE, Position::new(0.0, 300.0))
            .await
            .unwrap();

        let err = ConnectionAction::VirtualTryOn
            .perform(&session, &model.id, &garment.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Precondition(_)));

        for (id, url) in [(&model.id, "m.png"), (&garment.id, "g.png")] {
            session
                .update_parameters(id, json!({ "image": url }).as_object().unwrap().clone())
                .await
                .unwrap();
        }
        let tryon = ConnectionAction::VirtualTryOn
            .perform(&session, &model.id, &garment.id)
            .await
            .unwrap();
        assert_eq!(tryon.node_type, "virtual-try-on");
        assert!(tryon.position.x > 280.0);
        assert_eq!(session.store().read().await.edges().len(), 2);

        provider.push_execute(Ok(ProviderResponse::completed(json!({ "image": "out.png" }))));
        let outcome = session.execute(&tryon.id).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Completed { .. }));

        let calls = provider.dedicated_calls();
        assert_eq!(calls.len(), 1);
        let (route, _, payload) = &calls[0];
        assert_eq!(route, "virtual-try-on");
        assert_eq!(payload["modelImage"], "m.png");
        assert_eq!(payload["garmentImage"], "g.png");
        session.shutdown().await;
    }
}
