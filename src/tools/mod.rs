pub mod count_object;
pub mod image_description;
pub mod region_attribute;

pub use count_object::{CountGivenObject, CountRequest};
pub use image_description::ImageDescription;
pub use region_attribute::{RegionAttributeDescription, RegionRequest};

use crate::error::VisionError;
use crate::openai::{GptInferencer, Inferencer, OpenAiSettings};

/// A vision tool an agent can call.
///
/// `setup` builds the chat-completions client once; each `apply` then sends
/// one image and prompt and converts the answer into `Output`.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn is_ready(&self) -> bool;

    fn setup(&mut self) -> Result<(), VisionError>;
    async fn apply(&self, input: Self::Input) -> Result<Self::Output, VisionError>;
}

/// Lifecycle of the inferencer behind a tool.
pub(crate) enum Stage {
    Uninitialized(OpenAiSettings),
    Ready(Box<dyn Inferencer>),
}

impl Stage {
    pub(crate) fn setup(&mut self) -> Result<(), VisionError> {
        if let Stage::Uninitialized(settings) = self {
            let inferencer = GptInferencer::new(settings.clone())?;
            log::info!("Tool setup: using model {}", inferencer.model());
            *self = Stage::Ready(Box::new(inferencer));
        }
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, Stage::Ready(_))
    }

    pub(crate) fn inferencer(&self, tool: &str) -> Result<&dyn Inferencer, VisionError> {
        match self {
            Stage::Ready(inferencer) => Ok(inferencer.as_ref()),
            Stage::Uninitialized(_) => Err(VisionError::NotReady(tool.to_string())),
        }
    }
}
