use super::{Stage, Tool};
use crate::bbox::BoundingBox;
use crate::error::VisionError;
use crate::imaging::Image;
use crate::openai::{self, OpenAiSettings};

/// Input for [`RegionAttributeDescription`].
#[derive(Debug, Clone)]
pub struct RegionRequest {
    pub image: Image,
    /// Region in the `(x1, y1, x2, y2)` format.
    pub bbox: String,
    /// The attribute to describe.
    pub attribute: String,
}

/// Describes one attribute of a region of an image.
pub struct RegionAttributeDescription {
    stage: Stage,
}

impl RegionAttributeDescription {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            stage: Stage::Uninitialized(settings),
        }
    }

    #[cfg(test)]
    pub fn with_inferencer(inferencer: Box<dyn openai::Inferencer>) -> Self {
        Self {
            stage: Stage::Ready(inferencer),
        }
    }
}

#[async_trait::async_trait]
impl Tool for RegionAttributeDescription {
    type Input = RegionRequest;
    type Output = String;

    fn name(&self) -> &str {
        "region_attribute_description"
    }

    fn description(&self) -> &str {
        "Describe the attribute of a region of the input image."
    }

    fn is_ready(&self) -> bool {
        self.stage.is_ready()
    }

    fn setup(&mut self) -> Result<(), VisionError> {
        self.stage.setup()
    }

    async fn apply(&self, request: RegionRequest) -> Result<String, VisionError> {
        let inferencer = self.stage.inferencer(self.name())?;

        let bbox: BoundingBox = request.bbox.parse()?;
        let cropped = request.image.crop(&bbox)?.into_rgb();

        log::info!(
            "RegionAttributeDescription: describing `{}` in {}",
            request.attribute,
            bbox
        );

        let prompt = format!("Describe {} on the image in detail", request.attribute);
        let response = inferencer.infer(&cropped, &prompt).await?;
        openai::extract_answer(&response)
    }
}
